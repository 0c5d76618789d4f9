//! A backend that keeps everything in a local data directory.
//!
//! Documents, their chunks and the search log live in redb; a tantivy index
//! mirrors titles and bodies for full-text ranking. Similarity is the cosine
//! between term vectors, with a document scored by its best chunk.

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    path::Path,
    time::Instant,
};

use chrono::Utc;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::{
    analytics::{
        self,
        AnalyticsOverview,
        CleanupReport,
        HistoryFilter,
        SearchRecord,
        TrendingQuery,
        round2,
    },
    backend::{
        AddOutcome,
        Context,
        ContextChunk,
        Document,
        DocumentStatus,
        DocumentStore,
        DocumentUpdate,
        HybridWeights,
        KeywordStats,
        ProcessingState,
        Retrieval,
        SearchAnalytics,
        StoreStats,
    },
    chunking::ChunkingConfig,
    config::Config,
    data_dir::DataDir,
    diagnostics::{SearchStatistics, round3},
    doc_id::{DocumentId, MIN_PREFIX_LEN, normalize_reference},
    document_db::DocumentDb,
    error::{Error, Result},
    ingestion::extract_title,
    keywords::{
        KeywordFilter,
        KeywordMethod,
        normalize_keyword,
        normalize_keywords,
        resolve_keyword_mode,
    },
    request::{SearchRequest, SearchType},
    similarity::{SimilarityTally, TermVector, extract_keywords, is_match},
    tantivy_index::{SearchIndex, WRITER_BUDGET},
    walker::FileType,
};

/// Characters of content shown for results that have no matching chunk.
const PREVIEW_CHARS: usize = 300;

/// Keywords listed in [`KeywordStats::top_keywords`].
const TOP_KEYWORDS: usize = 10;

/// Tunables the local backend reads from the config file.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    pub chunking: ChunkingConfig,
    pub similarity_threshold: f64,
    pub semantic_weight: f64,
    pub text_weight: f64,
    pub max_keywords: usize,
}

impl From<&Config> for BackendSettings {
    fn from(config: &Config) -> Self {
        Self {
            chunking: ChunkingConfig {
                chunk_size: config.processing.chunk_size,
                overlap: config.processing.chunk_overlap,
            },
            similarity_threshold: config.search.similarity_threshold,
            semantic_weight: config.search.semantic_weight,
            text_weight: config.search.text_weight,
            max_keywords: config.processing.max_keywords,
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

pub struct LocalBackend {
    db: DocumentDb,
    index: SearchIndex,
    settings: BackendSettings,
}

impl LocalBackend {
    pub fn open(data_dir: &DataDir, settings: BackendSettings) -> Result<Self> {
        let db = DocumentDb::open(&data_dir.documents_db())?;
        let index = SearchIndex::open(&data_dir.tantivy_dir()?)?;
        debug!(root = %data_dir.root().display(), "opened local backend");
        Ok(Self {
            db,
            index,
            settings,
        })
    }

    /// Resolve a full id or a unique prefix of at least
    /// [`MIN_PREFIX_LEN`] characters.
    fn resolve_id(&self, reference: &str) -> Result<String> {
        let wanted = normalize_reference(reference);
        if wanted.is_empty() {
            return Err(Error::invalid("document id must not be empty"));
        }
        if self.db.contains_document(&wanted)? {
            return Ok(wanted);
        }

        let not_found = || Error::NotFound {
            kind: "document",
            name: reference.trim().to_string(),
        };
        if wanted.len() < MIN_PREFIX_LEN {
            return Err(not_found());
        }

        let mut ids = self.db.ids_with_prefix(&wanted)?;
        match ids.len() {
            0 => Err(not_found()),
            1 => Ok(ids.remove(0)),
            n => Err(Error::invalid(format!(
                "id prefix '{wanted}' is ambiguous ({n} documents match)"
            ))),
        }
    }

    fn load(&self, reference: &str) -> Result<Document> {
        let id = self.resolve_id(reference)?;
        self.db.get_document(&id)?.ok_or_else(|| Error::NotFound {
            kind: "document",
            name: id,
        })
    }

    /// Processed documents passing the request's filters, by id.
    fn candidates(
        &self,
        request: &SearchRequest,
    ) -> Result<HashMap<String, Document>> {
        let keyword_filter =
            resolve_keyword_mode(request).map(|m| KeywordFilter::from_mode(&m));
        Ok(self
            .db
            .list_documents()?
            .into_iter()
            .filter(|d| d.status == ProcessingState::Processed)
            .filter(|d| passes_filters(d, request, keyword_filter.as_ref()))
            .map(|d| (d.id.clone(), d))
            .collect())
    }

    /// Best chunk similarity and that chunk's text, per candidate document.
    /// Every chunk score is reported through `on_score`.
    fn best_chunks(
        &self,
        query: &TermVector,
        candidates: &HashMap<String, Document>,
        mut on_score: impl FnMut(f64),
    ) -> Result<HashMap<String, (f64, String)>> {
        let mut best: HashMap<String, (f64, String)> = HashMap::new();
        for (id, chunks) in self.db.all_chunks()? {
            if !candidates.contains_key(&id) {
                continue;
            }
            for chunk in chunks {
                let score = query.cosine(&TermVector::from_text(&chunk));
                on_score(score);
                if best.get(&id).is_none_or(|(current, _)| score > *current) {
                    best.insert(id.clone(), (score, chunk));
                }
            }
        }
        Ok(best)
    }

    /// Normalized BM25 score per candidate document.
    fn fulltext_scores(
        &self,
        query: &str,
        candidates: &HashMap<String, Document>,
    ) -> Result<HashMap<String, f64>> {
        if candidates.is_empty() {
            return Ok(HashMap::new());
        }
        let everything = usize::try_from(self.index.num_docs()?)
            .unwrap_or(usize::MAX)
            .max(1);
        Ok(self
            .index
            .search(query, everything)?
            .into_iter()
            .filter(|hit| candidates.contains_key(&hit.doc_id))
            .map(|hit| {
                let score = hit.normalized_score();
                (hit.doc_id, score)
            })
            .collect())
    }

    fn reindex(&self, doc: &Document) -> Result<()> {
        let mut writer = self.index.writer(WRITER_BUDGET)?;
        self.index.add_document(
            &writer,
            &doc.id,
            &doc.title,
            &doc.content,
            &doc.content_type,
        )?;
        writer.commit()?;
        Ok(())
    }

    fn unindex(&self, id: &str) -> Result<()> {
        let mut writer = self.index.writer(WRITER_BUDGET)?;
        self.index.delete_document(&writer, id);
        writer.commit()?;
        Ok(())
    }

    fn keyword_search(
        &self,
        keywords: &[String],
        limit: usize,
        method: KeywordMethod,
    ) -> Result<Value> {
        let filter = KeywordFilter::new(method, keywords);
        let wanted = normalize_keywords(keywords);

        let mut matches: Vec<(f64, Document)> = self
            .db
            .list_documents()?
            .into_iter()
            .filter(|d| filter.matches(&d.keywords))
            .map(|d| (filter.score(&d.keywords), d))
            .collect();
        matches.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then_with(|| b.1.updated_at.cmp(&a.1.updated_at))
        });
        matches.truncate(limit);

        debug!(
            method = method.operation(),
            matches = matches.len(),
            "keyword search"
        );

        let results = matches
            .into_iter()
            .map(|(score, doc)| {
                let have: HashSet<String> =
                    doc.keywords.iter().map(|k| normalize_keyword(k)).collect();
                let matched: Vec<&String> =
                    wanted.iter().filter(|k| have.contains(*k)).collect();
                let mut entry = result_entry(&doc, &preview(&doc.content));
                entry.insert("keyword_score".into(), json!(score));
                entry.insert("matched_keywords".into(), json!(matched));
                Value::Object(entry)
            })
            .collect();
        Ok(Value::Array(results))
    }

    fn save_keywords(
        &self,
        mut doc: Document,
        keywords: Vec<String>,
    ) -> Result<Vec<String>> {
        doc.keywords = keywords;
        doc.updated_at = Utc::now();
        self.db.update_document(&doc)?;
        Ok(doc.keywords)
    }
}

impl std::fmt::Debug for LocalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalBackend")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn passes_filters(
    doc: &Document,
    request: &SearchRequest,
    keyword_filter: Option<&KeywordFilter>,
) -> bool {
    let same = |wanted: &Option<String>, have: Option<&str>| {
        wanted
            .as_deref()
            .is_none_or(|w| have.is_some_and(|h| h.eq_ignore_ascii_case(w)))
    };

    same(&request.content_type, Some(doc.content_type.as_str()))
        && same(&request.classification, doc.classification.as_deref())
        && keyword_filter.is_none_or(|f| f.matches(&doc.keywords))
        && request.tags.as_ref().is_none_or(|tags| {
            KeywordFilter::new(KeywordMethod::All, tags).matches(&doc.tags)
        })
}

fn preview(content: &str) -> String {
    let trimmed = content.trim();
    match trimmed.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

fn result_entry(doc: &Document, content: &str) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert("document_id".into(), json!(doc.id));
    entry.insert("title".into(), json!(doc.title));
    entry.insert("location".into(), json!(doc.location));
    entry.insert("content".into(), json!(content));
    entry.insert("content_type".into(), json!(doc.content_type));
    entry.insert("classification".into(), json!(doc.classification));
    entry.insert("keywords".into(), json!(doc.keywords));
    entry.insert("tags".into(), json!(doc.tags));
    entry
}

fn sort_scored<T>(scored: &mut [(f64, String, T)]) {
    scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
}

fn search_response(
    request: &SearchRequest,
    search_type: SearchType,
    results: Vec<Value>,
    statistics: Option<SearchStatistics>,
    started: Instant,
) -> Value {
    let mut response = json!({
        "query": request.query,
        "search_type": search_type.as_str(),
        "total_results": results.len(),
        "results": results,
        "execution_time_ms": started.elapsed().as_millis() as u64,
    });
    if let (Some(stats), Some(map)) = (statistics, response.as_object_mut()) {
        map.insert("statistics".into(), json!(stats));
    }
    response
}

impl Retrieval for LocalBackend {
    fn search(&self, request: &SearchRequest) -> Result<Value> {
        let started = Instant::now();
        let threshold = request
            .threshold
            .unwrap_or(self.settings.similarity_threshold);

        let candidates = self.candidates(request)?;
        let query = TermVector::from_text(&request.query);
        let mut tally = SimilarityTally::new(threshold);
        let best =
            self.best_chunks(&query, &candidates, |s| tally.record(s))?;

        let mut scored: Vec<(f64, String, String)> = best
            .into_iter()
            .filter(|(_, (score, _))| is_match(*score, threshold))
            .map(|(id, (score, chunk))| (score, id, chunk))
            .collect();
        sort_scored(&mut scored);
        scored.truncate(request.limit);

        let results = scored
            .into_iter()
            .filter_map(|(score, id, chunk)| {
                let doc = candidates.get(&id)?;
                let mut entry = result_entry(doc, &chunk);
                entry.insert("similarity".into(), json!(score));
                Some(Value::Object(entry))
            })
            .collect();

        Ok(search_response(
            request,
            SearchType::Semantic,
            results,
            Some(tally.finish()),
            started,
        ))
    }

    fn hybrid_search(
        &self,
        request: &SearchRequest,
        weights: HybridWeights,
    ) -> Result<Value> {
        let started = Instant::now();
        let sw = weights.semantic.unwrap_or(self.settings.semantic_weight);
        let tw = weights.text.unwrap_or(self.settings.text_weight);
        let threshold = request.threshold.unwrap_or(0.0);

        let candidates = self.candidates(request)?;
        let query = TermVector::from_text(&request.query);
        let best = self.best_chunks(&query, &candidates, |_| {})?;
        let text = self.fulltext_scores(&request.query, &candidates)?;

        let mut tally = SimilarityTally::new(threshold);
        let mut scored = Vec::new();
        for (id, doc) in &candidates {
            let (semantic, chunk) = match best.get(id) {
                Some((s, chunk)) => (*s, chunk.clone()),
                None => (0.0, preview(&doc.content)),
            };
            let fulltext = text.get(id).copied().unwrap_or(0.0);
            let combined = sw * semantic + tw * fulltext;
            tally.record(combined);
            if !is_match(combined, threshold) {
                continue;
            }
            let total = sw + tw;
            let weighted = if total > 0.0 { combined / total } else { 0.0 };
            scored.push((
                combined,
                id.clone(),
                (semantic, fulltext, weighted, chunk),
            ));
        }
        sort_scored(&mut scored);
        scored.truncate(request.limit);

        let results = scored
            .into_iter()
            .filter_map(|(combined, id, (semantic, fulltext, weighted, chunk))| {
                let doc = candidates.get(&id)?;
                let mut entry = result_entry(doc, &chunk);
                entry.insert("similarity".into(), json!(semantic));
                entry.insert("fulltext_similarity".into(), json!(fulltext));
                entry.insert("combined_score".into(), json!(combined));
                entry.insert("weighted_score".into(), json!(weighted));
                Some(Value::Object(entry))
            })
            .collect();

        let mut response = search_response(
            request,
            SearchType::Hybrid,
            results,
            Some(tally.finish()),
            started,
        );
        if let Some(map) = response.as_object_mut() {
            map.insert(
                "weights".into(),
                json!({"semantic": sw, "text": tw}),
            );
        }
        Ok(response)
    }

    fn fulltext_search(&self, request: &SearchRequest) -> Result<Value> {
        let started = Instant::now();
        let candidates = self.candidates(request)?;
        let text = self.fulltext_scores(&request.query, &candidates)?;

        let mut scored: Vec<(f64, String, ())> = text
            .into_iter()
            .filter(|(_, score)| {
                request.threshold.is_none_or(|t| is_match(*score, t))
            })
            .map(|(id, score)| (score, id, ()))
            .collect();
        sort_scored(&mut scored);
        scored.truncate(request.limit);

        let results = scored
            .into_iter()
            .filter_map(|(score, id, ())| {
                let doc = candidates.get(&id)?;
                let mut entry = result_entry(doc, &preview(&doc.content));
                entry.insert("fulltext_similarity".into(), json!(score));
                Some(Value::Object(entry))
            })
            .collect();

        Ok(search_response(
            request,
            SearchType::Fulltext,
            results,
            None,
            started,
        ))
    }

    fn search_by_keywords(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Value> {
        self.keyword_search(keywords, limit, KeywordMethod::Any)
    }

    fn search_by_keywords_all(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Value> {
        self.keyword_search(keywords, limit, KeywordMethod::All)
    }

    fn get_context(&self, query: &str, limit: usize) -> Result<Context> {
        let titles: HashMap<String, String> = self
            .db
            .list_documents()?
            .into_iter()
            .filter(|d| d.status == ProcessingState::Processed)
            .map(|d| (d.id, d.title))
            .collect();
        let query = TermVector::from_text(query);

        let mut scored: Vec<(f64, String, String)> = Vec::new();
        for (id, chunks) in self.db.all_chunks()? {
            if !titles.contains_key(&id) {
                continue;
            }
            for chunk in chunks {
                let score = query.cosine(&TermVector::from_text(&chunk));
                if score > 0.0 {
                    scored.push((score, id.clone(), chunk));
                }
            }
        }
        sort_scored(&mut scored);
        scored.truncate(limit);

        let context_chunks: Vec<ContextChunk> = scored
            .into_iter()
            .map(|(score, id, content)| ContextChunk {
                source: titles.get(&id).cloned().unwrap_or_default(),
                document_id: id,
                content,
                similarity: round3(score),
            })
            .collect();
        let combined_context = context_chunks
            .iter()
            .map(|c| c.content.trim())
            .collect::<Vec<_>>()
            .join("\n\n");

        Ok(Context {
            total_chunks: context_chunks.len(),
            context_chunks,
            combined_context,
        })
    }
}

impl DocumentStore for LocalBackend {
    fn add_document(
        &self,
        location: &Path,
        content: &str,
    ) -> Result<AddOutcome> {
        let location_str = location.to_string_lossy().to_string();
        let id = DocumentId::for_location(&location_str).hex;
        let previous = self.db.get_document(&id)?;
        let now = Utc::now();

        let chunks: Vec<String> = if content.trim().is_empty() {
            Vec::new()
        } else {
            self.settings
                .chunking
                .split(content)
                .into_iter()
                .map(|c| c.text)
                .collect()
        };
        let (status, message) = if chunks.is_empty() {
            (ProcessingState::Failed, "no text content to index".to_string())
        } else {
            (
                ProcessingState::Processed,
                format!("indexed {} chunk(s)", chunks.len()),
            )
        };

        let doc = Document {
            id: id.clone(),
            title: extract_title(content, location),
            location: location_str,
            content: content.to_string(),
            content_type: FileType::from_path(location)
                .map_or("text", FileType::content_type)
                .to_string(),
            classification: previous
                .as_ref()
                .and_then(|p| p.classification.clone()),
            keywords: extract_keywords(content, self.settings.max_keywords),
            tags: previous.as_ref().map(|p| p.tags.clone()).unwrap_or_default(),
            status,
            embeddings_count: chunks.len(),
            created_at: previous.as_ref().map_or(now, |p| p.created_at),
            updated_at: now,
        };

        let replaced = self.db.put_document(&doc, &chunks)?;
        self.reindex(&doc)?;
        info!(id = %doc.id, chunks = chunks.len(), replaced, "stored document");

        Ok(AddOutcome {
            document_id: doc.id,
            title: doc.title,
            replaced,
            message,
        })
    }

    fn get_document(&self, id: &str) -> Result<Document> {
        self.load(id)
    }

    fn update_document(
        &self,
        id: &str,
        update: &DocumentUpdate,
    ) -> Result<Document> {
        if update.is_empty() {
            return Err(Error::invalid(
                "nothing to update (use --title, --classification or --tags)",
            ));
        }
        let mut doc = self.load(id)?;
        let mut retitled = false;

        if let Some(title) = &update.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(Error::invalid("title must not be empty"));
            }
            retitled = title != doc.title;
            doc.title = title.to_string();
        }
        if let Some(classification) = &update.classification {
            let classification = classification.trim();
            doc.classification = (!classification.is_empty())
                .then(|| classification.to_string());
        }
        if let Some(tags) = &update.tags {
            doc.tags = normalize_keywords(tags);
        }
        doc.updated_at = Utc::now();

        self.db.update_document(&doc)?;
        if retitled {
            self.reindex(&doc)?;
        }
        Ok(doc)
    }

    fn delete_document(&self, id: &str) -> Result<Document> {
        let id = self.resolve_id(id)?;
        let doc = self.db.remove_document(&id)?.ok_or_else(|| {
            Error::NotFound {
                kind: "document",
                name: id.clone(),
            }
        })?;
        self.unindex(&id)?;
        info!(id = %id, "deleted document");
        Ok(doc)
    }

    fn list_documents(&self, limit: usize) -> Result<Vec<Document>> {
        let mut docs = self.db.list_documents()?;
        docs.sort_by(|a, b| {
            b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id))
        });
        docs.truncate(limit);
        Ok(docs)
    }

    fn document_status(&self, id: &str) -> Result<DocumentStatus> {
        let doc = self.load(id)?;
        let embeddings_count = self.db.get_chunks(&doc.id)?.len();
        let embeddings_ready =
            doc.status == ProcessingState::Processed && embeddings_count > 0;
        let message = match doc.status {
            ProcessingState::Processed if embeddings_ready => {
                "Document is ready for search".to_string()
            }
            ProcessingState::Processed => {
                "Document is processed but has no searchable chunks"
                    .to_string()
            }
            ProcessingState::Pending => {
                "Document is waiting to be processed".to_string()
            }
            ProcessingState::Failed => {
                "Document processing failed; re-add it to retry".to_string()
            }
        };

        Ok(DocumentStatus {
            id: doc.id,
            status: doc.status,
            embeddings_count,
            embeddings_ready,
            message,
        })
    }

    fn stats(&self) -> Result<StoreStats> {
        let docs = self.db.list_documents()?;
        let mut by_status = BTreeMap::new();
        let mut by_type = BTreeMap::new();
        for doc in &docs {
            *by_status.entry(doc.status.to_string()).or_insert(0) += 1;
            *by_type.entry(doc.content_type.clone()).or_insert(0) += 1;
        }

        Ok(StoreStats {
            total_documents: docs.len(),
            total_embeddings: docs.iter().map(|d| d.embeddings_count).sum(),
            storage_type: "redb + tantivy".to_string(),
            by_status,
            by_type,
        })
    }

    fn healthy(&self) -> bool {
        self.db.document_count().is_ok() && self.index.num_docs().is_ok()
    }

    fn add_keywords(
        &self,
        id: &str,
        keywords: &[String],
    ) -> Result<Vec<String>> {
        let added = normalize_keywords(keywords);
        if added.is_empty() {
            return Err(Error::invalid("no keywords given"));
        }
        let doc = self.load(id)?;
        let merged = normalize_keywords(&[doc.keywords.clone(), added].concat());
        self.save_keywords(doc, merged)
    }

    fn remove_keywords(
        &self,
        id: &str,
        keywords: &[String],
    ) -> Result<Vec<String>> {
        let removed: HashSet<String> =
            normalize_keywords(keywords).into_iter().collect();
        if removed.is_empty() {
            return Err(Error::invalid("no keywords given"));
        }
        let doc = self.load(id)?;
        let remaining = doc
            .keywords
            .iter()
            .filter(|k| !removed.contains(&normalize_keyword(k)))
            .cloned()
            .collect();
        self.save_keywords(doc, remaining)
    }

    fn set_keywords(
        &self,
        id: &str,
        keywords: &[String],
    ) -> Result<Vec<String>> {
        let doc = self.load(id)?;
        self.save_keywords(doc, normalize_keywords(keywords))
    }

    fn keyword_frequencies(
        &self,
        limit: usize,
        min_count: usize,
    ) -> Result<Vec<(String, usize)>> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for doc in self.db.list_documents()? {
            for keyword in normalize_keywords(&doc.keywords) {
                *counts.entry(keyword).or_default() += 1;
            }
        }

        let mut ranked: Vec<(String, usize)> = counts
            .into_iter()
            .filter(|(_, n)| *n >= min_count.max(1))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        Ok(ranked)
    }

    fn keyword_statistics(&self) -> Result<KeywordStats> {
        let docs = self.db.list_documents()?;
        let all = self.keyword_frequencies(usize::MAX, 1)?;
        let with_keywords = docs.iter().filter(|d| !d.keywords.is_empty()).count();
        let keyword_total: usize = docs.iter().map(|d| d.keywords.len()).sum();
        let avg = if docs.is_empty() {
            0.0
        } else {
            round2(keyword_total as f64 / docs.len() as f64)
        };

        Ok(KeywordStats {
            total_keywords: all.len(),
            documents_with_keywords: with_keywords,
            avg_keywords_per_document: avg,
            singleton_keywords: all.iter().filter(|(_, n)| *n == 1).count(),
            top_keywords: all.into_iter().take(TOP_KEYWORDS).collect(),
        })
    }
}

impl SearchAnalytics for LocalBackend {
    fn record_search(&self, record: &SearchRecord) -> Result<()> {
        let seq = self.db.record_search(record)?;
        debug!(seq, query = %record.query, "recorded search");
        Ok(())
    }

    fn search_analytics(&self, days: u32) -> Result<AnalyticsOverview> {
        let records: Vec<SearchRecord> = self
            .db
            .list_searches()?
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        Ok(analytics::overview(&records, Utc::now(), days))
    }

    fn search_history(
        &self,
        limit: usize,
        filter: &HistoryFilter,
    ) -> Result<Vec<SearchRecord>> {
        let records: Vec<SearchRecord> = self
            .db
            .list_searches()?
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        Ok(analytics::history(&records, limit, filter))
    }

    fn trending_queries(
        &self,
        limit: usize,
        days: u32,
    ) -> Result<Vec<TrendingQuery>> {
        let records: Vec<SearchRecord> = self
            .db
            .list_searches()?
            .into_iter()
            .map(|(_, r)| r)
            .collect();
        Ok(analytics::trending(&records, Utc::now(), limit, days))
    }

    fn cleanup_searches(
        &self,
        days: u32,
        dry_run: bool,
    ) -> Result<CleanupReport> {
        let records = self.db.list_searches()?;
        let existing: HashSet<String> = self
            .db
            .list_documents()?
            .into_iter()
            .map(|d| d.id)
            .collect();

        let (keys, mut report) =
            analytics::cleanup_candidates(&records, Utc::now(), days, |id| {
                existing.contains(id)
            });
        report.dry_run = dry_run;

        if !dry_run {
            self.db.remove_searches(&keys)?;
            info!(removed = keys.len(), "cleaned up search records");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        diagnostics::{DiagnosticCondition, diagnose},
        dispatch::dispatch,
        projector::project,
        request::{RawSearchOptions, normalize},
    };

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let tmp = tempfile::tempdir().unwrap();
        let data_dir = DataDir::resolve(Some(tmp.path()), None).unwrap();
        let backend =
            LocalBackend::open(&data_dir, BackendSettings::default()).unwrap();
        (tmp, backend)
    }

    fn add(backend: &LocalBackend, name: &str, content: &str) -> String {
        backend
            .add_document(Path::new(&format!("/docs/{name}")), content)
            .unwrap()
            .document_id
    }

    fn seeded() -> (tempfile::TempDir, LocalBackend, String, String) {
        let (tmp, backend) = backend();
        let rust = add(
            &backend,
            "rust.md",
            "# Rust Ownership\n\nRust ownership and borrowing rules keep \
             memory safe. The borrow checker enforces ownership.",
        );
        let rails = add(
            &backend,
            "rails.txt",
            "Ruby on Rails is a web framework. Rails routes requests to \
             controllers written in Ruby.",
        );
        (tmp, backend, rust, rails)
    }

    fn run(backend: &LocalBackend, opts: RawSearchOptions) -> Value {
        let request = normalize(&opts).unwrap();
        dispatch(&request, backend).unwrap()
    }

    #[test]
    fn add_extracts_metadata() {
        let (_tmp, backend, rust, _) = seeded();
        let doc = backend.get_document(&rust).unwrap();
        assert_eq!(doc.title, "Rust Ownership");
        assert_eq!(doc.content_type, "markdown");
        assert_eq!(doc.status, ProcessingState::Processed);
        assert!(doc.embeddings_count >= 1);
        assert!(doc.keywords.contains(&"ownership".to_string()));
    }

    #[test]
    fn readding_replaces_and_keeps_user_metadata() {
        let (_tmp, backend, rust, _) = seeded();
        backend
            .update_document(
                &rust,
                &DocumentUpdate {
                    classification: Some("guide".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let outcome = backend
            .add_document(Path::new("/docs/rust.md"), "# Rust 2\n\nNew text.")
            .unwrap();
        assert!(outcome.replaced);
        assert_eq!(outcome.document_id, rust);

        let doc = backend.get_document(&rust).unwrap();
        assert_eq!(doc.title, "Rust 2");
        assert_eq!(doc.classification.as_deref(), Some("guide"));
        assert_eq!(backend.stats().unwrap().total_documents, 2);
    }

    #[test]
    fn empty_content_is_marked_failed() {
        let (_tmp, backend) = backend();
        let id = add(&backend, "blank.txt", "   \n");
        let status = backend.document_status(&id).unwrap();
        assert_eq!(status.status, ProcessingState::Failed);
        assert!(!status.embeddings_ready);
        assert_eq!(status.embeddings_count, 0);
    }

    #[test]
    fn prefix_and_hash_references_resolve() {
        let (_tmp, backend, rust, _) = seeded();
        let prefix = format!("#{}", &rust[..6].to_uppercase());
        assert_eq!(backend.get_document(&prefix).unwrap().id, rust);

        assert!(matches!(
            backend.get_document(&rust[..2]),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            backend.get_document("ffffffffffff"),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn document_tail_is_searchable() {
        let (_tmp, backend) = backend();
        let text = format!("{}zeppelin", "filler ".repeat(263));
        let id = add(&backend, "tail.txt", &text);

        let response = run(
            &backend,
            RawSearchOptions {
                query: "zeppelin".to_string(),
                threshold: Some("0.001".to_string()),
                ..Default::default()
            },
        );
        let results = project(&response, SearchType::Semantic);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_deref(), Some(id.as_str()));
    }

    #[test]
    fn semantic_search_ranks_and_reports_statistics() {
        let (_tmp, backend, rust, _) = seeded();
        let response = run(
            &backend,
            RawSearchOptions {
                query: "ownership borrow checker".to_string(),
                threshold: Some("0.1".to_string()),
                ..Default::default()
            },
        );

        let results = project(&response, SearchType::Semantic);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id.as_deref(), Some(rust.as_str()));
        assert!(results[0].score.unwrap() > 0.1);
        assert_eq!(results[0].title.as_deref(), Some("Rust Ownership"));

        let stats = &response["statistics"];
        assert_eq!(stats["threshold_used"], json!(0.1));
        assert!(stats["total_embeddings_checked"].as_u64().unwrap() >= 2);
        assert_eq!(response["total_results"], json!(1));
    }

    #[test]
    fn high_threshold_empty_result_gets_a_suggestion() {
        let (_tmp, backend, _, _) = seeded();
        let response = run(
            &backend,
            RawSearchOptions {
                query: "ownership".to_string(),
                threshold: Some("0.99".to_string()),
                ..Default::default()
            },
        );

        assert!(project(&response, SearchType::Semantic).is_empty());
        let report = diagnose(&response);
        assert_eq!(report.condition, DiagnosticCondition::ThresholdTooHigh);
        let suggested = report.suggested_threshold.unwrap();
        assert!(suggested > 0.0 && suggested < 0.99);
    }

    #[test]
    fn empty_store_diagnoses_no_embeddings() {
        let (_tmp, backend) = backend();
        let response = run(
            &backend,
            RawSearchOptions {
                query: "anything".to_string(),
                ..Default::default()
            },
        );
        assert_eq!(diagnose(&response).condition, DiagnosticCondition::NoEmbeddings);
    }

    #[test]
    fn fulltext_uses_stemming() {
        let (_tmp, backend, _, rails) = seeded();
        let response = run(
            &backend,
            RawSearchOptions {
                query: "routing controller".to_string(),
                search_type: Some("fulltext".to_string()),
                ..Default::default()
            },
        );
        let results = project(&response, SearchType::Fulltext);
        assert_eq!(results[0].id.as_deref(), Some(rails.as_str()));
        let score = results[0].score.unwrap();
        assert!(score > 0.0 && score < 1.0);
    }

    #[test]
    fn hybrid_blends_both_signals() {
        let (_tmp, backend, rust, _) = seeded();
        let response = run(
            &backend,
            RawSearchOptions {
                query: "ownership".to_string(),
                search_type: Some("hybrid".to_string()),
                semantic_weight: Some("0.5".to_string()),
                text_weight: Some("0.5".to_string()),
                ..Default::default()
            },
        );

        let first = &response["results"][0];
        assert_eq!(first["document_id"], json!(rust));
        let sem = first["similarity"].as_f64().unwrap();
        let text = first["fulltext_similarity"].as_f64().unwrap();
        let combined = first["combined_score"].as_f64().unwrap();
        assert!((combined - (0.5 * sem + 0.5 * text)).abs() < 1e-9);
        assert!((first["weighted_score"].as_f64().unwrap() - combined).abs() < 1e-9);
        assert_eq!(response["weights"], json!({"semantic": 0.5, "text": 0.5}));
    }

    #[test]
    fn filters_narrow_candidates() {
        let (_tmp, backend, _, _) = seeded();
        let response = run(
            &backend,
            RawSearchOptions {
                query: "ruby rails ownership".to_string(),
                content_type: Some("markdown".to_string()),
                threshold: Some("0.01".to_string()),
                ..Default::default()
            },
        );
        let results = project(&response, SearchType::Semantic);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].title.as_deref(), Some("Rust Ownership"));
    }

    #[test]
    fn keyword_modes() {
        let (_tmp, backend, rust, rails) = seeded();
        backend
            .set_keywords(&rust, &["rust".to_string(), "memory".to_string()])
            .unwrap();
        backend
            .set_keywords(&rails, &["ruby".to_string(), "web".to_string()])
            .unwrap();

        let any = backend
            .search_by_keywords(&["rust".to_string(), "web".to_string()], 10)
            .unwrap();
        assert_eq!(any.as_array().unwrap().len(), 2);
        assert_eq!(any[0]["keyword_score"], json!(0.5));

        let all = backend
            .search_by_keywords_all(&["RUST".to_string(), "memory".to_string()], 10)
            .unwrap();
        let all = all.as_array().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["document_id"], json!(rust));
        assert_eq!(all[0]["keyword_score"], json!(1.0));
    }

    #[test]
    fn keyword_editing() {
        let (_tmp, backend, rust, _) = seeded();
        backend.set_keywords(&rust, &["a1".to_string()]).unwrap();
        let kws = backend
            .add_keywords(&rust, &["B2".to_string(), "a1".to_string()])
            .unwrap();
        assert_eq!(kws, vec!["a1", "b2"]);
        let kws = backend.remove_keywords(&rust, &["A1".to_string()]).unwrap();
        assert_eq!(kws, vec!["b2"]);
        assert!(backend.add_keywords(&rust, &[" ".to_string()]).is_err());
    }

    #[test]
    fn keyword_statistics_and_frequencies() {
        let (_tmp, backend, rust, rails) = seeded();
        backend
            .set_keywords(&rust, &["shared".to_string(), "rust".to_string()])
            .unwrap();
        backend.set_keywords(&rails, &["shared".to_string()]).unwrap();

        let freq = backend.keyword_frequencies(10, 2).unwrap();
        assert_eq!(freq, vec![("shared".to_string(), 2)]);

        let stats = backend.keyword_statistics().unwrap();
        assert_eq!(stats.total_keywords, 2);
        assert_eq!(stats.documents_with_keywords, 2);
        assert_eq!(stats.avg_keywords_per_document, 1.5);
        assert_eq!(stats.singleton_keywords, 1);
        assert_eq!(stats.top_keywords[0], ("shared".to_string(), 2));
    }

    #[test]
    fn delete_removes_from_every_index() {
        let (_tmp, backend, rust, _) = seeded();
        let deleted = backend.delete_document(&rust).unwrap();
        assert_eq!(deleted.id, rust);
        assert!(backend.get_document(&rust).is_err());

        let response = run(
            &backend,
            RawSearchOptions {
                query: "ownership".to_string(),
                search_type: Some("fulltext".to_string()),
                ..Default::default()
            },
        );
        assert!(project(&response, SearchType::Fulltext).is_empty());
    }

    #[test]
    fn update_requires_a_change() {
        let (_tmp, backend, rust, _) = seeded();
        assert!(matches!(
            backend.update_document(&rust, &DocumentUpdate::default()),
            Err(Error::InvalidRequest(_))
        ));

        let doc = backend
            .update_document(
                &rust,
                &DocumentUpdate {
                    title: Some("Ownership Guide".to_string()),
                    tags: Some(vec!["Systems".to_string()]),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(doc.title, "Ownership Guide");
        assert_eq!(doc.tags, vec!["systems"]);
    }

    #[test]
    fn context_collects_best_chunks() {
        let (_tmp, backend, rust, _) = seeded();
        let context = backend.get_context("borrow checker", 5).unwrap();
        assert_eq!(context.total_chunks, 1);
        assert_eq!(context.context_chunks[0].document_id, rust);
        assert_eq!(context.context_chunks[0].source, "Rust Ownership");
        assert!(context.combined_context.contains("borrow checker"));
    }

    #[test]
    fn list_is_newest_first() {
        let (_tmp, backend, rust, rails) = seeded();
        backend.set_keywords(&rust, &["touched".to_string()]).unwrap();
        let docs = backend.list_documents(10).unwrap();
        assert_eq!(docs[0].id, rust);
        assert_eq!(docs[1].id, rails);
        assert_eq!(backend.list_documents(1).unwrap().len(), 1);
    }

    #[test]
    fn search_tracking_and_cleanup() {
        let (_tmp, backend, rust, _) = seeded();
        let old = Utc::now() - Duration::days(40);
        let record = |query: &str, ids: Vec<String>| SearchRecord {
            query: query.to_string(),
            search_type: "semantic".to_string(),
            results_count: ids.len(),
            result_ids: ids,
            execution_time_ms: 5,
            session_id: None,
            user_id: Some("u1".to_string()),
            created_at: old,
        };

        backend.record_search(&record("nothing", vec![])).unwrap();
        backend
            .record_search(&record("orphan", vec!["000000000000".to_string()]))
            .unwrap();
        backend.record_search(&record("live", vec![rust])).unwrap();

        let history = backend
            .search_history(
                10,
                &HistoryFilter {
                    user_id: Some("u1".to_string()),
                    session_id: None,
                },
            )
            .unwrap();
        assert_eq!(history.len(), 3);

        let report = backend.cleanup_searches(30, true).unwrap();
        assert_eq!(report.unused_count, 1);
        assert_eq!(report.orphaned_count, 1);
        assert!(report.dry_run);
        assert_eq!(backend.search_history(10, &HistoryFilter::default()).unwrap().len(), 3);

        backend.cleanup_searches(30, false).unwrap();
        let left = backend.search_history(10, &HistoryFilter::default()).unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].query, "live");
    }

    #[test]
    fn health_and_stats() {
        let (_tmp, backend, _, _) = seeded();
        assert!(backend.healthy());
        let stats = backend.stats().unwrap();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.by_type.get("markdown"), Some(&1));
        assert_eq!(stats.by_type.get("text"), Some(&1));
        assert_eq!(stats.by_status.get("processed"), Some(&2));
    }
}
