use std::path::Path;

use tantivy::{
    Index,
    IndexReader,
    IndexWriter,
    TantivyDocument,
    collector::TopDocs,
    doc,
    query::QueryParser,
    schema::*,
    tokenizer::{
        LowerCaser,
        RemoveLongFilter,
        SimpleTokenizer,
        Stemmer,
        TextAnalyzer,
    },
};

use crate::error::Result;

/// Memory budget handed to every index writer.
pub const WRITER_BUDGET: usize = 15_000_000;

/// Field names used in the schema.
pub mod fields {
    pub const DOC_ID: &str = "doc_id";
    pub const TITLE: &str = "title";
    pub const BODY: &str = "body";
    pub const CONTENT_TYPE: &str = "content_type";
}

/// Full-text index over stored documents, scored with BM25.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
struct SchemaFields {
    doc_id: Field,
    title: Field,
    body: Field,
    content_type: Field,
}

/// One full-text match.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub doc_id: String,
    /// Raw BM25 score.
    pub score: f32,
}

impl IndexHit {
    /// BM25 mapped into [0, 1) as `s / (s + 1)`.
    pub fn normalized_score(&self) -> f64 {
        let s = f64::from(self.score.max(0.0));
        s / (s + 1.0)
    }
}

fn build_schema() -> (Schema, SchemaFields) {
    let mut builder = Schema::builder();

    let doc_id = builder.add_text_field(fields::DOC_ID, STRING | STORED);

    let stemmed = TextFieldIndexing::default()
        .set_tokenizer("en_stem")
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    let title = builder.add_text_field(
        fields::TITLE,
        TextOptions::default()
            .set_indexing_options(stemmed.clone())
            .set_stored(),
    );
    let body = builder.add_text_field(
        fields::BODY,
        TextOptions::default().set_indexing_options(stemmed),
    );
    let content_type =
        builder.add_text_field(fields::CONTENT_TYPE, STRING | STORED);

    let schema = builder.build();
    let fields = SchemaFields {
        doc_id,
        title,
        body,
        content_type,
    };

    (schema, fields)
}

fn register_tokenizers(index: &Index) {
    let en_stem = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(40))
        .filter(LowerCaser)
        .filter(Stemmer::new(tantivy::tokenizer::Language::English))
        .build();
    index.tokenizers().register("en_stem", en_stem);
}

impl SearchIndex {
    /// Open or create a search index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let (schema, fields) = build_schema();

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(mmap_dir, schema, tantivy::IndexSettings::default())?
        };

        register_tokenizers(&index);
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Create an in-memory search index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        let (schema, fields) = build_schema();
        let index = Index::create_in_ram(schema);
        register_tokenizers(&index);
        let reader = index.reader()?;

        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Create a writer with the given memory budget (in bytes).
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer(memory_budget)?)
    }

    /// Add or replace a document via the given writer.
    pub fn add_document(
        &self,
        writer: &IndexWriter,
        doc_id: &str,
        title: &str,
        body: &str,
        content_type: &str,
    ) -> Result<()> {
        let f = self.fields;

        writer.delete_term(Term::from_field_text(f.doc_id, doc_id));
        writer.add_document(doc!(
            f.doc_id => doc_id,
            f.title => title,
            f.body => body,
            f.content_type => content_type,
        ))?;

        Ok(())
    }

    pub fn delete_document(&self, writer: &IndexWriter, doc_id: &str) {
        writer.delete_term(Term::from_field_text(self.fields.doc_id, doc_id));
    }

    /// BM25 search over title and body, title boosted 2x.
    ///
    /// Query syntax errors are tolerated: whatever parses is searched.
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<IndexHit>> {
        let f = self.fields;
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let mut parser =
            QueryParser::for_index(&self.index, vec![f.title, f.body]);
        parser.set_field_boost(f.title, 2.0);

        let (query, _errors) = parser.parse_query_lenient(query_str);
        let top_docs =
            searcher.search(&query, &TopDocs::with_limit(limit.max(1)))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            hits.push(IndexHit {
                doc_id: extract_text(&doc, f.doc_id),
                score,
            });
        }

        Ok(hits)
    }

    /// Number of live documents in the index.
    pub fn num_docs(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}
