//! The narrow interfaces the CLI core uses to reach a retrieval backend.
//!
//! Search operations return loosely typed JSON because each strategy shapes
//! its response differently; see [`crate::projector`] for how results are read
//! back out. Document-store and analytics operations return typed values.

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    analytics::{
        AnalyticsOverview,
        CleanupReport,
        HistoryFilter,
        SearchRecord,
        TrendingQuery,
    },
    error::Result,
    request::SearchRequest,
};

/// Hybrid blending weights. A `None` weight is left for the backend to
/// default.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HybridWeights {
    pub semantic: Option<f64>,
    pub text: Option<f64>,
}

/// Retrieval operations.
pub trait Retrieval {
    /// Similarity search.
    ///
    /// Response: `{results, statistics?, total_results?, execution_time_ms?}`
    /// where each result carries `similarity`.
    fn search(&self, request: &SearchRequest) -> Result<Value>;

    /// Blended semantic + full-text search. Results carry `combined_score`
    /// and/or `weighted_score`.
    fn hybrid_search(
        &self,
        request: &SearchRequest,
        weights: HybridWeights,
    ) -> Result<Value>;

    /// Lexical search. Results carry `fulltext_similarity`.
    fn fulltext_search(&self, request: &SearchRequest) -> Result<Value>;

    /// Documents carrying any of `keywords`. Response is a JSON array.
    fn search_by_keywords(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Value>;

    /// Documents carrying all of `keywords`. Response is a JSON array.
    fn search_by_keywords_all(
        &self,
        keywords: &[String],
        limit: usize,
    ) -> Result<Value>;

    /// Best-matching chunks for `query`, for use as prompt context.
    fn get_context(&self, query: &str, limit: usize) -> Result<Context>;
}

/// Document CRUD, status and keyword management.
pub trait DocumentStore {
    fn add_document(&self, location: &Path, content: &str)
    -> Result<AddOutcome>;
    fn get_document(&self, id: &str) -> Result<Document>;
    fn update_document(
        &self,
        id: &str,
        update: &DocumentUpdate,
    ) -> Result<Document>;
    fn delete_document(&self, id: &str) -> Result<Document>;
    fn list_documents(&self, limit: usize) -> Result<Vec<Document>>;
    fn document_status(&self, id: &str) -> Result<DocumentStatus>;
    fn stats(&self) -> Result<StoreStats>;
    fn healthy(&self) -> bool;

    /// Each keyword operation returns the document's resulting keyword set.
    fn add_keywords(&self, id: &str, keywords: &[String])
    -> Result<Vec<String>>;
    fn remove_keywords(
        &self,
        id: &str,
        keywords: &[String],
    ) -> Result<Vec<String>>;
    fn set_keywords(&self, id: &str, keywords: &[String])
    -> Result<Vec<String>>;

    /// `(keyword, document count)` pairs, most used first.
    fn keyword_frequencies(
        &self,
        limit: usize,
        min_count: usize,
    ) -> Result<Vec<(String, usize)>>;
    fn keyword_statistics(&self) -> Result<KeywordStats>;
}

/// Search tracking and analytics.
pub trait SearchAnalytics {
    fn record_search(&self, record: &SearchRecord) -> Result<()>;
    fn search_analytics(&self, days: u32) -> Result<AnalyticsOverview>;
    fn search_history(
        &self,
        limit: usize,
        filter: &HistoryFilter,
    ) -> Result<Vec<SearchRecord>>;
    fn trending_queries(
        &self,
        limit: usize,
        days: u32,
    ) -> Result<Vec<TrendingQuery>>;
    fn cleanup_searches(&self, days: u32, dry_run: bool)
    -> Result<CleanupReport>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Pending,
    Processed,
    Failed,
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ProcessingState::Pending => "pending",
            ProcessingState::Processed => "processed",
            ProcessingState::Failed => "failed",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub location: String,
    pub content: String,
    pub content_type: String,
    pub classification: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub status: ProcessingState,
    pub embeddings_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub title: Option<String>,
    pub classification: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl DocumentUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.classification.is_none()
            && self.tags.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddOutcome {
    pub document_id: String,
    pub title: String,
    /// True when the location was already stored and got replaced.
    pub replaced: bool,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentStatus {
    pub id: String,
    pub status: ProcessingState,
    pub embeddings_count: usize,
    pub embeddings_ready: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_documents: usize,
    pub total_embeddings: usize,
    pub storage_type: String,
    pub by_status: BTreeMap<String, usize>,
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeywordStats {
    pub total_keywords: usize,
    pub documents_with_keywords: usize,
    pub avg_keywords_per_document: f64,
    pub top_keywords: Vec<(String, usize)>,
    /// Keywords carried by exactly one document.
    pub singleton_keywords: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextChunk {
    pub document_id: String,
    pub source: String,
    pub content: String,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    pub context_chunks: Vec<ContextChunk>,
    pub combined_context: String,
    pub total_chunks: usize,
}
