//! Document listing with keyword filtering and best-effort status refresh.

use serde::Serialize;
use tracing::warn;

use crate::{
    backend::{Document, DocumentStore},
    error::Result,
    keywords::{KeywordFilter, KeywordMethod, KeywordMode},
};

pub const DEFAULT_LIST_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct ListOptions {
    pub limit: usize,
    pub keywords: Option<Vec<String>>,
    pub keywords_all: bool,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIST_LIMIT,
            keywords: None,
            keywords_all: false,
        }
    }
}

impl ListOptions {
    pub fn keyword_mode(&self) -> Option<KeywordMode> {
        self.keywords.as_ref().map(|keywords| KeywordMode {
            method: KeywordMethod::from_all_flag(self.keywords_all),
            keywords: keywords.clone(),
        })
    }
}

/// Whether a listed document's processing status could be refreshed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Enrichment {
    Fresh,
    /// The refresh failed; the stored counts are shown as they were.
    Stale { reason: String },
}

impl Enrichment {
    pub fn is_stale(&self) -> bool {
        matches!(self, Enrichment::Stale { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListedDocument {
    #[serde(flatten)]
    pub document: Document,
    pub enrichment: Enrichment,
}

/// List documents, newest first, applying the keyword filter before the
/// limit.
pub fn list_documents(
    store: &dyn DocumentStore,
    options: &ListOptions,
) -> Result<Vec<ListedDocument>> {
    let documents = match options.keyword_mode() {
        Some(mode) => {
            let filter = KeywordFilter::from_mode(&mode);
            let mut matched: Vec<Document> = store
                .list_documents(usize::MAX)?
                .into_iter()
                .filter(|d| filter.matches(&d.keywords))
                .collect();
            matched.truncate(options.limit);
            matched
        }
        None => store.list_documents(options.limit)?,
    };

    Ok(documents
        .into_iter()
        .map(|document| enrich(store, document))
        .collect())
}

fn enrich(store: &dyn DocumentStore, mut document: Document) -> ListedDocument {
    match store.document_status(&document.id) {
        Ok(status) => {
            document.status = status.status;
            document.embeddings_count = status.embeddings_count;
            ListedDocument {
                document,
                enrichment: Enrichment::Fresh,
            }
        }
        Err(e) => {
            warn!(id = %document.id, error = %e, "could not refresh document status");
            ListedDocument {
                document,
                enrichment: Enrichment::Stale {
                    reason: e.to_string(),
                },
            }
        }
    }
}
