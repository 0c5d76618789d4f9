//! ragdoll - a command-line client for a document retrieval store.
//!
//! The core turns user flags into a validated [`SearchRequest`], routes it to
//! one retrieval strategy (semantic, hybrid, full-text or keyword), reads a
//! uniform result list back out of the strategy-specific response, and
//! explains empty result sets using the similarity statistics the backend
//! reports.
//!
//! The core only talks to the [`backend::Retrieval`],
//! [`backend::DocumentStore`] and [`backend::SearchAnalytics`] traits.
//! [`LocalBackend`] implements them on top of
//! [redb](https://github.com/cberner/redb) and
//! [Tantivy](https://github.com/quickwit-oss/tantivy).
//!
//! # Quick start
//!
//! ```no_run
//! use ragdoll::{BackendSettings, DataDir, LocalBackend};
//! use ragdoll::backend::DocumentStore;
//! use ragdoll::request::{RawSearchOptions, normalize};
//! use ragdoll::{diagnostics, dispatch, projector};
//!
//! let data_dir = DataDir::resolve(None, None).unwrap();
//! let backend = LocalBackend::open(&data_dir, BackendSettings::default()).unwrap();
//! backend
//!     .add_document("notes/rust.md".as_ref(), "# Ownership\n\nBorrowing rules.")
//!     .unwrap();
//!
//! let request = normalize(&RawSearchOptions {
//!     query: "borrowing".to_string(),
//!     ..Default::default()
//! })
//! .unwrap();
//! let response = dispatch::dispatch(&request, &backend).unwrap();
//! let results = projector::project(&response, request.search_type);
//!
//! if results.is_empty() {
//!     for line in diagnostics::diagnose(&response).guidance {
//!         println!("{line}");
//!     }
//! }
//! for r in &results {
//!     println!("{:?} (score: {:?})", r.title, r.score);
//! }
//! ```

pub mod analytics;
pub mod backend;
pub mod chunking;
pub mod config;
pub mod data_dir;
pub mod diagnostics;
pub mod dispatch;
pub mod doc_id;
pub mod document_db;
pub mod error;
pub mod ingestion;
pub mod keywords;
pub mod listing;
pub mod local_backend;
pub mod projector;
pub mod request;
pub mod similarity;
pub mod tantivy_index;
pub mod walker;

pub use config::Config;
pub use data_dir::DataDir;
pub use doc_id::DocumentId;
pub use document_db::DocumentDb;
pub use error::{Error, Result};
pub use local_backend::{BackendSettings, LocalBackend};
pub use request::SearchRequest;
pub use tantivy_index::SearchIndex;
