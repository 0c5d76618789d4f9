//! Strategy selection: one normalized request, one backend call.

use serde_json::Value;
use tracing::debug;

use crate::{
    backend::{HybridWeights, Retrieval},
    error::{Error, Result},
    keywords::{KeywordMethod, resolve_keyword_mode},
    request::{SearchRequest, SearchType},
};

/// Route `request` to the retrieval operation matching its search type.
///
/// Performs exactly one backend call and never retries. Failures come back
/// as [`Error::Backend`].
pub fn dispatch(
    request: &SearchRequest,
    backend: &dyn Retrieval,
) -> Result<Value> {
    debug!(
        search_type = %request.search_type,
        limit = request.limit,
        "dispatching search"
    );

    let response = match request.search_type {
        SearchType::Semantic => backend.search(request),
        SearchType::Hybrid => {
            let weights = HybridWeights {
                semantic: request.semantic_weight,
                text: request.text_weight,
            };
            backend.hybrid_search(request, weights)
        }
        SearchType::Fulltext => backend.fulltext_search(request),
        SearchType::Keyword => {
            let mode = resolve_keyword_mode(request).ok_or_else(|| {
                Error::invalid("keyword search requires at least one keyword")
            })?;
            match mode.method {
                KeywordMethod::All => {
                    backend.search_by_keywords_all(&mode.keywords, request.limit)
                }
                KeywordMethod::Any => {
                    backend.search_by_keywords(&mode.keywords, request.limit)
                }
            }
        }
    };

    response.map_err(Error::into_backend)
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;

    use serde_json::json;

    use super::*;
    use crate::{
        backend::Context,
        request::{RawSearchOptions, normalize},
    };

    /// One recorded backend invocation.
    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Search(String),
        Hybrid(String, HybridWeights),
        Fulltext(String),
        Keywords(Vec<String>, usize),
        KeywordsAll(Vec<String>, usize),
        Context(String, usize),
    }

    /// Backend double that records calls and replays a canned response.
    pub struct RecordingBackend {
        pub calls: RefCell<Vec<Call>>,
        pub response: Value,
        pub fail: bool,
    }

    impl RecordingBackend {
        pub fn new(response: Value) -> Self {
            Self {
                calls: RefCell::new(Vec::new()),
                response,
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(Value::Null)
            }
        }

        fn reply(&self, call: Call) -> Result<Value> {
            self.calls.borrow_mut().push(call);
            if self.fail {
                return Err(Error::Io(std::io::Error::other("connection reset")));
            }
            Ok(self.response.clone())
        }
    }

    impl Retrieval for RecordingBackend {
        fn search(&self, request: &SearchRequest) -> Result<Value> {
            self.reply(Call::Search(request.query.clone()))
        }

        fn hybrid_search(
            &self,
            request: &SearchRequest,
            weights: HybridWeights,
        ) -> Result<Value> {
            self.reply(Call::Hybrid(request.query.clone(), weights))
        }

        fn fulltext_search(&self, request: &SearchRequest) -> Result<Value> {
            self.reply(Call::Fulltext(request.query.clone()))
        }

        fn search_by_keywords(
            &self,
            keywords: &[String],
            limit: usize,
        ) -> Result<Value> {
            self.reply(Call::Keywords(keywords.to_vec(), limit))
        }

        fn search_by_keywords_all(
            &self,
            keywords: &[String],
            limit: usize,
        ) -> Result<Value> {
            self.reply(Call::KeywordsAll(keywords.to_vec(), limit))
        }

        fn get_context(&self, query: &str, limit: usize) -> Result<Context> {
            self.calls
                .borrow_mut()
                .push(Call::Context(query.to_string(), limit));
            Ok(Context {
                context_chunks: vec![],
                combined_context: String::new(),
                total_chunks: 0,
            })
        }
    }

    fn request(opts: RawSearchOptions) -> SearchRequest {
        normalize(&opts).unwrap()
    }

    #[test]
    fn semantic_goes_to_search() {
        let backend = RecordingBackend::new(json!({"results": []}));
        let req = request(RawSearchOptions {
            query: "data pipeline".to_string(),
            ..Default::default()
        });

        dispatch(&req, &backend).unwrap();
        assert_eq!(
            *backend.calls.borrow(),
            vec![Call::Search("data pipeline".to_string())]
        );
    }

    #[test]
    fn hybrid_carries_exactly_the_given_weights() {
        let backend = RecordingBackend::new(json!({"results": []}));
        let req = request(RawSearchOptions {
            query: "data pipeline".to_string(),
            search_type: Some("hybrid".to_string()),
            semantic_weight: Some("0.6".to_string()),
            text_weight: Some("0.4".to_string()),
            ..Default::default()
        });

        dispatch(&req, &backend).unwrap();
        assert_eq!(
            *backend.calls.borrow(),
            vec![Call::Hybrid(
                "data pipeline".to_string(),
                HybridWeights {
                    semantic: Some(0.6),
                    text: Some(0.4),
                }
            )]
        );
    }

    #[test]
    fn hybrid_omits_absent_weights() {
        let backend = RecordingBackend::new(json!({"results": []}));
        let req = request(RawSearchOptions {
            query: "q".to_string(),
            search_type: Some("hybrid".to_string()),
            text_weight: Some("0.2".to_string()),
            ..Default::default()
        });

        dispatch(&req, &backend).unwrap();
        assert_eq!(
            *backend.calls.borrow(),
            vec![Call::Hybrid(
                "q".to_string(),
                HybridWeights {
                    semantic: None,
                    text: Some(0.2),
                }
            )]
        );
    }

    #[test]
    fn fulltext_goes_to_fulltext() {
        let backend = RecordingBackend::new(json!({"results": []}));
        let req = request(RawSearchOptions {
            query: "q".to_string(),
            search_type: Some("fulltext".to_string()),
            ..Default::default()
        });

        dispatch(&req, &backend).unwrap();
        assert_eq!(
            *backend.calls.borrow(),
            vec![Call::Fulltext("q".to_string())]
        );
    }

    #[test]
    fn bare_keywords_with_all_flag_use_and_mode() {
        let backend = RecordingBackend::new(json!([]));
        let req = request(RawSearchOptions {
            keywords: Some("ruby,rails".to_string()),
            keywords_all: true,
            ..Default::default()
        });

        dispatch(&req, &backend).unwrap();
        assert_eq!(
            *backend.calls.borrow(),
            vec![Call::KeywordsAll(
                vec!["ruby".to_string(), "rails".to_string()],
                10
            )]
        );
    }

    #[test]
    fn keyword_type_defaults_to_or_mode() {
        let backend = RecordingBackend::new(json!([]));
        let req = request(RawSearchOptions {
            query: "anything".to_string(),
            search_type: Some("keyword".to_string()),
            keywords: Some("ruby".to_string()),
            limit: Some("3".to_string()),
            ..Default::default()
        });

        dispatch(&req, &backend).unwrap();
        assert_eq!(
            *backend.calls.borrow(),
            vec![Call::Keywords(vec!["ruby".to_string()], 3)]
        );
    }

    #[test]
    fn keywords_ride_along_on_semantic_search() {
        let backend = RecordingBackend::new(json!({"results": []}));
        let req = request(RawSearchOptions {
            query: "web frameworks".to_string(),
            keywords: Some("ruby".to_string()),
            ..Default::default()
        });

        dispatch(&req, &backend).unwrap();
        assert_eq!(
            *backend.calls.borrow(),
            vec![Call::Search("web frameworks".to_string())]
        );
    }

    #[test]
    fn backend_failure_surfaces_as_backend_error() {
        let backend = RecordingBackend::failing();
        let req = SearchRequest::new("q");

        let err = dispatch(&req, &backend).unwrap_err();
        assert!(matches!(err, Error::Backend(ref m) if m.contains("connection reset")));
        // No retry.
        assert_eq!(backend.calls.borrow().len(), 1);
    }
}
