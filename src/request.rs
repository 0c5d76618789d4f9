//! Turning raw option flags into a canonical [`SearchRequest`].
//!
//! Flags arrive as strings (from the command line or from tests) and are
//! parsed here rather than by clap, so that every malformed value surfaces as
//! the same [`Error::InvalidRequest`] before anything reaches a backend.

use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::error::{Error, Result};

pub const DEFAULT_LIMIT: usize = 10;

/// Retrieval strategy requested by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Semantic,
    Hybrid,
    Fulltext,
    Keyword,
}

impl SearchType {
    pub const ALL: [SearchType; 4] = [
        SearchType::Semantic,
        SearchType::Hybrid,
        SearchType::Fulltext,
        SearchType::Keyword,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchType::Semantic => "semantic",
            SearchType::Hybrid => "hybrid",
            SearchType::Fulltext => "fulltext",
            SearchType::Keyword => "keyword",
        }
    }
}

impl fmt::Display for SearchType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchType {
    type Err = Error;

    /// Case-sensitive match against the closed set of strategies.
    fn from_str(s: &str) -> Result<Self> {
        SearchType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| {
                Error::invalid(format!(
                    "unknown search type '{s}' (expected one of: semantic, hybrid, fulltext, keyword)"
                ))
            })
    }
}

/// Option flags exactly as the user supplied them.
#[derive(Debug, Clone, Default)]
pub struct RawSearchOptions {
    pub query: String,
    pub search_type: Option<String>,
    pub limit: Option<String>,
    pub threshold: Option<String>,
    pub content_type: Option<String>,
    pub classification: Option<String>,
    pub keywords: Option<String>,
    pub keywords_all: bool,
    pub tags: Option<String>,
    pub semantic_weight: Option<String>,
    pub text_weight: Option<String>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    /// `None` means "not specified", which defaults to tracking.
    pub track_search: Option<bool>,
}

/// Canonical, validated search request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub search_type: SearchType,
    pub limit: usize,
    pub threshold: Option<f64>,
    pub content_type: Option<String>,
    pub classification: Option<String>,
    pub keywords: Option<Vec<String>>,
    pub keywords_all: bool,
    pub tags: Option<Vec<String>>,
    pub semantic_weight: Option<f64>,
    pub text_weight: Option<f64>,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub track_search: bool,
}

impl SearchRequest {
    /// A plain semantic request for `query` with every option at its default.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            search_type: SearchType::default(),
            limit: DEFAULT_LIMIT,
            threshold: None,
            content_type: None,
            classification: None,
            keywords: None,
            keywords_all: false,
            tags: None,
            semantic_weight: None,
            text_weight: None,
            session_id: None,
            user_id: None,
            track_search: true,
        }
    }

    /// Whether the threshold lies outside [0, 1]. The value is still passed
    /// to the backend untouched; this only drives a warning.
    pub fn threshold_out_of_range(&self) -> bool {
        self.threshold.is_some_and(|t| !(0.0..=1.0).contains(&t))
    }
}

/// Build a [`SearchRequest`] from raw flags.
pub fn normalize(raw: &RawSearchOptions) -> Result<SearchRequest> {
    let explicit_type = raw
        .search_type
        .as_deref()
        .map(str::parse::<SearchType>)
        .transpose()?;

    let keywords = raw.keywords.as_deref().and_then(split_list);
    let tags = raw.tags.as_deref().and_then(split_list);

    let query = raw.query.trim();
    let (query, search_type) = match (query.is_empty(), explicit_type) {
        (false, ty) => (query.to_string(), ty.unwrap_or_default()),
        // A bare keyword list with no query and no explicit strategy is a
        // keyword-only search.
        (true, None | Some(SearchType::Keyword)) => match &keywords {
            Some(kws) => (kws.join(" "), SearchType::Keyword),
            None => return Err(Error::invalid("query must not be empty")),
        },
        (true, Some(_)) => {
            return Err(Error::invalid("query must not be empty"));
        }
    };

    if search_type == SearchType::Keyword && keywords.is_none() {
        return Err(Error::invalid(
            "keyword search requires at least one keyword (--keywords)",
        ));
    }

    let limit = match raw.limit.as_deref() {
        Some(s) => parse_number::<usize>("limit", s)?,
        None => DEFAULT_LIMIT,
    };
    if limit == 0 {
        return Err(Error::invalid("limit must be greater than zero"));
    }

    Ok(SearchRequest {
        query,
        search_type,
        limit,
        threshold: parse_optional("threshold", raw.threshold.as_deref())?,
        content_type: non_blank(raw.content_type.as_deref()),
        classification: non_blank(raw.classification.as_deref()),
        keywords,
        keywords_all: raw.keywords_all,
        tags,
        semantic_weight: parse_optional(
            "semantic-weight",
            raw.semantic_weight.as_deref(),
        )?,
        text_weight: parse_optional("text-weight", raw.text_weight.as_deref())?,
        session_id: non_blank(raw.session_id.as_deref()),
        user_id: non_blank(raw.user_id.as_deref()),
        track_search: raw.track_search.unwrap_or(true),
    })
}

/// Split a comma-separated flag, trimming entries and dropping empty ones.
///
/// Returns `None` when nothing is left, so callers skip the filter entirely
/// instead of filtering against an empty set.
pub fn split_list(raw: &str) -> Option<Vec<String>> {
    let items: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

/// Parse a numeric flag, naming the flag in the error.
pub fn parse_number<T: FromStr>(flag: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| {
        Error::invalid(format!("--{flag} expects a number, got '{raw}'"))
    })
}

fn parse_optional(flag: &str, raw: Option<&str>) -> Result<Option<f64>> {
    raw.map(|s| {
        let value: f64 = parse_number(flag, s)?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Error::invalid(format!("--{flag} must be finite")))
        }
    })
    .transpose()
}

fn non_blank(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(query: &str) -> RawSearchOptions {
        RawSearchOptions {
            query: query.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn defaults() {
        let req = normalize(&raw("data pipeline")).unwrap();
        assert_eq!(req.query, "data pipeline");
        assert_eq!(req.search_type, SearchType::Semantic);
        assert_eq!(req.limit, DEFAULT_LIMIT);
        assert!(req.track_search);
        assert!(!req.keywords_all);
        assert_eq!(req.keywords, None);
        assert_eq!(req.threshold, None);
    }

    #[test]
    fn empty_query_is_rejected() {
        for q in ["", "   ", "\t\n"] {
            let err = normalize(&raw(q)).unwrap_err();
            assert!(matches!(err, Error::InvalidRequest(_)), "query {q:?}");
        }
    }

    #[test]
    fn keyword_list_drops_blank_entries() {
        let mut opts = raw("q");
        opts.keywords = Some("ruby, , rails".to_string());
        let req = normalize(&opts).unwrap();
        assert_eq!(
            req.keywords,
            Some(vec!["ruby".to_string(), "rails".to_string()])
        );
    }

    #[test]
    fn split_preserves_order_and_duplicates() {
        assert_eq!(
            split_list(" b ,a,b,, a "),
            Some(vec![
                "b".to_string(),
                "a".to_string(),
                "b".to_string(),
                "a".to_string()
            ])
        );
    }

    #[test]
    fn all_blank_list_is_absent() {
        assert_eq!(split_list(" , ,, "), None);
        assert_eq!(split_list(""), None);

        let mut opts = raw("q");
        opts.tags = Some(" , ".to_string());
        assert_eq!(normalize(&opts).unwrap().tags, None);
    }

    #[test]
    fn unknown_search_type_is_rejected() {
        for ty in ["vector", "Semantic", "HYBRID", "", "full-text"] {
            let mut opts = raw("q");
            opts.search_type = Some(ty.to_string());
            let err = normalize(&opts).unwrap_err();
            assert!(matches!(err, Error::InvalidRequest(_)), "type {ty:?}");
        }
    }

    #[test]
    fn known_search_types_parse() {
        for ty in SearchType::ALL {
            let mut opts = raw("q");
            opts.search_type = Some(ty.to_string());
            if ty == SearchType::Keyword {
                opts.keywords = Some("k".to_string());
            }
            assert_eq!(normalize(&opts).unwrap().search_type, ty);
        }
    }

    #[test]
    fn numeric_flags_are_parsed() {
        let mut opts = raw("q");
        opts.limit = Some("25".to_string());
        opts.threshold = Some("0.55".to_string());
        opts.semantic_weight = Some("0.6".to_string());
        opts.text_weight = Some("0.4".to_string());
        let req = normalize(&opts).unwrap();
        assert_eq!(req.limit, 25);
        assert_eq!(req.threshold, Some(0.55));
        assert_eq!(req.semantic_weight, Some(0.6));
        assert_eq!(req.text_weight, Some(0.4));
    }

    #[test]
    fn unparseable_numbers_are_rejected() {
        let mut opts = raw("q");
        opts.threshold = Some("high".to_string());
        assert!(matches!(
            normalize(&opts).unwrap_err(),
            Error::InvalidRequest(_)
        ));

        let mut opts = raw("q");
        opts.limit = Some("-3".to_string());
        assert!(matches!(
            normalize(&opts).unwrap_err(),
            Error::InvalidRequest(_)
        ));

        let mut opts = raw("q");
        opts.limit = Some("0".to_string());
        assert!(matches!(
            normalize(&opts).unwrap_err(),
            Error::InvalidRequest(_)
        ));
    }

    #[test]
    fn out_of_range_threshold_is_kept_but_flagged() {
        let mut opts = raw("q");
        opts.threshold = Some("1.5".to_string());
        let req = normalize(&opts).unwrap();
        assert_eq!(req.threshold, Some(1.5));
        assert!(req.threshold_out_of_range());

        opts.threshold = Some("0.5".to_string());
        assert!(!normalize(&opts).unwrap().threshold_out_of_range());
    }

    #[test]
    fn weights_pass_through_without_sum_check() {
        let mut opts = raw("q");
        opts.search_type = Some("hybrid".to_string());
        opts.semantic_weight = Some("0.9".to_string());
        opts.text_weight = Some("0.9".to_string());
        let req = normalize(&opts).unwrap();
        assert_eq!(req.semantic_weight, Some(0.9));
        assert_eq!(req.text_weight, Some(0.9));
    }

    #[test]
    fn bare_keywords_infer_keyword_search() {
        let opts = RawSearchOptions {
            keywords: Some("ruby,rails".to_string()),
            keywords_all: true,
            ..Default::default()
        };
        let req = normalize(&opts).unwrap();
        assert_eq!(req.search_type, SearchType::Keyword);
        assert_eq!(req.query, "ruby rails");
        assert!(req.keywords_all);
    }

    #[test]
    fn explicit_keyword_type_requires_keywords() {
        let mut opts = raw("ruby");
        opts.search_type = Some("keyword".to_string());
        assert!(matches!(
            normalize(&opts).unwrap_err(),
            Error::InvalidRequest(_)
        ));
    }

    #[test]
    fn tracking_metadata_passes_through() {
        let mut opts = raw("q");
        opts.session_id = Some("sess123".to_string());
        opts.user_id = Some("user456".to_string());
        opts.track_search = Some(false);
        let req = normalize(&opts).unwrap();
        assert_eq!(req.session_id.as_deref(), Some("sess123"));
        assert_eq!(req.user_id.as_deref(), Some("user456"));
        assert!(!req.track_search);
    }
}
