//! Reading a uniform result list out of strategy-specific responses.
//!
//! Every field is resolved through an ordered alias table: the first alias
//! present with a usable value wins. Nothing here fails; unresolvable fields
//! come back as `None`.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::request::SearchType;

const ID_KEYS: &[&str] = &["document_id", "id"];
const TITLE_KEYS: &[&str] = &["title", "document_title"];
const CONTENT_KEYS: &[&str] = &["content", "text"];

/// Generic score key tried after the strategy-specific ones.
const GENERIC_SCORE_KEYS: &[&str] = &["score"];

/// One projected result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub id: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub score: Option<f64>,
}

/// Strategy-specific score keys, in precedence order.
pub fn score_keys(search_type: SearchType) -> &'static [&'static str] {
    match search_type {
        SearchType::Semantic => &["similarity"],
        SearchType::Hybrid => &["combined_score", "weighted_score"],
        SearchType::Fulltext => &["fulltext_similarity"],
        SearchType::Keyword => &["keyword_score"],
    }
}

/// The raw result entries of a response.
///
/// Object responses carry them under `results`; keyword operations answer
/// with a bare array.
pub fn raw_results(response: &Value) -> &[Value] {
    match response {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    }
}

/// Project every entry of `response` into a [`SearchResult`].
pub fn project(response: &Value, search_type: SearchType) -> Vec<SearchResult> {
    raw_results(response)
        .iter()
        .map(|entry| project_entry(entry, search_type))
        .collect()
}

fn project_entry(entry: &Value, search_type: SearchType) -> SearchResult {
    let Some(map) = entry.as_object() else {
        return SearchResult {
            id: None,
            title: None,
            content: None,
            score: None,
        };
    };

    SearchResult {
        id: first_string(map, ID_KEYS),
        title: first_string(map, TITLE_KEYS),
        content: first_string(map, CONTENT_KEYS),
        score: first_number(map, score_keys(search_type))
            .or_else(|| first_number(map, GENERIC_SCORE_KEYS)),
    }
}

fn first_string(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn first_number(map: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match map.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
