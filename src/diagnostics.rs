//! Guidance for searches that came back empty.
//!
//! When the backend reports similarity statistics, the report is derived
//! from them: a relaxed threshold suggestion, a keyword-search fallback for
//! very low similarity, or a flag when the numbers contradict the empty
//! result list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fraction of the best observed similarity used as the suggested threshold.
pub const SUGGESTION_FACTOR: f64 = 0.9;

/// Below this best similarity, keyword search is recommended instead.
pub const LOW_SIMILARITY: f64 = 0.3;

/// Similarity statistics as reported by the backend. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchStatistics {
    pub threshold_used: Option<f64>,
    pub highest_similarity: Option<f64>,
    pub lowest_similarity: Option<f64>,
    pub average_similarity: Option<f64>,
    pub similarities_above_threshold: Option<u64>,
    pub total_embeddings_checked: Option<u64>,
}

impl SearchStatistics {
    /// Read statistics from a response, tolerating missing and mistyped
    /// fields. Returns `None` when the response has no statistics object.
    pub fn from_response(response: &Value) -> Option<Self> {
        let stats = response.get("statistics")?.as_object()?;
        let float = |key: &str| stats.get(key).and_then(Value::as_f64);
        let count = |key: &str| {
            stats.get(key).and_then(|v| {
                v.as_u64()
                    .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            })
        };

        Some(Self {
            threshold_used: float("threshold_used"),
            highest_similarity: float("highest_similarity"),
            lowest_similarity: float("lowest_similarity"),
            average_similarity: float("average_similarity"),
            similarities_above_threshold: count("similarities_above_threshold"),
            total_embeddings_checked: count("total_embeddings_checked"),
        })
    }
}

/// Which situation the report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCondition {
    /// The backend reported no statistics.
    NoStatistics,
    /// The best match fell below the threshold.
    ThresholdTooHigh,
    /// Matches above the threshold were reported yet none came back.
    ProcessingInconsistency,
    /// Nothing was indexed to compare against.
    NoEmbeddings,
    /// Statistics present but nothing actionable in them.
    NoSimilarContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticReport {
    pub condition: DiagnosticCondition,
    pub suggested_threshold: Option<f64>,
    /// Most actionable line first.
    pub guidance: Vec<String>,
    pub statistics: Option<SearchStatistics>,
}

/// Round to three decimal places.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Build the report for an empty result set.
pub fn diagnose(response: &Value) -> DiagnosticReport {
    let Some(stats) = SearchStatistics::from_response(response) else {
        return DiagnosticReport {
            condition: DiagnosticCondition::NoStatistics,
            suggested_threshold: None,
            guidance: vec![
                "Try lowering the similarity threshold (--threshold)."
                    .to_string(),
            ],
            statistics: None,
        };
    };

    if let (Some(highest), Some(threshold)) =
        (stats.highest_similarity, stats.threshold_used)
        && highest < threshold
    {
        let suggested = round3(highest * SUGGESTION_FACTOR);
        let mut guidance = vec![
            format!(
                "Best match scored {highest:.3}, below the threshold of {threshold:.3}. \
                 Try --threshold {suggested}."
            ),
        ];
        if highest < LOW_SIMILARITY {
            guidance.push(
                "Similarity is very low for every document; try a keyword \
                 search instead (--search-type keyword --keywords ... or \
                 `ragdoll keywords search`)."
                    .to_string(),
            );
        }
        return DiagnosticReport {
            condition: DiagnosticCondition::ThresholdTooHigh,
            suggested_threshold: Some(suggested),
            guidance,
            statistics: Some(stats),
        };
    }

    if let Some(above) = stats.similarities_above_threshold
        && above > 0
    {
        return DiagnosticReport {
            condition: DiagnosticCondition::ProcessingInconsistency,
            suggested_threshold: None,
            guidance: vec![format!(
                "Result-processing inconsistency: the backend reported {above} \
                 similarities above the threshold but returned no results."
            )],
            statistics: Some(stats),
        };
    }

    if stats.total_embeddings_checked == Some(0) {
        return DiagnosticReport {
            condition: DiagnosticCondition::NoEmbeddings,
            suggested_threshold: None,
            guidance: vec![
                "No embeddings were checked. Add documents with `ragdoll add` \
                 and confirm processing with `ragdoll status <id>`."
                    .to_string(),
            ],
            statistics: Some(stats),
        };
    }

    DiagnosticReport {
        condition: DiagnosticCondition::NoSimilarContent,
        suggested_threshold: None,
        guidance: vec![
            "No similar content found. Try different search terms.".to_string(),
            "Try lowering the similarity threshold (--threshold).".to_string(),
        ],
        statistics: Some(stats),
    }
}
