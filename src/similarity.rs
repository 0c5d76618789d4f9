//! Term-vector similarity used by the local backend.
//!
//! Text is reduced to a bag of lowercased, stopword-free terms weighted by
//! frequency. Two texts are compared by the cosine of their vectors, which
//! lands in [0, 1] since every weight is non-negative.

use std::collections::HashMap;

use crate::diagnostics::SearchStatistics;

/// Terms shorter than this are dropped.
const MIN_TERM_LEN: usize = 2;

const STOPWORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as",
    "at", "be", "been", "but", "by", "can", "could", "do", "does", "for",
    "from", "had", "has", "have", "he", "her", "his", "how", "if", "in",
    "into", "is", "it", "its", "just", "may", "more", "most", "no", "not",
    "of", "on", "one", "only", "or", "other", "our", "out", "over", "she",
    "so", "some", "such", "than", "that", "the", "their", "them", "then",
    "there", "these", "they", "this", "those", "to", "up", "use", "used",
    "using", "was", "we", "were", "what", "when", "where", "which", "while",
    "who", "will", "with", "would", "you", "your",
];

fn is_stopword(term: &str) -> bool {
    STOPWORDS.binary_search(&term).is_ok()
}

/// Split text into lowercased terms, dropping stopwords and short tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= MIN_TERM_LEN)
        .map(str::to_lowercase)
        .filter(|t| !is_stopword(t))
        .collect()
}

/// Frequency-weighted bag of terms.
#[derive(Debug, Clone, Default)]
pub struct TermVector {
    weights: HashMap<String, f64>,
    norm: f64,
}

impl TermVector {
    pub fn from_text(text: &str) -> Self {
        let mut weights: HashMap<String, f64> = HashMap::new();
        for term in tokenize(text) {
            *weights.entry(term).or_default() += 1.0;
        }
        let norm = weights.values().map(|w| w * w).sum::<f64>().sqrt();
        Self { weights, norm }
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Cosine similarity in [0, 1]. Empty vectors score 0.
    pub fn cosine(&self, other: &TermVector) -> f64 {
        if self.norm == 0.0 || other.norm == 0.0 {
            return 0.0;
        }
        let (small, large) = if self.weights.len() <= other.weights.len() {
            (self, other)
        } else {
            (other, self)
        };
        let dot: f64 = small
            .weights
            .iter()
            .filter_map(|(t, w)| large.weights.get(t).map(|o| w * o))
            .sum();
        // An empty sum is -0.0.
        if dot <= 0.0 {
            return 0.0;
        }
        (dot / (self.norm * other.norm)).clamp(0.0, 1.0)
    }
}

/// The `limit` most frequent terms of `text`, ties broken alphabetically.
pub fn extract_keywords(text: &str, limit: usize) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for term in tokenize(text) {
        // Bare numbers make poor keywords.
        if term.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        *counts.entry(term).or_default() += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(t, _)| t).collect()
}

/// Whether `similarity` counts as a match at `threshold`. Zero never does.
pub fn is_match(similarity: f64, threshold: f64) -> bool {
    similarity > 0.0 && similarity >= threshold
}

/// Running statistics over every similarity computed for one search.
#[derive(Debug, Clone)]
pub struct SimilarityTally {
    threshold: f64,
    checked: u64,
    above: u64,
    highest: f64,
    lowest: f64,
    sum: f64,
}

impl SimilarityTally {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            checked: 0,
            above: 0,
            highest: 0.0,
            lowest: f64::INFINITY,
            sum: 0.0,
        }
    }

    pub fn record(&mut self, similarity: f64) {
        self.checked += 1;
        self.sum += similarity;
        self.highest = self.highest.max(similarity);
        self.lowest = self.lowest.min(similarity);
        if is_match(similarity, self.threshold) {
            self.above += 1;
        }
    }

    /// Unrounded statistics, so comparisons against the threshold stay
    /// exact.
    pub fn finish(&self) -> SearchStatistics {
        let seen = self.checked > 0;
        SearchStatistics {
            threshold_used: Some(self.threshold),
            highest_similarity: seen.then_some(self.highest),
            lowest_similarity: seen.then_some(self.lowest),
            average_similarity: seen.then(|| self.sum / self.checked as f64),
            similarities_above_threshold: Some(self.above),
            total_embeddings_checked: Some(self.checked),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopwords_are_sorted() {
        let mut sorted = STOPWORDS.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STOPWORDS);
    }

    #[test]
    fn tokenize_drops_noise() {
        assert_eq!(
            tokenize("The Rust compiler, and a borrow-checker!"),
            vec!["rust", "compiler", "borrow", "checker"]
        );
    }

    #[test]
    fn cosine_bounds() {
        let a = TermVector::from_text("rust ownership borrowing");
        let b = TermVector::from_text("rust ownership borrowing");
        let c = TermVector::from_text("python gardening");
        assert!((a.cosine(&b) - 1.0).abs() < 1e-9);
        assert_eq!(a.cosine(&c), 0.0);

        let partial = TermVector::from_text("rust gardening");
        let s = a.cosine(&partial);
        assert!(s > 0.0 && s < 1.0);
        assert_eq!(s, partial.cosine(&a));
    }

    #[test]
    fn empty_vectors_score_zero() {
        let empty = TermVector::from_text("the and of");
        assert!(empty.is_empty());
        assert_eq!(empty.cosine(&TermVector::from_text("rust")), 0.0);
    }

    #[test]
    fn keywords_ranked_by_frequency() {
        let text = "Rails routes. Rails models. Ruby gems and Ruby 3 and rails.";
        assert_eq!(extract_keywords(text, 2), vec!["rails", "ruby"]);
    }

    #[test]
    fn tally_statistics() {
        let mut tally = SimilarityTally::new(0.5);
        for s in [0.2, 0.6, 0.4] {
            tally.record(s);
        }
        let stats = tally.finish();
        assert_eq!(stats.threshold_used, Some(0.5));
        assert_eq!(stats.highest_similarity, Some(0.6));
        assert_eq!(stats.lowest_similarity, Some(0.2));
        let average = stats.average_similarity.unwrap();
        assert!((average - 0.4).abs() < 1e-9);
        assert_eq!(stats.similarities_above_threshold, Some(1));
        assert_eq!(stats.total_embeddings_checked, Some(3));
    }

    #[test]
    fn zero_never_matches() {
        assert!(!is_match(0.0, 0.0));
        assert!(is_match(0.1, 0.0));
        assert!(is_match(0.5, 0.5));
        assert!(!is_match(0.49, 0.5));
    }

    #[test]
    fn disjoint_vectors_score_positive_zero() {
        let a = TermVector::from_text("rust ownership");
        let b = TermVector::from_text("python gardening");
        assert!(a.cosine(&b).is_sign_positive());

        let mut tally = SimilarityTally::new(0.5);
        tally.record(a.cosine(&b));
        let stats = serde_json::to_value(tally.finish()).unwrap();
        assert_eq!(stats["lowest_similarity"].to_string(), "0.0");
    }

    #[test]
    fn best_match_just_below_threshold_is_not_rounded_up() {
        let best = 1.0 / 12f64.sqrt(); // 0.28868
        let mut tally = SimilarityTally::new(0.2888);
        tally.record(best);
        assert_eq!(tally.finish().highest_similarity, Some(best));

        let report = crate::diagnostics::diagnose(
            &serde_json::json!({"results": [], "statistics": tally.finish()}),
        );
        assert_eq!(
            report.condition,
            crate::diagnostics::DiagnosticCondition::ThresholdTooHigh
        );
        assert_eq!(report.suggested_threshold, Some(0.26));
    }

    #[test]
    fn empty_tally_has_no_extremes() {
        let stats = SimilarityTally::new(0.7).finish();
        assert_eq!(stats.highest_similarity, None);
        assert_eq!(stats.total_embeddings_checked, Some(0));
    }
}
