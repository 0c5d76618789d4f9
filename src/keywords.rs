//! Keyword-mode resolution shared by search, list and the keyword commands.

use crate::request::SearchRequest;

/// How a keyword list is combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeywordMethod {
    /// Match documents carrying any keyword (OR). Default.
    Any,
    /// Match documents carrying every keyword (AND).
    All,
}

impl KeywordMethod {
    pub fn from_all_flag(all: bool) -> Self {
        if all { Self::All } else { Self::Any }
    }

    /// Name of the backend operation this mode maps to.
    pub fn operation(self) -> &'static str {
        match self {
            Self::Any => "search_by_keywords",
            Self::All => "search_by_keywords_all",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Any => "ANY keywords (OR)",
            Self::All => "ALL keywords (AND)",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMode {
    pub method: KeywordMethod,
    pub keywords: Vec<String>,
}

/// Resolve the keyword mode of a request, if it carries keywords.
pub fn resolve_keyword_mode(request: &SearchRequest) -> Option<KeywordMode> {
    request.keywords.as_ref().map(|keywords| KeywordMode {
        method: KeywordMethod::from_all_flag(request.keywords_all),
        keywords: keywords.clone(),
    })
}

/// Case-insensitive keyword filter over a document's keyword set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordFilter {
    method: KeywordMethod,
    wanted: Vec<String>,
}

impl KeywordFilter {
    pub fn new(method: KeywordMethod, keywords: &[String]) -> Self {
        Self {
            method,
            wanted: keywords.iter().map(|k| normalize_keyword(k)).collect(),
        }
    }

    pub fn from_mode(mode: &KeywordMode) -> Self {
        Self::new(mode.method, &mode.keywords)
    }

    /// Number of wanted keywords present in `document_keywords`.
    pub fn match_count(&self, document_keywords: &[String]) -> usize {
        self.wanted
            .iter()
            .filter(|w| {
                document_keywords.iter().any(|k| normalize_keyword(k) == **w)
            })
            .count()
    }

    pub fn matches(&self, document_keywords: &[String]) -> bool {
        let hits = self.match_count(document_keywords);
        match self.method {
            KeywordMethod::Any => hits > 0,
            KeywordMethod::All => hits == self.wanted.len(),
        }
    }

    /// Fraction of wanted keywords present, in [0, 1].
    pub fn score(&self, document_keywords: &[String]) -> f64 {
        if self.wanted.is_empty() {
            return 0.0;
        }
        self.match_count(document_keywords) as f64 / self.wanted.len() as f64
    }
}

/// Canonical stored form of a keyword.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

/// Normalize a keyword list, dropping blanks and repeats while keeping order.
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(keywords.len());
    for k in keywords {
        let k = normalize_keyword(k);
        if !k.is_empty() && !out.contains(&k) {
            out.push(k);
        }
    }
    out
}
