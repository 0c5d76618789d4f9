use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

/// Number of hex characters in the public document id.
pub const ID_LEN: usize = 12;

/// Shortest prefix accepted when looking a document up by partial id.
pub const MIN_PREFIX_LEN: usize = 4;

/// A stable document identifier derived from the document's source location.
///
/// Adding the same file twice yields the same id, so a re-add replaces the
/// stored document instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentId {
    pub numeric: u64,
    /// Hex string used as the store key and shown to users.
    pub hex: String,
}

impl DocumentId {
    pub fn for_location(location: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        location.hash(&mut hasher);
        let numeric = hasher.finish();
        let hex = format!("{numeric:016x}")[..ID_LEN].to_string();
        Self { numeric, hex }
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hex)
    }
}

/// Normalize a user-typed id reference (`#abc123`, ` ABC123 `) for lookup.
pub fn normalize_reference(reference: &str) -> String {
    reference
        .trim()
        .trim_start_matches('#')
        .to_ascii_lowercase()
}
