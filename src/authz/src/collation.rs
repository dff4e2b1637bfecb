//! Primary-strength role name comparison
//!
//! Two names are primary-equal when they differ only in case or diacritics
//! (`"Gerente"`, `"GERENTE"` and `"Gérente"` all fold to the same key).

use serde::{Deserialize, Serialize};
use std::fmt;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Folded form of a role name used for uniqueness and lookups
///
/// Surrounding whitespace is ignored; the role service stores names trimmed
/// so the stored name and its key agree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NameKey(String);

impl NameKey {
    pub fn new(name: &str) -> Self {
        let folded: String = name
            .trim()
            .nfd()
            .filter(|c| !is_combining_mark(*c))
            .flat_map(char::to_lowercase)
            .collect();
        Self(folded)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NameKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case- and diacritic-insensitive equality
pub fn primary_eq(a: &str, b: &str) -> bool {
    NameKey::new(a) == NameKey::new(b)
}
