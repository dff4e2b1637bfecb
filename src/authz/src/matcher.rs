//! Path patterns and multi-method request matching
//!
//! Patterns are `/`-separated:
//! - `/api/roles` (exact)
//! - `/api/roles/*` or `/api/roles/{id}` (one segment)
//! - `/api/roles/**` (any suffix, including none)

use crate::error::{AuthzError, Result};
use http::Method;
use std::collections::HashSet;
use std::fmt;

/// Errors that can occur while parsing a path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
    /// Empty pattern string provided
    EmptyPattern,
    /// Invalid wildcard usage
    InvalidWildcard(String),
    /// Unterminated or empty `{var}` segment
    InvalidVariable(String),
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPattern => write!(f, "Pattern cannot be empty"),
            Self::InvalidWildcard(msg) => write!(f, "Invalid wildcard usage: {}", msg),
            Self::InvalidVariable(msg) => write!(f, "Invalid path variable: {}", msg),
        }
    }
}

impl std::error::Error for PatternError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    /// `*` or `{var}`
    Single,
    /// Trailing `**`
    Rest,
}

/// Parsed path pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    /// Parse a pattern; a missing leading `/` is added
    pub fn new(pattern: &str) -> std::result::Result<Self, PatternError> {
        let trimmed = pattern.trim();
        if trimmed.is_empty() {
            return Err(PatternError::EmptyPattern);
        }

        let raw = if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{}", trimmed)
        };

        let parts: Vec<&str> = split_segments(&raw).collect();
        let mut segments = Vec::with_capacity(parts.len());

        for (idx, part) in parts.iter().enumerate() {
            let segment = match *part {
                "**" if idx + 1 == parts.len() => Segment::Rest,
                "**" => {
                    return Err(PatternError::InvalidWildcard(
                        "Double wildcard '**' can only appear at the end".to_string(),
                    ))
                }
                "*" => Segment::Single,
                p if p.contains('*') => {
                    return Err(PatternError::InvalidWildcard(format!(
                        "Wildcards must be standalone: '{}'",
                        p
                    )))
                }
                p if p.starts_with('{') || p.ends_with('}') => {
                    if !(p.starts_with('{') && p.ends_with('}')) || p.len() < 3 {
                        return Err(PatternError::InvalidVariable(p.to_string()));
                    }
                    Segment::Single
                }
                p => Segment::Literal(p.to_string()),
            };
            segments.push(segment);
        }

        Ok(Self { raw, segments })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Does `path` match? The query string and empty segments are ignored.
    pub fn matches(&self, path: &str) -> bool {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let parts: Vec<&str> = split_segments(path).collect();

        let mut idx = 0;
        for segment in &self.segments {
            match segment {
                Segment::Rest => return true,
                Segment::Single => {
                    if idx >= parts.len() {
                        return false;
                    }
                }
                Segment::Literal(lit) => {
                    if parts.get(idx) != Some(&lit.as_str()) {
                        return false;
                    }
                }
            }
            idx += 1;
        }

        idx == parts.len()
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Matches a path pattern combined with a set of HTTP methods
#[derive(Debug, Clone)]
pub struct MultiMethodMatcher {
    pattern: PathPattern,
    methods: HashSet<Method>,
}

impl MultiMethodMatcher {
    /// Build a matcher; at least one method is required
    pub fn new(pattern: &str, methods: impl IntoIterator<Item = Method>) -> Result<Self> {
        let methods: HashSet<Method> = methods.into_iter().collect();
        if methods.is_empty() {
            return Err(AuthzError::InvalidInput(format!(
                "No HTTP methods given for pattern '{}'",
                pattern
            )));
        }

        Ok(Self {
            pattern: PathPattern::new(pattern)?,
            methods,
        })
    }

    /// Parse method names like `"GET"` before building
    pub fn from_method_names<S: AsRef<str>>(
        pattern: &str,
        methods: impl IntoIterator<Item = S>,
    ) -> Result<Self> {
        let methods = methods
            .into_iter()
            .map(|m| {
                let name = m.as_ref().trim().to_ascii_uppercase();
                Method::from_bytes(name.as_bytes())
                    .map_err(|_| AuthzError::InvalidInput(format!("Invalid HTTP method: {}", name)))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(pattern, methods)
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.iter()
    }

    pub fn matches(&self, path: &str, method: &Method) -> bool {
        self.methods.contains(method) && self.pattern.matches(path)
    }
}

impl fmt::Display for MultiMethodMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.methods.iter().map(Method::as_str).collect();
        methods.sort_unstable();
        write!(f, "{} {}", methods.join("|"), self.pattern)
    }
}
