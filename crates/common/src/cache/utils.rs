//! Key pattern matching for bulk invalidation
//!
//! Patterns are shell-style globs: `*` matches any run of characters
//! (including none) and `?` matches exactly one. Everything else is literal.

use regex::Regex;

/// Compiled glob pattern used by [`Cache::invalidate_pattern`].
///
/// [`Cache::invalidate_pattern`]: super::Cache::invalidate_pattern
#[derive(Debug, Clone)]
pub struct KeyPattern {
    source: String,
    regex: Option<Regex>,
}

impl KeyPattern {
    /// Compile a glob pattern
    ///
    /// # Example
    /// ```
    /// use repolink_common::cache::utils::KeyPattern;
    ///
    /// let pattern = KeyPattern::new("user:*");
    /// assert!(pattern.matches("user:42"));
    /// assert!(!pattern.matches("team:user:42"));
    /// ```
    pub fn new(pattern: &str) -> Self {
        let mut expr = String::with_capacity(pattern.len() + 8);
        expr.push('^');
        for ch in pattern.chars() {
            match ch {
                '*' => expr.push_str(".*"),
                '?' => expr.push('.'),
                other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
            }
        }
        expr.push('$');

        // Metacharacters are escaped above, so compilation only fails on size
        // limits. Such patterns degrade to exact comparison.
        Self { source: pattern.to_string(), regex: Regex::new(&expr).ok() }
    }

    /// Whether `key` matches the whole pattern
    pub fn matches(&self, key: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(key),
            None => key == self.source,
        }
    }

    /// The original glob text
    pub fn as_str(&self) -> &str {
        &self.source
    }
}
