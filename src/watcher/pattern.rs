//! Line matching for watched files.

use regex::Regex;

/// Errors produced while compiling a match expression.
#[derive(thiserror::Error, Debug)]
pub enum PatternError {
    /// The pattern string was empty.
    #[error("Pattern should not be empty")]
    Empty,

    /// The pattern is not a valid regular expression.
    #[error("Invalid pattern: {0}")]
    Invalid(#[from] regex::Error),
}

/// A compiled match expression for a single target.
///
/// Holds no mutable state, so one matcher can be shared read-only by any
/// number of scans.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    regex: Regex,
}

impl PatternMatcher {
    /// Compile a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Empty`] for an empty pattern and
    /// [`PatternError::Invalid`] if the regular expression does not compile.
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// Check whether a line matches.
    ///
    /// Empty lines never match.
    #[must_use]
    pub fn is_match(&self, line: &str) -> bool {
        !line.is_empty() && self.regex.is_match(line)
    }

    /// The source pattern.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

impl std::fmt::Display for PatternMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
