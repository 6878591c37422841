//! Locates the test-case section inside a larger document.

use crate::errors::CompileError;

/// Heading that opens the test-case section.
pub const DEFAULT_START_MARKER: &str = "### TEST CASES:";
/// Horizontal rule that closes it.
pub const DEFAULT_BOUNDARY_MARKER: &str = "---";

/// Pure text extractor bounded by two markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecExtractor {
    start_marker: String,
    boundary_marker: String,
}

impl Default for SpecExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_START_MARKER, DEFAULT_BOUNDARY_MARKER)
    }
}

impl SpecExtractor {
    pub fn new(start_marker: impl Into<String>, boundary_marker: impl Into<String>) -> Self {
        Self {
            start_marker: start_marker.into(),
            boundary_marker: boundary_marker.into(),
        }
    }

    /// Return the trimmed text strictly between the first start marker and
    /// the first boundary marker that follows it.
    pub fn extract<'a>(&self, document: &'a str) -> Result<&'a str, CompileError> {
        let start = document.find(&self.start_marker).ok_or_else(|| {
            CompileError::extraction(format!("start marker '{}' is absent", self.start_marker))
        })?;
        let body_start = start + self.start_marker.len();
        let body_len = document[body_start..]
            .find(&self.boundary_marker)
            .ok_or_else(|| {
                CompileError::extraction(format!(
                    "boundary marker '{}' is absent after '{}'",
                    self.boundary_marker, self.start_marker
                ))
            })?;
        Ok(document[body_start..body_start + body_len].trim())
    }
}
