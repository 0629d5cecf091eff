//! Output buffer with tail-only prompt search.
//!
//! Raw bytes from the remote terminal accumulate here untouched. Prompt
//! detection only looks at the last `search_depth` bytes, stripped of
//! control sequences, so large outputs never get rescanned from the start.

use std::borrow::Cow;

use regex::bytes::Regex;

use super::patterns::strip_control;

/// Accumulated terminal output shared between the reader task and callers.
#[derive(Debug)]
pub struct PatternBuffer {
    /// Raw bytes as received.
    buffer: Vec<u8>,

    /// How many bytes from the end to search for prompts.
    search_depth: usize,
}

impl PatternBuffer {
    /// Create a new buffer that searches the last `search_depth` bytes.
    pub fn new(search_depth: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(4096),
            search_depth,
        }
    }

    /// Append a chunk exactly as received.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Find the prompt pattern in the cleaned tail of the buffer.
    ///
    /// Returns the matched prompt text.
    pub fn find_prompt(&self, pattern: &Regex) -> Option<String> {
        let cleaned = strip_control(self.tail());
        pattern
            .find(cleaned.as_bytes())
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
    }

    /// Check whether the cleaned tail matches the prompt pattern.
    pub fn contains_prompt(&self, pattern: &Regex) -> bool {
        let cleaned = strip_control(self.tail());
        pattern.is_match(cleaned.as_bytes())
    }

    fn tail(&self) -> &[u8] {
        let start = self.buffer.len().saturating_sub(self.search_depth);
        &self.buffer[start..]
    }

    /// Take ownership of the buffer contents and reset.
    pub fn take(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    /// Get the buffer contents as a string (lossy UTF-8 conversion).
    pub fn as_str_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.buffer)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn search_depth(&self) -> usize {
        self.search_depth
    }
}

impl Default for PatternBuffer {
    fn default() -> Self {
        Self::new(1000)
    }
}
