//! Include/exclude pattern sets.
//!
//! A pattern set holds glob patterns with `**` support. Matching applies
//! excludes before includes and a name matches the set when it matches some
//! include and no exclude. An empty include set never matches anything.

use crate::error::{Error, Result};
use globset::{GlobBuilder, GlobMatcher};
use tansu_core::RelPath;

#[derive(Debug)]
struct Pattern {
    text: String,
    matcher: GlobMatcher,
}

/// A set of include and exclude glob patterns.
#[derive(Debug, Default)]
pub struct PatternSet {
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl PatternSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a pattern, validating its syntax.
    ///
    /// `*` matches within a single path segment; `**` spans segments.
    pub fn add(&mut self, pattern: &str, include: bool) -> Result<()> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::Parse {
                name: pattern.to_owned(),
                message: e.to_string(),
            })?
            .compile_matcher();
        let patterns = if include {
            &mut self.includes
        } else {
            &mut self.excludes
        };
        if !patterns.iter().any(|p| p.text == pattern) {
            patterns.push(Pattern {
                text: pattern.to_owned(),
                matcher,
            });
        }
        Ok(())
    }

    /// Returns whether `name` matches the set.
    pub fn matches(&self, name: &RelPath) -> bool {
        if self
            .excludes
            .iter()
            .any(|p| p.matcher.is_match(name.as_path()))
        {
            return false;
        }
        self.includes
            .iter()
            .any(|p| p.matcher.is_match(name.as_path()))
    }

    /// The include patterns, in insertion order.
    pub fn include_patterns(&self) -> impl Iterator<Item = &str> {
        self.includes.iter().map(|p| p.text.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty() && self.excludes.is_empty()
    }
}
