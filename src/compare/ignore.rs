// src/compare/ignore.rs
//! Suppression of expected differences
//!
//! Rules are path globs grouped by diff kind. `*` matches within one pointer
//! segment and `**` spans segments, so `/headers/*` covers every header and
//! `/body/**` covers the whole body.

use super::{DiffDetail, DiffKind};
use crate::utils::errors::{EngineError, Result};
use glob::{MatchOptions, Pattern};
use std::collections::BTreeMap;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Ordered path globs per diff kind
#[derive(Debug, Clone, Default)]
pub struct IgnoreRuleSet {
    rules: BTreeMap<DiffKind, Vec<Pattern>>,
}

impl IgnoreRuleSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile rules from configuration; a malformed glob is a configuration error
    pub fn from_settings(settings: &BTreeMap<DiffKind, Vec<String>>) -> Result<Self> {
        let mut set = Self::new();
        for (kind, globs) in settings {
            for glob in globs {
                set = set.with_rule(*kind, glob)?;
            }
        }
        Ok(set)
    }

    pub fn with_rule(mut self, kind: DiffKind, glob: &str) -> Result<Self> {
        let pattern = Pattern::new(glob).map_err(|e| {
            EngineError::ConfigError(format!("Invalid ignore glob '{}' for {}: {}", glob, kind, e))
        })?;
        self.rules.entry(kind).or_default().push(pattern);
        Ok(self)
    }

    pub fn is_ignored(&self, diff: &DiffDetail) -> bool {
        self.rules.get(&diff.kind).map_or(false, |patterns| {
            patterns
                .iter()
                .any(|p| p.matches_with(&diff.path, MATCH_OPTIONS))
        })
    }

    /// Drop every ignored diff, keeping order
    pub fn apply(&self, diffs: Vec<DiffDetail>) -> Vec<DiffDetail> {
        if self.rules.is_empty() {
            return diffs;
        }
        diffs.into_iter().filter(|d| !self.is_ignored(d)).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.values().map(Vec::len).sum()
    }
}
