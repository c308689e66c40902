// src/compare/mod.rs
//! Baseline/candidate comparison
//!
//! - **diff**: structural diff over JSON document trees
//! - **ignore**: per-kind path globs suppressing expected differences
//! - **http**: HTTP response layering (status, headers, gzip, raw fallback)
//! - **engine**: `CompareEngine`, the entry point used by replays
//!
//! Paths are JSON pointers rooted at the compared document, so a changed
//! response body field shows up as `/body/field`.

pub mod diff;
pub mod engine;
pub mod http;
pub mod ignore;

pub use engine::CompareEngine;
pub use ignore::IgnoreRuleSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Kind of difference between baseline and candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffKind {
    #[serde(alias = "add")]
    Add,
    #[serde(alias = "remove")]
    Remove,
    #[serde(alias = "modify")]
    Modify,
    #[serde(alias = "move")]
    Move,
}

impl DiffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiffKind::Add => "ADD",
            DiffKind::Remove => "REMOVE",
            DiffKind::Modify => "MODIFY",
            DiffKind::Move => "MOVE",
        }
    }
}

impl fmt::Display for DiffKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One difference, located by JSON pointer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffDetail {
    pub kind: DiffKind,
    pub path: String,

    /// Source pointer of a MOVE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

impl DiffDetail {
    pub fn add(path: impl Into<String>, after: &Value) -> Self {
        Self {
            kind: DiffKind::Add,
            path: path.into(),
            from: None,
            before: None,
            after: Some(render(after)),
        }
    }

    pub fn remove(path: impl Into<String>, before: &Value) -> Self {
        Self {
            kind: DiffKind::Remove,
            path: path.into(),
            from: None,
            before: Some(render(before)),
            after: None,
        }
    }

    pub fn modify(path: impl Into<String>, before: &Value, after: &Value) -> Self {
        Self::modify_rendered(path, render(before), render(after))
    }

    /// MODIFY with values already rendered, e.g. raw bodies
    pub fn modify_rendered(
        path: impl Into<String>,
        before: impl Into<String>,
        after: impl Into<String>,
    ) -> Self {
        Self {
            kind: DiffKind::Modify,
            path: path.into(),
            from: None,
            before: Some(before.into()),
            after: Some(after.into()),
        }
    }

    pub fn moved(from: impl Into<String>, path: impl Into<String>, value: &Value) -> Self {
        let rendered = render(value);
        Self {
            kind: DiffKind::Move,
            path: path.into(),
            from: Some(from.into()),
            before: Some(rendered.clone()),
            after: Some(rendered),
        }
    }
}

impl fmt::Display for DiffDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, display_path(&self.path))?;
        if let Some(from) = &self.from {
            write!(f, " (from {})", display_path(from))?;
        }
        match (&self.before, &self.after) {
            (Some(before), Some(after)) if self.kind == DiffKind::Modify => {
                write!(f, ": {} -> {}", before, after)
            }
            (Some(before), None) => write!(f, ": {}", before),
            (None, Some(after)) => write!(f, ": {}", after),
            _ => Ok(()),
        }
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Compact JSON rendering; strings are rendered without quotes
pub(crate) fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
