// src/orchestrator/mode.rs
//! Process and per-request modes

use crate::utils::errors::EngineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Process-wide mode, fixed at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mode {
    /// Pass everything through
    #[default]
    #[serde(alias = "none")]
    None,

    /// Capture sampled traffic
    #[serde(alias = "profile")]
    Profile,

    /// Verify replayed traffic against its baseline
    #[serde(alias = "test")]
    Test,

    /// Resolve per request from markers and sampling
    #[serde(alias = "dynamic")]
    Dynamic,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::None => "NONE",
            Mode::Profile => "PROFILE",
            Mode::Test => "TEST",
            Mode::Dynamic => "DYNAMIC",
        }
    }

    /// Mode named by a request marker; DYNAMIC is not a valid marker
    pub fn from_marker(value: &str) -> Option<Mode> {
        match value.parse::<Mode>() {
            Ok(Mode::Dynamic) | Err(_) => None,
            Ok(mode) => Some(mode),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Mode::None, Mode::Profile, Mode::Test, Mode::Dynamic]
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EngineError::ConfigError(format!("Unknown mode: {}", s)))
    }
}

/// Mode a single request runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveMode {
    None,
    Profile,
    Test { replay_id: String },
}

impl EffectiveMode {
    pub fn as_mode(&self) -> Mode {
        match self {
            EffectiveMode::None => Mode::None,
            EffectiveMode::Profile => Mode::Profile,
            EffectiveMode::Test { .. } => Mode::Test,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!("dynamic".parse::<Mode>().unwrap(), Mode::Dynamic);
        assert_eq!(" Test ".parse::<Mode>().unwrap(), Mode::Test);
        assert!("record".parse::<Mode>().is_err());
    }

    #[test]
    fn test_marker_values() {
        assert_eq!(Mode::from_marker("test"), Some(Mode::Test));
        assert_eq!(Mode::from_marker("PROFILE"), Some(Mode::Profile));
        assert_eq!(Mode::from_marker("none"), Some(Mode::None));
        assert_eq!(Mode::from_marker("DYNAMIC"), None);
        assert_eq!(Mode::from_marker("bogus"), None);
    }

    #[test]
    fn test_serde_accepts_lowercase() {
        let mode: Mode = serde_json::from_str("\"profile\"").unwrap();
        assert_eq!(mode, Mode::Profile);
        assert_eq!(serde_json::to_string(&Mode::Dynamic).unwrap(), "\"DYNAMIC\"");
    }
}
