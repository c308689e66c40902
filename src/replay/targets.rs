// src/replay/targets.rs
//! Replay targets by client id
//!
//! A target names the candidate deployment a replay is sent to: its base URL
//! (or broker address), a per-call timeout and headers added to every call.

use crate::utils::config::TargetSettings;
use crate::utils::errors::{EngineError, Result};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use tracing::{debug, info};

/// Target definition
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub client_id: String,

    /// Base URL of an HTTP candidate, or the endpoint handed to a publisher
    pub base_url: String,

    pub timeout: Duration,

    /// Headers attached to every replayed call
    pub headers: BTreeMap<String, String>,
}

impl Target {
    pub fn new(client_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

impl From<&TargetSettings> for Target {
    fn from(settings: &TargetSettings) -> Self {
        Self {
            client_id: settings.client_id.clone(),
            base_url: settings.base_url.clone(),
            timeout: Duration::from_secs(settings.timeout_secs),
            headers: settings.headers.clone(),
        }
    }
}

/// Client id to target mapping
#[derive(Debug, Default)]
pub struct TargetTable {
    targets: RwLock<HashMap<String, Target>>,
}

impl TargetTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &[TargetSettings]) -> Result<Self> {
        let table = Self::new();
        for target in settings {
            table.add_target(target.into())?;
        }
        Ok(table)
    }

    /// Add or replace a target
    pub fn add_target(&self, target: Target) -> Result<()> {
        if target.client_id.trim().is_empty() || target.base_url.trim().is_empty() {
            return Err(EngineError::ConfigError(format!(
                "Replay target needs a client id and base url: {:?}",
                target
            )));
        }

        info!("Adding replay target: {} -> {}", target.client_id, target.base_url);
        self.targets.write().insert(target.client_id.clone(), target);
        Ok(())
    }

    pub fn remove_target(&self, client_id: &str) -> Result<()> {
        if self.targets.write().remove(client_id).is_some() {
            info!("Removed replay target {}", client_id);
            Ok(())
        } else {
            Err(EngineError::ConfigError(format!(
                "No replay target found for client: {}",
                client_id
            )))
        }
    }

    /// Target for a client id; unknown ids are a configuration error
    pub fn lookup(&self, client_id: &str) -> Result<Target> {
        let target = self.targets.read().get(client_id).cloned();
        match target {
            Some(target) => {
                debug!("Resolved replay target {} -> {}", client_id, target.base_url);
                Ok(target)
            }
            None => Err(EngineError::ConfigError(format!(
                "Unknown replay target: {}",
                client_id
            ))),
        }
    }

    pub fn client_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.targets.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.targets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_lookup() {
        let table = TargetTable::new();
        table
            .add_target(Target::new("staging", "http://localhost:8080").with_header("x-env", "stg"))
            .unwrap();

        let target = table.lookup("staging").unwrap();
        assert_eq!(target.base_url, "http://localhost:8080");
        assert_eq!(target.headers.get("x-env").map(String::as_str), Some("stg"));
    }

    #[test]
    fn test_unknown_client_is_config_error() {
        let table = TargetTable::new();
        assert!(matches!(
            table.lookup("prod"),
            Err(EngineError::ConfigError(_))
        ));
        assert!(table.remove_target("prod").is_err());
    }

    #[test]
    fn test_from_settings() {
        let settings = vec![TargetSettings {
            client_id: "canary".to_string(),
            base_url: "http://canary:9000".to_string(),
            timeout_secs: 5,
            headers: BTreeMap::new(),
        }];

        let table = TargetTable::from_settings(&settings).unwrap();
        assert_eq!(table.client_ids(), vec!["canary".to_string()]);
        assert_eq!(table.lookup("canary").unwrap().timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_blank_target_rejected() {
        let table = TargetTable::new();
        assert!(table.add_target(Target::new("x", " ")).is_err());
        assert!(table.is_empty());
    }
}
