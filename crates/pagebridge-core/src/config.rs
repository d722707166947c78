// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// What to do when a name is exposed twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DuplicatePolicy {
    /// Replace the previous handler (hot swap).
    Overwrite,
    /// Refuse with `BridgeError::DuplicateFunction`.
    Reject,
}

/// Persistent bridge settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Global name of the in-page runtime (`window.<namespace>`).
    pub namespace: String,
    /// Policy for exposing a name that is already registered.
    pub duplicate_expose: DuplicatePolicy,
    /// Inbound messages above this size are dropped unread.
    pub max_message_bytes: usize,
    /// Log every decoded envelope at debug level.
    pub log_messages: bool,
    /// Freeze the in-page runtime object so page code cannot replace it.
    pub freeze_runtime: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            namespace: "pagebridge".into(),
            duplicate_expose: DuplicatePolicy::Overwrite,
            max_message_bytes: 16 * 1024 * 1024,
            log_messages: false,
            freeze_runtime: true,
        }
    }
}

impl BridgeConfig {
    /// Read a config file written by [`BridgeConfig::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&data)?;
        debug!(path = %path.as_ref().display(), "bridge config loaded");
        Ok(config)
    }

    /// Like [`BridgeConfig::load`], but falls back to defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "unreadable bridge config, using defaults");
                Self::default()
            }
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }

    /// The namespace is spliced into scripts, so it must be a plain identifier.
    pub fn namespace_is_valid(&self) -> bool {
        let mut chars = self.namespace.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = BridgeConfig {
            namespace: "native".into(),
            duplicate_expose: DuplicatePolicy::Reject,
            log_messages: true,
            ..BridgeConfig::default()
        };
        config.save(&path).unwrap();

        assert_eq!(BridgeConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "namespace": "app" }"#).unwrap();

        let config = BridgeConfig::load(&path).unwrap();
        assert_eq!(config.namespace, "app");
        assert_eq!(config.duplicate_expose, DuplicatePolicy::Overwrite);
        assert!(config.freeze_runtime);
    }

    #[test]
    fn garbage_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(BridgeConfig::load_or_default(&path), BridgeConfig::default());
        assert_eq!(
            BridgeConfig::load_or_default(dir.path().join("absent.json")),
            BridgeConfig::default()
        );
    }

    #[test]
    fn namespace_validation() {
        let mut config = BridgeConfig::default();
        assert!(config.namespace_is_valid());
        config.namespace = "$bridge_2".into();
        assert!(config.namespace_is_valid());
        config.namespace = "2bridge".into();
        assert!(!config.namespace_is_valid());
        config.namespace = "a.b".into();
        assert!(!config.namespace_is_valid());
        config.namespace = String::new();
        assert!(!config.namespace_is_valid());
    }
}
