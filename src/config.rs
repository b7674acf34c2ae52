//! Bindery Configuration Module
//!
//! Host settings for compiling and loading definitions, read from a TOML file.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`BINDERY_RESTRICTED`, `BINDERY_QUERY_TIMEOUT_MS`)
//! 2. Config file (`bindery.toml` or `--config <path>`)
//! 3. Defaults

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::context::HostContext;
use crate::error::{BinderyError, Result};
use crate::resources::ResourceTable;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "bindery.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BinderyConfig {
    /// Refuse custom binders and transformations
    #[serde(default)]
    pub restricted: bool,

    /// Root element every definition must use
    pub expected_root: Option<String>,

    /// Loads running longer than this are abandoned
    pub query_timeout_ms: Option<u64>,

    /// Symbolic resources known to the resolver: type → names
    #[serde(default)]
    pub resources: BTreeMap<String, Vec<String>>,
}

impl BinderyConfig {
    /// Load configuration from `path`
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| BinderyError::Config {
            reason: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BinderyError::Config {
            reason: format!("Failed to parse config file: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var("BINDERY_RESTRICTED") {
            if !value.is_empty() {
                self.restricted = parse_flag(&value).ok_or_else(|| BinderyError::Config {
                    reason: format!("BINDERY_RESTRICTED must be true or false, got '{}'", value),
                })?;
            }
        }

        if let Ok(value) = std::env::var("BINDERY_QUERY_TIMEOUT_MS") {
            if !value.is_empty() {
                let ms = value.trim().parse().map_err(|_| BinderyError::Config {
                    reason: format!("BINDERY_QUERY_TIMEOUT_MS must be a number, got '{}'", value),
                })?;
                self.query_timeout_ms = Some(ms);
            }
        }

        Ok(self)
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.query_timeout_ms.map(Duration::from_millis)
    }

    /// Resource table holding every configured resource
    pub fn resource_table(&self) -> ResourceTable {
        ResourceTable::from_groups(&self.resources)
    }

    /// Host context over the configured resources, with empty factory tables
    pub fn host_context(&self) -> HostContext {
        HostContext::new(Arc::new(self.resource_table())).restricted(self.restricted)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
