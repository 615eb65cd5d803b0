// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{anyhow, Context, Result};
use remotefs_client::{ClientConfig, Endpoint};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;

const DEFAULT_TTL_MS: u64 = 1000;

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL_MS
}

/// Mount-time settings for the FUSE host.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountConfig {
    pub client: ClientConfig,
    #[serde(default = "default_ttl_ms")]
    pub attr_ttl_ms: u64,
    #[serde(default = "default_ttl_ms")]
    pub entry_ttl_ms: u64,
}

impl MountConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            client: ClientConfig::new(endpoint),
            attr_ttl_ms: DEFAULT_TTL_MS,
            entry_ttl_ms: DEFAULT_TTL_MS,
        }
    }

    pub fn attr_ttl(&self) -> Duration {
        Duration::from_millis(self.attr_ttl_ms)
    }

    pub fn entry_ttl(&self) -> Duration {
        Duration::from_millis(self.entry_ttl_ms)
    }
}

/// Read an optional JSON config file; the endpoint given on the command line
/// always replaces `client.endpoint`, which may be omitted from the file.
pub fn load_config(endpoint: Endpoint, config_path: Option<&Path>) -> Result<MountConfig> {
    let Some(path) = config_path else {
        return Ok(MountConfig::new(endpoint));
    };

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let mut value: Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;

    let root = value
        .as_object_mut()
        .ok_or_else(|| anyhow!("config {} must be a JSON object", path.display()))?;
    let client = root
        .entry("client")
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| anyhow!("config {}: `client` must be an object", path.display()))?;
    client.insert("endpoint".to_string(), Value::String(endpoint.to_string()));

    serde_json::from_value(value)
        .with_context(|| format!("invalid mount configuration in {}", path.display()))
}
