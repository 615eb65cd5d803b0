// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Client configuration loaded from JSON with environment overrides.

use crate::endpoint::Endpoint;
use anyhow::{anyhow, Context, Result};
use remotefs_proto::WireFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Selects the wire format regardless of the config file.
pub const WIRE_FORMAT_ENV: &str = "REMOTEFS_WIRE_FORMAT";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub endpoint: Endpoint,
    #[serde(default)]
    pub wire_format: WireFormat,
    /// Absent means connect blocks for as long as the OS allows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connect_timeout_ms: Option<u64>,
    /// Absent means reads and writes block indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub io_timeout_ms: Option<u64>,
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            wire_format: WireFormat::default(),
            connect_timeout_ms: None,
            io_timeout_ms: None,
        }
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    pub fn io_timeout(&self) -> Option<Duration> {
        self.io_timeout_ms.filter(|ms| *ms > 0).map(Duration::from_millis)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("invalid client configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Apply `REMOTEFS_WIRE_FORMAT` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`; empty values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(WIRE_FORMAT_ENV).filter(|v| !v.trim().is_empty()) {
            self.wire_format = value
                .trim()
                .parse()
                .map_err(|err: String| anyhow!("{}: {}", WIRE_FORMAT_ENV, err))?;
        }
        Ok(())
    }
}
