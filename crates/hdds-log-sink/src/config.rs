// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! YAML configuration for the log sink.

use crate::fields::FieldMapping;
use crate::record::{CHANNEL, CONTEXT, DATETIME, EXTRA, LEVEL, LEVEL_NAME, MESSAGE};
use crate::sink::DEFAULT_MIN_LEVEL;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Destination table.
    pub table: TableConfig,

    /// Minimum record level handled.
    #[serde(default = "default_min_level")]
    pub min_level: i64,

    /// Let handled records propagate to the next handler.
    #[serde(default = "default_true")]
    pub bubble: bool,

    /// Source field name to destination column.
    #[serde(default)]
    pub field_mapping: HashMap<String, String>,

    /// Static fields added to every row.
    #[serde(default)]
    pub custom_fields: BTreeMap<String, serde_json::Value>,
}

/// Destination table coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TableConfig {
    /// Dataset (schema) holding the table.
    pub dataset: String,
    /// Table name.
    pub table: String,
}

fn default_min_level() -> i64 {
    DEFAULT_MIN_LEVEL
}

fn default_true() -> bool {
    true
}

impl SinkConfig {
    /// Parse and validate configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: SinkConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.table.dataset.trim().is_empty() {
            return Err(ConfigError::Invalid("table.dataset is empty".into()));
        }
        if self.table.table.trim().is_empty() {
            return Err(ConfigError::Invalid("table.table is empty".into()));
        }

        let mut seen: HashMap<&str, &str> = HashMap::new();
        for (source, destination) in &self.field_mapping {
            if destination.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "field '{}' is mapped to an empty column name",
                    source
                )));
            }
            if let Some(other) = seen.insert(destination.as_str(), source.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "fields '{}' and '{}' both map to column '{}'",
                    other, source, destination
                )));
            }
        }

        // An unmapped record field keeps its own name as column.
        for field in [CHANNEL, MESSAGE, LEVEL, LEVEL_NAME, CONTEXT, EXTRA, DATETIME] {
            if self.field_mapping.contains_key(field) {
                continue;
            }
            if let Some(source) = seen.get(field) {
                return Err(ConfigError::Invalid(format!(
                    "field '{}' maps to column '{}', which record field '{}' already uses",
                    source, field, field
                )));
            }
        }

        Ok(())
    }

    /// Column mapping as used by the row builder.
    pub fn field_mapping(&self) -> FieldMapping {
        self.field_mapping
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}
