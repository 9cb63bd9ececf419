// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Log records as handed over by the logging pipeline.

use crate::value::FieldValue;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use std::collections::btree_map;
use std::collections::BTreeMap;
use thiserror::Error;

pub const CHANNEL: &str = "channel";
pub const MESSAGE: &str = "message";
pub const LEVEL: &str = "level";
pub const LEVEL_NAME: &str = "level_name";
pub const CONTEXT: &str = "context";
pub const EXTRA: &str = "extra";
pub const DATETIME: &str = "datetime";
/// Pre-rendered text line; never persisted.
pub const FORMATTED: &str = "formatted";

/// Alternate `datetime` pattern accepted when decoding JSON records.
const SPACED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%:z";

/// Errors decoding a record from JSON.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("record must be a JSON object")]
    NotAnObject,

    #[error("invalid datetime '{0}'")]
    InvalidDatetime(String),

    #[error("record has no '{0}' field")]
    MissingField(&'static str),
}

/// One structured log event: field name to value.
///
/// Fields are kept in a map so records carrying non-canonical fields
/// (processor output, application extras) are persisted unchanged.
#[derive(Debug, Clone, Default)]
pub struct LogRecord {
    fields: BTreeMap<String, FieldValue>,
}

impl LogRecord {
    /// Create a record with the canonical fields and empty `context`/`extra`.
    pub fn new(
        channel: impl Into<String>,
        message: impl Into<String>,
        level: i64,
        level_name: impl Into<String>,
        datetime: DateTime<FixedOffset>,
    ) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(CHANNEL.to_string(), FieldValue::from(channel.into()));
        fields.insert(MESSAGE.to_string(), FieldValue::from(message.into()));
        fields.insert(LEVEL.to_string(), FieldValue::from(level));
        fields.insert(LEVEL_NAME.to_string(), FieldValue::from(level_name.into()));
        fields.insert(CONTEXT.to_string(), FieldValue::empty_map());
        fields.insert(EXTRA.to_string(), FieldValue::empty_map());
        fields.insert(DATETIME.to_string(), FieldValue::Timestamp(datetime));
        Self { fields }
    }

    /// Build a record from an arbitrary field map.
    pub fn from_fields(fields: BTreeMap<String, FieldValue>) -> Self {
        Self { fields }
    }

    /// Decode a record from a JSON object.
    ///
    /// `datetime` is required and must be a string in RFC 3339 or
    /// `YYYY-MM-DD HH:MM:SS.ffffff+HH:MM` form; nested objects become
    /// structured values.
    pub fn from_json(value: Value) -> Result<Self, RecordError> {
        let Value::Object(map) = value else {
            return Err(RecordError::NotAnObject);
        };

        let mut fields = BTreeMap::new();
        for (key, value) in map {
            let field = match (key.as_str(), value) {
                (DATETIME, Value::String(s)) => FieldValue::Timestamp(parse_datetime(&s)?),
                (DATETIME, other) => return Err(RecordError::InvalidDatetime(other.to_string())),
                (_, other) => FieldValue::from_json(other),
            };
            fields.insert(key, field);
        }
        if !fields.contains_key(DATETIME) {
            return Err(RecordError::MissingField(DATETIME));
        }
        Ok(Self { fields })
    }

    /// Decode a record from JSON text.
    pub fn from_json_str(line: &str) -> Result<Self, RecordError> {
        Self::from_json(serde_json::from_str(line)?)
    }

    /// Replace `context`.
    pub fn with_context(self, context: impl Into<FieldValue>) -> Self {
        self.with_field(CONTEXT, context)
    }

    /// Replace `extra`.
    pub fn with_extra(self, extra: impl Into<FieldValue>) -> Self {
        self.with_field(EXTRA, extra)
    }

    /// Attach the pipeline's pre-rendered line.
    pub fn with_formatted(self, line: impl Into<String>) -> Self {
        self.with_field(FORMATTED, line.into())
    }

    /// Set an arbitrary field, overwriting any previous value.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Integer severity, if present.
    pub fn level(&self) -> Option<i64> {
        self.get(LEVEL).and_then(FieldValue::as_i64)
    }

    pub fn channel(&self) -> Option<&str> {
        self.get(CHANNEL).and_then(FieldValue::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<FixedOffset>, RecordError> {
    DateTime::parse_from_rfc3339(s)
        .or_else(|_| DateTime::parse_from_str(s, SPACED_DATETIME_FORMAT))
        .map_err(|_| RecordError::InvalidDatetime(s.to_string()))
}
