// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record values and their storage formatting.
//!
//! Every field of a record or custom field set is a [`FieldValue`]. Before a
//! row is handed to the store each value is reduced to a plain JSON value:
//!
//! ```text
//! Scalar     --> unchanged
//! Timestamp  --> "2024-06-01T12:00:00.000000+00:00"
//! Deferred   --> producer() (used as-is)
//! Structured --> JSON object, entries formatted recursively
//! ```

use crate::error::BoxError;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Rendering pattern for timestamps (microseconds, explicit offset).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";

type ProducerFn = dyn Fn() -> Result<Value, BoxError> + Send + Sync;

/// Zero-argument value producer, resolved when a row is built.
#[derive(Clone)]
pub struct Producer(Arc<ProducerFn>);

impl Producer {
    /// Wrap a fallible producer.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Wrap a producer that cannot fail.
    pub fn infallible<F, V>(f: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value> + 'static,
    {
        Self(Arc::new(move || Ok::<Value, BoxError>(f().into())))
    }

    /// Invoke the producer once.
    pub fn produce(&self) -> Result<Value, BoxError> {
        (self.0)()
    }
}

impl fmt::Debug for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Producer(..)")
    }
}

/// A value carried by a log record or a custom field.
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// String, number, boolean, null or array.
    Scalar(Value),
    /// Point in time with its original UTC offset.
    Timestamp(DateTime<FixedOffset>),
    /// Resolved by calling the producer at build time.
    Deferred(Producer),
    /// Nested mapping (e.g. `context`, `extra`).
    Structured(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Create an empty structured value.
    pub fn empty_map() -> Self {
        FieldValue::Structured(BTreeMap::new())
    }

    /// Create a structured value from key/value pairs.
    pub fn structured<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        FieldValue::Structured(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Create a deferred value from an infallible closure.
    pub fn deferred<F, V>(f: F) -> Self
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value> + 'static,
    {
        FieldValue::Deferred(Producer::infallible(f))
    }

    /// Convert a decoded JSON value; objects become structured values.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => FieldValue::Structured(
                map.into_iter()
                    .map(|(k, v)| (k, FieldValue::from_json(v)))
                    .collect(),
            ),
            other => FieldValue::Scalar(other),
        }
    }

    /// Integer view of a scalar value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Scalar(v) => v.as_i64(),
            _ => None,
        }
    }

    /// String view of a scalar value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Scalar(v) => v.as_str(),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::from_json(value)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::Scalar(Value::String(s.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::Scalar(Value::String(s))
    }
}

impl From<i64> for FieldValue {
    fn from(n: i64) -> Self {
        FieldValue::Scalar(Value::from(n))
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        FieldValue::Scalar(Value::from(n))
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        FieldValue::Scalar(Value::Bool(b))
    }
}

impl From<DateTime<FixedOffset>> for FieldValue {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        FieldValue::Timestamp(ts)
    }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self {
        FieldValue::Timestamp(ts.fixed_offset())
    }
}

impl From<Producer> for FieldValue {
    fn from(p: Producer) -> Self {
        FieldValue::Deferred(p)
    }
}

/// Reduce a field value to its storage representation.
///
/// Producers are invoked exactly once and their result is not formatted
/// again. An error from a producer, including one nested inside a
/// structured value, is returned unchanged.
pub fn format_value(value: &FieldValue) -> Result<Value, BoxError> {
    match value {
        FieldValue::Scalar(v) => Ok(v.clone()),
        FieldValue::Timestamp(ts) => Ok(Value::String(format_timestamp(ts))),
        FieldValue::Deferred(producer) => producer.produce(),
        FieldValue::Structured(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, entry) in map {
                out.insert(key.clone(), format_value(entry)?);
            }
            Ok(Value::Object(out))
        }
    }
}

/// Render a timestamp in its own offset.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// Render a timestamp after converting it to UTC.
pub fn format_utc_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string()
}

/// Encode a formatted mapping as JSON object text.
///
/// Empty or missing mappings always encode to `{}`: the destination column
/// is typed as an object.
pub fn encode_object_text(value: &Value) -> String {
    match value {
        Value::Null => "{}".to_string(),
        Value::Array(items) if items.is_empty() => "{}".to_string(),
        other => other.to_string(),
    }
}
