// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Record-to-row transformation.
//!
//! ```text
//! custom fields --format--> row
//! record fields --skip formatted--> rename --format/encode--> row (overwrites)
//! ```

use crate::error::SinkError;
use crate::fields::FieldMapping;
use crate::record::{LogRecord, CONTEXT, DATETIME, EXTRA, FORMATTED};
use crate::value::{encode_object_text, format_utc_timestamp, format_value, FieldValue};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One storage row: destination column to storage value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct OutgoingRow {
    columns: Map<String, Value>,
}

impl OutgoingRow {
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// Column names, sorted.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// The row as a JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.columns
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.columns
    }
}

impl From<Map<String, Value>> for OutgoingRow {
    fn from(columns: Map<String, Value>) -> Self {
        Self { columns }
    }
}

/// Turns log records into outgoing rows.
#[derive(Debug, Clone, Default)]
pub struct RowBuilder {
    mapping: FieldMapping,
}

impl RowBuilder {
    pub fn new(mapping: FieldMapping) -> Self {
        Self { mapping }
    }

    pub fn mapping(&self) -> &FieldMapping {
        &self.mapping
    }

    /// Build the row for one record.
    ///
    /// Custom fields are written first under their own names, then every
    /// record field except `formatted` under its mapped name, so record
    /// values win on collision. Producers run exactly once per row.
    ///
    /// Only a `datetime` holding a timestamp is rendered as a UTC string.
    /// Records built with [`LogRecord::from_fields`] that carry another
    /// kind of `datetime` (or none) are stored as given; decoded records
    /// always hold a timestamp.
    pub fn build(
        &self,
        record: &LogRecord,
        custom: &BTreeMap<String, FieldValue>,
    ) -> Result<OutgoingRow, SinkError> {
        let mut columns = Map::new();

        for (name, value) in custom {
            columns.insert(name.clone(), format_field(name, value)?);
        }

        for (name, value) in record.iter() {
            if name == FORMATTED {
                continue;
            }
            let column = self.mapping.resolve(name).to_string();
            let stored = match (name.as_str(), value) {
                (DATETIME, FieldValue::Timestamp(ts)) => Value::String(format_utc_timestamp(ts)),
                (CONTEXT | EXTRA, _) => Value::String(encode_object_text(&format_field(name, value)?)),
                _ => format_field(name, value)?,
            };
            columns.insert(column, stored);
        }

        Ok(OutgoingRow { columns })
    }
}

fn format_field(name: &str, value: &FieldValue) -> Result<Value, SinkError> {
    format_value(value).map_err(|source| SinkError::Producer {
        field: name.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Producer;
    use chrono::DateTime;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn record() -> LogRecord {
        let dt = DateTime::parse_from_rfc3339("2024-06-01T12:00:00+00:00").expect("dt");
        LogRecord::new("app", "boot", 200, "INFO", dt)
    }

    #[test]
    fn test_build_canonical_row() {
        let row = RowBuilder::default()
            .build(&record(), &BTreeMap::new())
            .expect("build");

        assert_eq!(row.get("channel"), Some(&json!("app")));
        assert_eq!(row.get("message"), Some(&json!("boot")));
        assert_eq!(row.get("level"), Some(&json!(200)));
        assert_eq!(row.get("level_name"), Some(&json!("INFO")));
        assert_eq!(row.get("context"), Some(&json!("{}")));
        assert_eq!(row.get("extra"), Some(&json!("{}")));
        assert_eq!(
            row.get("datetime"),
            Some(&json!("2024-06-01T12:00:00.000000+00:00"))
        );
        assert_eq!(row.len(), 7);
    }

    #[test]
    fn test_formatted_is_dropped() {
        let rec = record().with_formatted("[2024-06-01] app.INFO: boot");
        let row = RowBuilder::default()
            .build(&rec, &BTreeMap::new())
            .expect("build");
        assert!(!row.contains("formatted"));

        let row = RowBuilder::default()
            .build(&record(), &BTreeMap::new())
            .expect("build");
        assert!(!row.contains("formatted"));
    }

    #[test]
    fn test_formatted_dropped_even_when_mapped() {
        let builder = RowBuilder::new(FieldMapping::new().rename("formatted", "line"));
        let row = builder
            .build(&record().with_formatted("text"), &BTreeMap::new())
            .expect("build");
        assert!(!row.contains("line"));
        assert!(!row.contains("formatted"));
    }

    #[test]
    fn test_mapping_renames_without_duplicating() {
        let builder = RowBuilder::new(
            FieldMapping::new()
                .rename("message", "msg")
                .rename("datetime", "logged_at"),
        );
        let row = builder.build(&record(), &BTreeMap::new()).expect("build");

        assert_eq!(row.get("msg"), Some(&json!("boot")));
        assert!(!row.contains("message"));
        assert!(row.contains("logged_at"));
        assert!(!row.contains("datetime"));
        assert_eq!(row.len(), 7);
    }

    #[test]
    fn test_record_wins_over_custom_field() {
        let mut custom = BTreeMap::new();
        custom.insert("channel".to_string(), FieldValue::from("custom"));
        custom.insert("msg".to_string(), FieldValue::from("custom"));

        let builder = RowBuilder::new(FieldMapping::new().rename("message", "msg"));
        let row = builder.build(&record(), &custom).expect("build");

        assert_eq!(row.get("channel"), Some(&json!("app")));
        assert_eq!(row.get("msg"), Some(&json!("boot")));
    }

    #[test]
    fn test_custom_fields_not_renamed() {
        let mut custom = BTreeMap::new();
        custom.insert("host".to_string(), FieldValue::from("web-1"));

        let builder = RowBuilder::new(FieldMapping::new().rename("host", "hostname"));
        let row = builder.build(&record(), &custom).expect("build");

        assert_eq!(row.get("host"), Some(&json!("web-1")));
        assert!(!row.contains("hostname"));
    }

    #[test]
    fn test_datetime_normalized_to_utc() {
        let dt = DateTime::parse_from_rfc3339("2024-01-01T10:00:00+02:00").expect("dt");
        let rec = LogRecord::new("app", "m", 200, "INFO", dt);
        let row = RowBuilder::default()
            .build(&rec, &BTreeMap::new())
            .expect("build");
        assert_eq!(
            row.get("datetime"),
            Some(&json!("2024-01-01T08:00:00.000000+00:00"))
        );
    }

    #[test]
    fn test_other_timestamps_keep_offset() {
        let dt = DateTime::parse_from_rfc3339("2024-01-01T10:00:00+02:00").expect("dt");
        let rec = record().with_field("started_at", dt);
        let row = RowBuilder::default()
            .build(&rec, &BTreeMap::new())
            .expect("build");
        assert_eq!(
            row.get("started_at"),
            Some(&json!("2024-01-01T10:00:00.000000+02:00"))
        );
    }

    #[test]
    fn test_context_encoded_as_json_text() {
        let dt = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z").expect("dt");
        let rec = record()
            .with_context(FieldValue::structured([
                ("user", FieldValue::from(7i64)),
                ("at", FieldValue::from(dt)),
            ]))
            .with_extra(FieldValue::Scalar(json!([])));
        let row = RowBuilder::default()
            .build(&rec, &BTreeMap::new())
            .expect("build");

        let context = row.get("context").and_then(Value::as_str).expect("text");
        let decoded: Value = serde_json::from_str(context).expect("json");
        assert_eq!(
            decoded,
            json!({"at": "2024-01-01T00:00:00.000000+00:00", "user": 7})
        );
        assert_eq!(row.get("extra"), Some(&json!("{}")));
    }

    #[test]
    fn test_custom_producer_runs_once_per_row() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut custom = BTreeMap::new();
        custom.insert(
            "request_id".to_string(),
            FieldValue::deferred(move || format!("req-{}", counter.fetch_add(1, Ordering::SeqCst))),
        );

        let builder = RowBuilder::default();
        let first = builder.build(&record(), &custom).expect("build");
        let second = builder.build(&record(), &custom).expect("build");

        assert_eq!(first.get("request_id"), Some(&json!("req-0")));
        assert_eq!(second.get("request_id"), Some(&json!("req-1")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_producer_failure_names_field() {
        let mut custom = BTreeMap::new();
        custom.insert(
            "tenant".to_string(),
            FieldValue::Deferred(Producer::new(|| Err("no tenant".into()))),
        );

        let err = RowBuilder::default()
            .build(&record(), &custom)
            .unwrap_err();
        match err {
            SinkError::Producer { field, source } => {
                assert_eq!(field, "tenant");
                assert_eq!(source.to_string(), "no tenant");
            }
            other => panic!("expected Producer, got {:?}", other),
        }
    }

    #[test]
    fn test_row_serializes_as_flat_object() {
        let row = RowBuilder::default()
            .build(&record(), &BTreeMap::new())
            .expect("build");
        let encoded = serde_json::to_value(&row).expect("serialize");
        assert_eq!(encoded["channel"], json!("app"));
        assert_eq!(encoded["context"], json!("{}"));
    }
}
