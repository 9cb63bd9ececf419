// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Batch sink orchestrator.
//!
//! Connects the handling gate, custom fields, row building and the table
//! store into a single entry point.

use crate::builder::{OutgoingRow, RowBuilder};
use crate::config::SinkConfig;
use crate::error::SinkError;
use crate::fields::{CustomFields, FieldMapping};
use crate::gate::{HandlingGate, HandlingState};
use crate::record::LogRecord;
use crate::store::{InsertResult, TableStore};
use crate::value::FieldValue;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default minimum level (the lowest, debug-class severity).
pub const DEFAULT_MIN_LEVEL: i64 = 100;

/// Handler contract seen by the logging framework's dispatch chain.
pub trait LogHandler {
    /// Whether this handler takes the record at all.
    fn is_handling(&self, record: &LogRecord) -> bool;

    /// Handle one record.
    ///
    /// Returns `true` when the record must not be passed on to the next
    /// handler. A record this handler does not take returns `false`.
    fn handle(&self, record: &LogRecord) -> Result<bool, SinkError>;

    /// Handle a batch of records in one go.
    fn handle_batch(&self, records: &[LogRecord]) -> Result<(), SinkError>;

    /// Whether handled records should propagate to the next handler.
    fn bubble(&self) -> bool;
}

/// Sink counters.
#[derive(Debug, Default)]
pub struct SinkStats {
    batches_submitted: AtomicU64,
    rows_inserted: AtomicU64,
    rows_rejected: AtomicU64,
    records_filtered: AtomicU64,
}

/// Point-in-time copy of [`SinkStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkStatsSnapshot {
    /// Insert calls issued.
    pub batches_submitted: u64,
    /// Rows the store accepted.
    pub rows_inserted: u64,
    /// Rows the store refused.
    pub rows_rejected: u64,
    /// Records refused by the handling gate.
    pub records_filtered: u64,
}

impl SinkStats {
    pub fn snapshot(&self) -> SinkStatsSnapshot {
        SinkStatsSnapshot {
            batches_submitted: self.batches_submitted.load(Ordering::Relaxed),
            rows_inserted: self.rows_inserted.load(Ordering::Relaxed),
            rows_rejected: self.rows_rejected.load(Ordering::Relaxed),
            records_filtered: self.records_filtered.load(Ordering::Relaxed),
        }
    }
}

/// Log-record sink writing rows to one table.
///
/// Records are turned into rows on the caller's thread and sent to the
/// store in a single insert call per batch. Errors are never swallowed.
pub struct TableSink<S: TableStore> {
    store: S,
    builder: RowBuilder,
    custom_fields: CustomFields,
    gate: HandlingGate,
    bubble: bool,
    stats: SinkStats,
}

impl<S: TableStore> TableSink<S> {
    /// Create a sink with the default level threshold and bubbling enabled.
    pub fn new(store: S) -> Self {
        Self::with_options(store, DEFAULT_MIN_LEVEL, true)
    }

    /// Create a sink with an explicit level threshold and bubble flag.
    pub fn with_options(store: S, min_level: i64, bubble: bool) -> Self {
        Self {
            store,
            builder: RowBuilder::default(),
            custom_fields: CustomFields::new(),
            gate: HandlingGate::new(min_level),
            bubble,
            stats: SinkStats::default(),
        }
    }

    /// Create a sink from configuration.
    pub fn from_config(store: S, config: &SinkConfig) -> Self {
        let sink = Self::with_options(store, config.min_level, config.bubble)
            .with_mapping(config.field_mapping());
        sink.custom_fields.add_many(
            config
                .custom_fields
                .iter()
                .map(|(k, v)| (k.clone(), FieldValue::from_json(v.clone()))),
        );
        sink
    }

    /// Replace the column mapping.
    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.builder = RowBuilder::new(mapping);
        self
    }

    /// Add or overwrite a custom field.
    pub fn add_custom_field(&self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.custom_fields.add(name, value);
    }

    /// Merge several custom fields.
    pub fn add_custom_fields<I, K, V>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<FieldValue>,
    {
        self.custom_fields.add_many(entries);
    }

    /// Remove a custom field; unknown names are ignored.
    pub fn remove_custom_field(&self, name: &str) {
        self.custom_fields.remove(name);
    }

    /// Remove several custom fields; unknown names are ignored.
    pub fn remove_custom_fields<'a, I>(&self, names: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.custom_fields.remove_many(names);
    }

    pub fn custom_fields(&self) -> &CustomFields {
        &self.custom_fields
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn handling_state(&self) -> HandlingState {
        self.gate.state()
    }

    pub fn stats(&self) -> SinkStatsSnapshot {
        self.stats.snapshot()
    }

    /// Build the rows for `records` without sending them.
    ///
    /// All rows share one snapshot of the custom fields. The first failing
    /// producer aborts the whole batch.
    pub fn build_rows(&self, records: &[LogRecord]) -> Result<Vec<OutgoingRow>, SinkError> {
        let custom = self.custom_fields.snapshot();
        records
            .iter()
            .map(|record| self.builder.build(record, &custom))
            .collect()
    }

    /// Send `records` to the store as one insert call, in input order.
    ///
    /// Nothing is sent if any row fails to build. An empty slice is a no-op.
    pub fn submit(&self, records: &[LogRecord]) -> Result<(), SinkError> {
        if records.is_empty() {
            return Ok(());
        }

        let rows = self.build_rows(records)?;
        let total = rows.len();

        self.stats.batches_submitted.fetch_add(1, Ordering::Relaxed);
        let result = self.store.insert_rows(&rows)?;

        match result {
            InsertResult::Success => {
                self.stats
                    .rows_inserted
                    .fetch_add(total as u64, Ordering::Relaxed);
                tracing::debug!(table = self.store.table_id(), rows = total, "Batch inserted");
                Ok(())
            }
            InsertResult::Partial(errors) => {
                let failed = errors.len();
                self.stats
                    .rows_inserted
                    .fetch_add(total.saturating_sub(failed) as u64, Ordering::Relaxed);
                self.stats
                    .rows_rejected
                    .fetch_add(failed as u64, Ordering::Relaxed);
                tracing::warn!(
                    table = self.store.table_id(),
                    failed,
                    total,
                    "Store rejected rows"
                );
                Err(SinkError::Insert {
                    failed,
                    total,
                    errors,
                })
            }
        }
    }

    /// Send a single record.
    pub fn submit_one(&self, record: &LogRecord) -> Result<(), SinkError> {
        self.submit(std::slice::from_ref(record))
    }

    /// Severity check plus cached table-existence check for a raw level.
    ///
    /// A store error is returned to the caller and not cached.
    pub fn try_is_handling_level(&self, level: i64) -> Result<bool, SinkError> {
        Ok(self.gate.try_is_handling(level, &self.store)?)
    }

    /// Fallible form of [`LogHandler::is_handling`].
    pub fn try_is_handling(&self, record: &LogRecord) -> Result<bool, SinkError> {
        self.try_is_handling_level(record.level().unwrap_or(i64::MIN))
    }

    /// Like [`try_is_handling_level`](Self::try_is_handling_level),
    /// answering `false` when the existence check fails.
    pub fn is_handling_level(&self, level: i64) -> bool {
        self.gate.is_handling(level, &self.store)
    }
}

impl<S: TableStore> LogHandler for TableSink<S> {
    fn is_handling(&self, record: &LogRecord) -> bool {
        self.is_handling_level(record.level().unwrap_or(i64::MIN))
    }

    fn handle(&self, record: &LogRecord) -> Result<bool, SinkError> {
        if !self.try_is_handling(record)? {
            self.stats.records_filtered.fetch_add(1, Ordering::Relaxed);
            return Ok(false);
        }
        self.submit_one(record)?;
        Ok(!self.bubble)
    }

    fn handle_batch(&self, records: &[LogRecord]) -> Result<(), SinkError> {
        self.submit(records)
    }

    fn bubble(&self) -> bool {
        self.bubble
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::OutgoingRow;
    use crate::error::StoreError;
    use crate::store::MemoryTableStore;
    use chrono::DateTime;
    use serde_json::json;
    use std::sync::Arc;

    fn record(message: &str, level: i64) -> LogRecord {
        let dt = DateTime::parse_from_rfc3339("2024-06-01T12:00:00Z").expect("dt");
        LogRecord::new("app", message, level, "INFO", dt)
    }

    #[test]
    fn test_submit_empty_is_noop() {
        let store = Arc::new(MemoryTableStore::new("logs.app"));
        let sink = TableSink::new(Arc::clone(&store));

        sink.submit(&[]).expect("submit");
        assert!(store.batches().is_empty());
        assert_eq!(sink.stats().batches_submitted, 0);
    }

    #[test]
    fn test_handle_respects_bubble() {
        let store = Arc::new(MemoryTableStore::new("logs.app"));

        let bubbling = TableSink::with_options(Arc::clone(&store), 100, true);
        assert!(!bubbling.handle(&record("a", 200)).expect("handle"));

        let stopping = TableSink::with_options(Arc::clone(&store), 100, false);
        assert!(stopping.handle(&record("b", 200)).expect("handle"));

        assert_eq!(store.rows().len(), 2);
    }

    #[test]
    fn test_handle_filtered_record() {
        let store = Arc::new(MemoryTableStore::new("logs.app"));
        let sink = TableSink::with_options(Arc::clone(&store), 300, false);

        assert!(!sink.handle(&record("debug", 100)).expect("handle"));
        assert!(store.batches().is_empty());
        assert_eq!(store.exists_calls(), 0);
        assert_eq!(sink.stats().records_filtered, 1);
    }

    #[test]
    fn test_handle_rejected_when_table_missing() {
        let store = Arc::new(MemoryTableStore::missing("logs.app"));
        let sink = TableSink::new(Arc::clone(&store));

        for _ in 0..3 {
            assert!(!sink.handle(&record("m", 200)).expect("handle"));
        }
        assert_eq!(store.exists_calls(), 1);
        assert!(store.batches().is_empty());
        assert_eq!(sink.handling_state(), HandlingState::Rejecting);
    }

    struct UnreachableStore;

    impl TableStore for UnreachableStore {
        fn table_id(&self) -> &str {
            "logs.down"
        }

        fn table_exists(&self) -> Result<bool, StoreError> {
            Err(StoreError::Backend("auth failed".to_string()))
        }

        fn insert_rows(&self, _rows: &[OutgoingRow]) -> Result<InsertResult, StoreError> {
            Ok(InsertResult::Success)
        }
    }

    #[test]
    fn test_handle_surfaces_existence_check_error() {
        let sink = TableSink::new(UnreachableStore);

        let err = sink.handle(&record("m", 200)).unwrap_err();
        assert!(matches!(err, SinkError::Store(StoreError::Backend(ref r)) if r == "auth failed"));
        assert_eq!(sink.handling_state(), HandlingState::Unresolved);
        assert_eq!(sink.stats().records_filtered, 0);

        // Below the threshold nothing is asked of the store.
        assert!(!sink.handle(&record("debug", 50)).expect("filtered"));
        assert!(!sink.is_handling(&record("m", 200)));
    }

    #[test]
    fn test_record_without_level_is_not_handled() {
        let store = Arc::new(MemoryTableStore::new("logs.app"));
        let sink = TableSink::new(Arc::clone(&store));

        let rec = LogRecord::default().with_field("message", "no level");
        assert!(!sink.is_handling(&rec));
        assert_eq!(store.exists_calls(), 0);
    }

    #[test]
    fn test_stats_track_partial_insert() {
        let store = Arc::new(MemoryTableStore::new("logs.app"));
        store.reject_rows([0]);
        let sink = TableSink::new(Arc::clone(&store));

        let err = sink
            .submit(&[record("a", 200), record("b", 200)])
            .unwrap_err();
        assert!(matches!(err, SinkError::Insert { failed: 1, total: 2, .. }));

        let stats = sink.stats();
        assert_eq!(stats.batches_submitted, 1);
        assert_eq!(stats.rows_inserted, 1);
        assert_eq!(stats.rows_rejected, 1);
    }

    #[test]
    fn test_build_rows_uses_custom_fields() {
        let sink = TableSink::new(MemoryTableStore::new("logs.app"));
        sink.add_custom_field("env", "prod");

        let rows = sink.build_rows(&[record("a", 200)]).expect("build");
        assert_eq!(rows[0].get("env"), Some(&json!("prod")));
        assert!(sink.store().batches().is_empty());
    }
}
