// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Table store abstraction.
//!
//! Defines the two calls the sink needs from a table backend. Remote
//! clients (BigQuery, ClickHouse, ...) implement [`TableStore`] outside this
//! crate; two local backends are provided here.
//!
//! # Implementations
//!
//! - `MemoryTableStore` -- in-process, records every call
//! - `NdjsonTableStore` -- one JSON-lines file per table on local disk

use crate::builder::OutgoingRow;
use crate::error::StoreError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A row the store refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// Position of the row in the submitted batch.
    pub index: usize,
    /// Store-provided reason.
    pub reason: String,
}

/// Outcome of a bulk insert that reached the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Every row was accepted.
    Success,
    /// Some rows were rejected; the rest were accepted.
    Partial(Vec<RowError>),
}

impl InsertResult {
    pub fn is_success(&self) -> bool {
        matches!(self, InsertResult::Success)
    }
}

/// Table store trait
///
/// Backend-agnostic interface to a single destination table.
pub trait TableStore {
    /// Identifier of the destination table, for diagnostics.
    fn table_id(&self) -> &str;

    /// Whether the destination table exists.
    fn table_exists(&self) -> Result<bool, StoreError>;

    /// Insert a batch of rows in one call, preserving their order.
    fn insert_rows(&self, rows: &[OutgoingRow]) -> Result<InsertResult, StoreError>;
}

impl<T: TableStore + ?Sized> TableStore for Arc<T> {
    fn table_id(&self) -> &str {
        (**self).table_id()
    }

    fn table_exists(&self) -> Result<bool, StoreError> {
        (**self).table_exists()
    }

    fn insert_rows(&self, rows: &[OutgoingRow]) -> Result<InsertResult, StoreError> {
        (**self).insert_rows(rows)
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    exists: bool,
    exists_calls: usize,
    batches: Vec<Vec<OutgoingRow>>,
    accepted: Vec<OutgoingRow>,
    rejected_indices: Vec<usize>,
    failure: Option<String>,
}

/// In-process table store.
///
/// Keeps every submitted batch and counts existence checks, so callers can
/// check exactly what reached the store.
#[derive(Debug)]
pub struct MemoryTableStore {
    table_id: String,
    state: Mutex<MemoryState>,
}

impl MemoryTableStore {
    /// Create a store whose table exists.
    pub fn new(table_id: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            state: Mutex::new(MemoryState {
                exists: true,
                ..Default::default()
            }),
        }
    }

    /// Create a store whose table does not exist.
    pub fn missing(table_id: impl Into<String>) -> Self {
        let store = Self::new(table_id);
        store.state.lock().exists = false;
        store
    }

    /// Reject rows at these batch positions on every insert.
    pub fn reject_rows(&self, indices: impl IntoIterator<Item = usize>) {
        self.state.lock().rejected_indices = indices.into_iter().collect();
    }

    /// Fail every insert call with a backend error.
    pub fn fail_inserts(&self, reason: impl Into<String>) {
        self.state.lock().failure = Some(reason.into());
    }

    /// Number of `table_exists` calls so far.
    pub fn exists_calls(&self) -> usize {
        self.state.lock().exists_calls
    }

    /// Every batch passed to `insert_rows`, in call order.
    pub fn batches(&self) -> Vec<Vec<OutgoingRow>> {
        self.state.lock().batches.clone()
    }

    /// Rows the store accepted, in insertion order.
    pub fn rows(&self) -> Vec<OutgoingRow> {
        self.state.lock().accepted.clone()
    }
}

impl TableStore for MemoryTableStore {
    fn table_id(&self) -> &str {
        &self.table_id
    }

    fn table_exists(&self) -> Result<bool, StoreError> {
        let mut state = self.state.lock();
        state.exists_calls += 1;
        Ok(state.exists)
    }

    fn insert_rows(&self, rows: &[OutgoingRow]) -> Result<InsertResult, StoreError> {
        let mut state = self.state.lock();
        state.batches.push(rows.to_vec());

        if let Some(reason) = &state.failure {
            return Err(StoreError::Backend(reason.clone()));
        }
        if !state.exists {
            return Err(StoreError::MissingTable(self.table_id.clone()));
        }

        let mut errors = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if state.rejected_indices.contains(&index) {
                errors.push(RowError {
                    index,
                    reason: "rejected by store".to_string(),
                });
            } else {
                state.accepted.push(row.clone());
            }
        }

        if errors.is_empty() {
            Ok(InsertResult::Success)
        } else {
            Ok(InsertResult::Partial(errors))
        }
    }
}

/// Table store backed by JSON-lines files.
///
/// Layout: `<root>/<dataset>/<table>.ndjson`, one JSON object per row. The
/// table exists when its file exists; inserts never create it.
#[derive(Debug, Clone)]
pub struct NdjsonTableStore {
    table_id: String,
    path: PathBuf,
}

impl NdjsonTableStore {
    pub fn new(root: impl AsRef<Path>, dataset: &str, table: &str) -> Self {
        let path = root
            .as_ref()
            .join(dataset)
            .join(format!("{}.ndjson", table));
        Self {
            table_id: format!("{}.{}", dataset, table),
            path,
        }
    }

    /// Path of the table file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the table file (and dataset directory) if missing.
    pub fn create_table(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(())
    }
}

impl TableStore for NdjsonTableStore {
    fn table_id(&self) -> &str {
        &self.table_id
    }

    fn table_exists(&self) -> Result<bool, StoreError> {
        Ok(self.path.is_file())
    }

    fn insert_rows(&self, rows: &[OutgoingRow]) -> Result<InsertResult, StoreError> {
        if !self.path.is_file() {
            return Err(StoreError::MissingTable(self.table_id.clone()));
        }

        // Encode everything first so a bad row never leaves a half-written batch.
        let mut buf = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buf, row)?;
            buf.push(b'\n');
        }

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(&buf)?;
        writer.flush()?;
        Ok(InsertResult::Success)
    }
}
