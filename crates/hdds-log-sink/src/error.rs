// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the sink and its table store.

use thiserror::Error;

/// Boxed error returned by deferred-value producers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by a [`TableStore`](crate::store::TableStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("row serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("table {0} does not exist")]
    MissingTable(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by [`TableSink`](crate::sink::TableSink).
#[derive(Debug, Error)]
pub enum SinkError {
    /// A deferred value raised while the row was being built.
    #[error("producer for field '{field}' failed: {source}")]
    Producer {
        field: String,
        #[source]
        source: BoxError,
    },

    /// The bulk-insert call itself failed.
    #[error("insert call failed: {0}")]
    Store(#[from] StoreError),

    /// The store accepted the call but rejected some rows.
    #[error("{failed} of {total} rows rejected by the store")]
    Insert {
        failed: usize,
        total: usize,
        errors: Vec<crate::store::RowError>,
    },
}
