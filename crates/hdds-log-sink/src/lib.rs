// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! HDDS Log Sink
//!
//! Persists structured log records as rows of an analytical table store,
//! in batches.
//!
//! This crate provides:
//! - A tagged value model for record fields (scalars, timestamps,
//!   structured maps, deferred producers)
//! - Row building with custom fields and column renaming
//! - A handling gate combining a level threshold with a cached
//!   table-existence check
//! - A [`TableStore`] trait plus in-memory and JSON-lines backends
//! - YAML configuration
//!
//! # Overview
//!
//! The sink does NOT talk to a remote store itself. Remote clients
//! implement [`TableStore`]; the sink issues exactly one `insert_rows`
//! call per submitted batch.
//!
//! ```text
//! LogRecord --> RowBuilder (custom fields, mapping, formatting) --> OutgoingRow
//!           --> TableSink::submit --> TableStore::insert_rows
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use hdds_log_sink::{FieldMapping, LogRecord, MemoryTableStore, TableSink};
//!
//! let sink = TableSink::new(MemoryTableStore::new("logs.app"))
//!     .with_mapping(FieldMapping::new().rename("message", "msg"));
//! sink.add_custom_field("env", "prod");
//! sink.submit_one(&record)?;
//! ```

pub mod builder;
pub mod config;
pub mod error;
pub mod fields;
pub mod gate;
pub mod record;
pub mod sink;
pub mod store;
pub mod value;

pub use builder::{OutgoingRow, RowBuilder};
pub use config::{ConfigError, SinkConfig, TableConfig};
pub use error::{BoxError, SinkError, StoreError};
pub use fields::{CustomFields, FieldMapping};
pub use gate::{HandlingGate, HandlingState};
pub use record::{LogRecord, RecordError};
pub use sink::{LogHandler, SinkStatsSnapshot, TableSink};
pub use store::{InsertResult, MemoryTableStore, NdjsonTableStore, RowError, TableStore};
pub use value::{FieldValue, Producer};
