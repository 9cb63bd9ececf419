// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Handling gate: severity threshold plus a cached table-existence check.
//!
//! ```text
//! Unresolved --exists--> Accepting
//!            --missing-> Rejecting
//! ```
//!
//! Resolved states are terminal for the life of the gate.

use crate::error::StoreError;
use crate::store::TableStore;
use parking_lot::Mutex;

/// Cached outcome of the table-existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlingState {
    /// Existence not checked yet.
    #[default]
    Unresolved,
    /// Table exists; records are written.
    Accepting,
    /// Table missing; records are refused.
    Rejecting,
}

/// Decides whether the sink takes a record.
#[derive(Debug)]
pub struct HandlingGate {
    min_level: i64,
    state: Mutex<HandlingState>,
}

impl HandlingGate {
    /// Create a gate accepting records at or above `min_level`.
    pub fn new(min_level: i64) -> Self {
        Self {
            min_level,
            state: Mutex::new(HandlingState::Unresolved),
        }
    }

    pub fn min_level(&self) -> i64 {
        self.min_level
    }

    pub fn state(&self) -> HandlingState {
        *self.state.lock()
    }

    /// Severity check alone; never touches the store.
    pub fn passes_level(&self, level: i64) -> bool {
        level >= self.min_level
    }

    /// Whether a record at `level` should be handled.
    ///
    /// The store is asked about the table on the first query that passes
    /// the severity check and never again once the answer is known. The
    /// lock is held across the call, so concurrent first queries ask only
    /// once. A store error is returned and leaves the gate unresolved.
    pub fn try_is_handling<S: TableStore + ?Sized>(
        &self,
        level: i64,
        store: &S,
    ) -> Result<bool, StoreError> {
        if !self.passes_level(level) {
            return Ok(false);
        }

        let mut state = self.state.lock();
        match *state {
            HandlingState::Accepting => Ok(true),
            HandlingState::Rejecting => Ok(false),
            HandlingState::Unresolved => {
                let exists = store.table_exists()?;
                *state = if exists {
                    HandlingState::Accepting
                } else {
                    HandlingState::Rejecting
                };
                tracing::info!(
                    table = store.table_id(),
                    state = ?*state,
                    "Handling gate resolved"
                );
                Ok(exists)
            }
        }
    }

    /// Like [`try_is_handling`](Self::try_is_handling), answering `false`
    /// when the existence check fails.
    pub fn is_handling<S: TableStore + ?Sized>(&self, level: i64, store: &S) -> bool {
        self.try_is_handling(level, store).unwrap_or_else(|e| {
            tracing::warn!(
                table = store.table_id(),
                error = %e,
                "Table existence check failed"
            );
            false
        })
    }
}
