//! Durable single-record store

use super::{PriceMirror, TradeState};
use crate::telemetry::{increment, CounterMetric};
use chrono::Utc;
use parking_lot::Mutex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("state file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Owns the trade state record and its file
///
/// Every mutation runs under one lock as load, mutate, persist. A failed write
/// is logged and the in-memory record stays authoritative until the next
/// successful write replaces the file.
pub struct StateStore {
    path: PathBuf,
    history_limit: usize,
    state: Mutex<TradeState>,
    prices: Mutex<PriceMirror>,
}

impl StateStore {
    /// Open the store, loading an existing record if present
    ///
    /// A missing file starts empty; an unreadable one is reported and also
    /// starts empty.
    pub fn open(path: impl Into<PathBuf>, history_limit: usize) -> Self {
        let path = path.into();
        let state = match Self::read(&path) {
            Ok(Some(state)) => {
                tracing::info!(path = %path.display(), events = state.history.len(), "Loaded trade state");
                state
            }
            Ok(None) => TradeState::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable trade state");
                TradeState::default()
            }
        };

        Self {
            path,
            history_limit,
            prices: Mutex::new(state.prices.clone()),
            state: Mutex::new(state),
        }
    }

    /// Read a record from disk; `Ok(None)` when the file does not exist
    pub fn read(path: &Path) -> Result<Option<TradeState>, StoreError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy of the current record
    pub fn snapshot(&self) -> TradeState {
        self.state.lock().clone()
    }

    /// Latest prices, copied into the record on each write
    pub fn set_prices(&self, prices: PriceMirror) {
        *self.prices.lock() = prices;
    }

    /// Apply `f` and persist the whole record
    ///
    /// The file write is synchronous and happens under the lock, so the file
    /// always reflects the latest applied update. The record is a few KB and
    /// callers update it at most a few times per second.
    pub fn update<R>(&self, f: impl FnOnce(&mut TradeState) -> R) -> R {
        let mut state = self.state.lock();
        let result = f(&mut state);

        state.trim_history(self.history_limit);
        state.prices = self.prices.lock().clone();
        state.updated_at = Some(Utc::now());

        if let Err(e) = self.write(&state) {
            increment(CounterMetric::StateWriteFailed);
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist trade state");
        }

        result
    }

    fn write(&self, state: &TradeState) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
