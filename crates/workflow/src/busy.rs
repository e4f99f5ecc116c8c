//! In-flight operation tracking.
//!
//! A second trigger of an operation that is still running is rejected,
//! not queued. [`BusyGuard`] clears the flag when dropped, so an early
//! return or error never leaves an operation stuck.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use inspecta_core::photo::PhotoKey;

/// Asynchronous operations guarded against re-entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Operation {
    VerifyIdentity,
    VerifyVehicle,
    Analyze(PhotoKey),
    Finalize,
    DownloadReport,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerifyIdentity => f.write_str("Identity verification"),
            Self::VerifyVehicle => f.write_str("Vehicle verification"),
            Self::Analyze(key) => write!(f, "Analysis of the {} photo", key.as_str()),
            Self::Finalize => f.write_str("Finalize"),
            Self::DownloadReport => f.write_str("Report download"),
        }
    }
}

/// Set of operations currently in flight.
#[derive(Debug, Clone, Default)]
pub struct BusyTracker {
    active: Arc<Mutex<BTreeSet<Operation>>>,
}

impl BusyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `op` as running. Returns `None` if it already is.
    pub fn try_begin(&self, op: Operation) -> Option<BusyGuard> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(op) {
            return None;
        }
        Some(BusyGuard {
            active: Arc::clone(&self.active),
            op,
        })
    }

    pub fn is_busy(&self, op: Operation) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&op)
    }

    pub fn snapshot(&self) -> BTreeSet<Operation> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Clears its operation from the tracker on drop.
#[derive(Debug)]
pub struct BusyGuard {
    active: Arc<Mutex<BTreeSet<Operation>>>,
    op: Operation,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.op);
    }
}
