// ── Session debug log ──
//
// Small ring buffer of human-readable session events for on-demand
// inspection. Independent of `tracing`: entries are kept in memory only
// and the oldest is dropped once the buffer is full.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

pub const DEBUG_LOG_CAPACITY: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DebugEventKind {
    Connect,
    Disconnect,
    Sent,
    Received,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebugEntry {
    pub at: DateTime<Utc>,
    pub kind: DebugEventKind,
    pub message: String,
}

/// Shared handle to a bounded event log.
#[derive(Debug, Clone)]
pub struct DebugLog {
    entries: Arc<Mutex<VecDeque<DebugEntry>>>,
    capacity: usize,
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::with_capacity(DEBUG_LOG_CAPACITY)
    }
}

impl DebugLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn record(&self, kind: DebugEventKind, message: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(DebugEntry {
            at: Utc::now(),
            kind,
            message: message.into(),
        });
    }

    /// Oldest-first copy of the current entries.
    pub fn entries(&self) -> Vec<DebugEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
