//! Load lifecycle log
//!
//! Records every transition of the row loader so the ordering of starts,
//! cancellations and deliveries can be inspected after the fact.
//! - Event: envelope with id + timestamp + kind
//! - EventKind: load lifecycle variants
//! - EventLog: thread-safe, append-only log

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single entry of the load log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

/// Loader transitions, keyed by load generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // REQUEST
    // ═══════════════════════════════════════════
    LoadStarted {
        generation: u64,
        uri: String,
        columns: usize,
    },
    LoadCancelled {
        generation: u64,
    },

    // ═══════════════════════════════════════════
    // OUTCOME
    // ═══════════════════════════════════════════
    LoadDelivered {
        generation: u64,
        rows: usize,
        duration_ms: u64,
    },
    /// Result arrived after its load was cancelled or superseded
    LoadDiscarded {
        generation: u64,
    },
    /// Query failed or timed out; the adapter falls back to an empty state
    LoadFailed {
        generation: u64,
        error: String,
    },
}

impl EventKind {
    pub fn generation(&self) -> u64 {
        match self {
            Self::LoadStarted { generation, .. }
            | Self::LoadCancelled { generation }
            | Self::LoadDelivered { generation, .. }
            | Self::LoadDiscarded { generation }
            | Self::LoadFailed { generation, .. } => *generation,
        }
    }

    /// True for events that end a load
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::LoadStarted { .. })
    }
}

/// Thread-safe, append-only event log
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    start_time: Instant,
    next_id: Arc<AtomicU64>,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            start_time: Instant::now(),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event (thread-safe, returns event ID)
    pub fn emit(&self, kind: EventKind) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let event = Event {
            id,
            timestamp_ms: self.start_time.elapsed().as_millis() as u64,
            kind,
        };

        self.events.write().push(event);
        id
    }

    /// Get all events (cloned)
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Events of one load generation
    pub fn filter_generation(&self, generation: u64) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| e.kind.generation() == generation)
            .collect()
    }

    /// Serialize to JSON for debugging
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.events()).unwrap_or(Value::Null)
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog")
            .field("len", &self.len())
            .finish()
    }
}
