//! Row Loader - asynchronous queries with cancellation and supersession
//!
//! State machine:
//! ```text
//! Idle ──start──▶ Loading ──result (active)──▶ Delivered
//!  ▲                 │
//!  └──── cancel ─────┘   start while Loading cancels first, then loads anew
//! ```
//!
//! A cancelled load leaves no trace in the state: the loader is `Idle` again
//! and its result, should one still arrive, is closed and discarded.
//!
//! The query runs on a tokio worker. Results travel back over a channel and
//! are only accepted by the owner while their generation is still the active
//! one, so a superseded load can never overwrite a newer cursor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{BinderyError, Result};
use crate::event_log::{EventKind, EventLog};
use crate::plan::BindingPlan;
use crate::row::RowCursor;

/// Arguments of one data source query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub uri: String,
    /// Projection, `_id` first (the plan's selected columns verbatim)
    pub columns: Vec<String>,
    pub selection: Option<String>,
    pub selection_args: Vec<String>,
    pub sort_order: Option<String>,
}

impl QueryRequest {
    /// Request for `plan` against `uri`
    pub fn for_plan(plan: &BindingPlan, uri: impl Into<String>, selection_args: &[String]) -> Self {
        let spec = plan.query_spec();
        Self {
            uri: uri.into(),
            columns: plan.selected_columns().to_vec(),
            selection: spec.selection.clone(),
            selection_args: selection_args.to_vec(),
            sort_order: spec.sort_order.clone(),
        }
    }
}

/// External collaborator that executes queries
///
/// `cancel` fires when the load is cancelled or superseded; implementations
/// may check it at natural suspension points and give up early.
#[async_trait]
pub trait DataSource: Send + Sync {
    async fn query(
        &self,
        request: QueryRequest,
        cancel: CancellationToken,
    ) -> Result<Box<dyn RowCursor>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing in flight: never started, or the last load was cancelled
    Idle,
    Loading,
    Delivered,
}

/// Outcome handed to the adapter; `cursor` is `None` when the query failed
pub struct Delivery {
    pub generation: u64,
    pub cursor: Option<Box<dyn RowCursor>>,
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("generation", &self.generation)
            .field("rows", &self.cursor.as_ref().map(|c| c.count()))
            .finish()
    }
}

/// Message from a worker back to the owner
struct Completed {
    generation: u64,
    started: Instant,
    outcome: Result<Box<dyn RowCursor>>,
}

/// Single-slot loader: at most one load is active at a time
pub struct RowLoader {
    source: Arc<dyn DataSource>,
    timeout: Option<Duration>,
    generation: u64,
    state: LoadState,
    token: Option<CancellationToken>,
    tx: mpsc::UnboundedSender<Completed>,
    rx: mpsc::UnboundedReceiver<Completed>,
    events: EventLog,
}

impl RowLoader {
    pub fn new(source: Arc<dyn DataSource>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            timeout: None,
            generation: 0,
            state: LoadState::Idle,
            token: None,
            tx,
            rx,
            events: EventLog::new(),
        }
    }

    /// Cancel loads that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record transitions into a shared log
    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    /// Generation of the most recently started load (0 before the first)
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Start a load, cancelling the one in flight; returns its generation
    ///
    /// # Panics
    ///
    /// Outside a tokio runtime. `BoundAdapter::load` checks for one first.
    pub fn start(&mut self, request: QueryRequest) -> u64 {
        self.cancel();

        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        self.state = LoadState::Loading;

        self.events.emit(EventKind::LoadStarted {
            generation,
            uri: request.uri.clone(),
            columns: request.columns.len(),
        });
        debug!(generation, uri = %request.uri, "load started");

        let source = Arc::clone(&self.source);
        let timeout = self.timeout;
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let started = Instant::now();
            let uri = request.uri.clone();
            // own task, so a panicking data source still reports back
            let query_token = token.clone();
            let mut query = tokio::spawn(async move { source.query(request, query_token).await });

            let outcome = tokio::select! {
                _ = token.cancelled() => None,
                result = run_with_timeout(&mut query, timeout, &uri) => Some(result),
            };
            let Some(outcome) = outcome else {
                release_abandoned(query).await;
                return;
            };

            // Owner may be gone; nothing to report to
            let _ = tx.send(Completed {
                generation,
                started,
                outcome,
            });
        });

        generation
    }

    /// Cancel the active load; returns false when nothing was loading
    pub fn cancel(&mut self) -> bool {
        if self.state != LoadState::Loading {
            return false;
        }
        if let Some(token) = self.token.take() {
            token.cancel();
        }
        self.state = LoadState::Idle;
        self.events.emit(EventKind::LoadCancelled {
            generation: self.generation,
        });
        debug!(generation = self.generation, "load cancelled");
        true
    }

    /// Take a finished result without waiting
    pub fn poll_delivery(&mut self) -> Option<Delivery> {
        while let Ok(done) = self.rx.try_recv() {
            if let Some(delivery) = self.accept(done) {
                return Some(delivery);
            }
        }
        None
    }

    /// Wait for the active load to finish; `None` when nothing is loading
    pub async fn next_delivery(&mut self) -> Option<Delivery> {
        while self.state == LoadState::Loading {
            let done = self.rx.recv().await?;
            if let Some(delivery) = self.accept(done) {
                return Some(delivery);
            }
        }
        None
    }

    /// Guarded hand-off: only the active generation may deliver
    fn accept(&mut self, done: Completed) -> Option<Delivery> {
        let Completed {
            generation,
            started,
            outcome,
        } = done;

        if generation != self.generation || self.state != LoadState::Loading {
            if let Ok(mut cursor) = outcome {
                cursor.close();
            }
            self.events.emit(EventKind::LoadDiscarded { generation });
            warn!(generation, active = self.generation, "discarded late load result");
            return None;
        }

        self.state = LoadState::Delivered;
        self.token = None;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(cursor) => {
                let rows = cursor.count();
                self.events.emit(EventKind::LoadDelivered {
                    generation,
                    rows,
                    duration_ms,
                });
                info!(generation, rows, duration_ms, "load delivered");
                Some(Delivery {
                    generation,
                    cursor: Some(cursor),
                })
            }
            Err(e) => {
                self.events.emit(EventKind::LoadFailed {
                    generation,
                    error: e.to_string(),
                });
                warn!(generation, error = %e, "load failed, showing empty state");
                Some(Delivery {
                    generation,
                    cursor: None,
                })
            }
        }
    }
}

impl Drop for RowLoader {
    fn drop(&mut self) {
        if let Some(token) = self.token.take() {
            token.cancel();
        }
    }
}

impl std::fmt::Debug for RowLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowLoader")
            .field("generation", &self.generation)
            .field("state", &self.state)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

type QueryTask = JoinHandle<Result<Box<dyn RowCursor>>>;

async fn run_with_timeout(
    query: &mut QueryTask,
    timeout: Option<Duration>,
    uri: &str,
) -> Result<Box<dyn RowCursor>> {
    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, &mut *query).await {
            Ok(joined) => joined,
            Err(_) => {
                query.abort();
                return Err(BinderyError::Query {
                    uri: uri.to_string(),
                    details: format!("timed out after {} ms", limit.as_millis()),
                });
            }
        },
        None => (&mut *query).await,
    };

    joined.map_err(|e| BinderyError::Query {
        uri: uri.to_string(),
        details: if e.is_panic() {
            "data source panicked".to_string()
        } else {
            format!("query task failed: {e}")
        },
    })?
}

/// Close a result that finished after its load was cancelled
async fn release_abandoned(query: QueryTask) {
    if !query.is_finished() {
        query.abort();
        return;
    }
    if let Ok(Ok(mut cursor)) = query.await {
        cursor.close();
    }
}
