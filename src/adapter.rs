//! Bound Adapter Runtime
//!
//! `BoundAdapter` owns a compiled plan, the current row cursor and the loader
//! that replaces it. `Adapters` is the entry point that compiles a definition
//! and hands back a ready adapter.
//!
//! ```text
//! definition ──compile──▶ BindingPlan ──▶ BoundAdapter ──load()──▶ RowLoader
//!                                              ▲                       │
//!                                              └──── Delivery ◀────────┘
//! refresh(container, row): for each binding → find target → Binder::bind
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::context::HostContext;
use crate::document::DocumentCursor;
use crate::error::Result;
use crate::event_log::EventLog;
use crate::loader::{DataSource, Delivery, QueryRequest, RowLoader};
use crate::parser::{compile, ADAPTER_CURSOR};
use crate::plan::BindingPlan;
use crate::presentation::TargetContainer;
use crate::resources::ResourceId;
use crate::row::{Columns, Row, RowCursor, ID_COLUMN};

/// Column indices of every binding, valid for one column header
#[derive(Debug, Default)]
struct ColumnIndexCache {
    columns: Option<Arc<Columns>>,
    indices: Vec<Option<usize>>,
}

impl ColumnIndexCache {
    /// Recompute when `columns` is not the header the cache was built for
    fn indices_for(&mut self, plan: &BindingPlan, columns: &Arc<Columns>) -> &[Option<usize>] {
        let fresh = self
            .columns
            .as_ref()
            .is_some_and(|cached| Arc::ptr_eq(cached, columns));
        if !fresh {
            self.indices = plan
                .bindings()
                .iter()
                .map(|b| columns.index_of(&b.from))
                .collect();
            self.columns = Some(Arc::clone(columns));
        }
        &self.indices
    }

    fn clear(&mut self) {
        self.columns = None;
        self.indices.clear();
    }
}

/// A compiled plan bound to its current rows
pub struct BoundAdapter {
    plan: Arc<BindingPlan>,
    uri: Option<String>,
    selection_args: Vec<String>,
    loader: Option<RowLoader>,
    cursor: Option<Box<dyn RowCursor>>,
    column_cache: ColumnIndexCache,
}

impl BoundAdapter {
    /// Adapter without rows; the URI comes from the plan, if declared
    pub fn new(plan: Arc<BindingPlan>) -> Self {
        let uri = plan.query().and_then(|q| q.source_uri.clone());
        Self {
            plan,
            uri,
            selection_args: Vec::new(),
            loader: None,
            cursor: None,
            column_cache: ColumnIndexCache::default(),
        }
    }

    /// Attach the data source `load()` queries
    pub fn with_data_source(mut self, source: Arc<dyn DataSource>, timeout: Option<Duration>) -> Self {
        self.loader = Some(RowLoader::new(source).with_timeout(timeout));
        self
    }

    /// Attach a data source whose load events go to `events`
    pub fn with_data_source_logged(
        mut self,
        source: Arc<dyn DataSource>,
        timeout: Option<Duration>,
        events: EventLog,
    ) -> Self {
        self.loader = Some(
            RowLoader::new(source)
                .with_timeout(timeout)
                .with_event_log(events),
        );
        self
    }

    pub fn with_selection_args(mut self, selection_args: Vec<String>) -> Self {
        self.selection_args = selection_args;
        self
    }

    pub fn plan(&self) -> &BindingPlan {
        &self.plan
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn loader(&self) -> Option<&RowLoader> {
        self.loader.as_ref()
    }

    /// Start loading from the current URI
    ///
    /// Returns false when no URI or no data source is known, or when called
    /// outside a tokio runtime. Any load in flight is cancelled first.
    pub fn load(&mut self) -> bool {
        let (Some(uri), Some(loader)) = (self.uri.as_ref(), self.loader.as_mut()) else {
            debug!(source = self.plan.source_name(), "nothing to load");
            return false;
        };
        if tokio::runtime::Handle::try_current().is_err() {
            warn!(source = self.plan.source_name(), "load() needs a tokio runtime, not loading");
            return false;
        }
        let request = QueryRequest::for_plan(&self.plan, uri.as_str(), &self.selection_args);
        loader.start(request);
        true
    }

    /// Replace the data source URI
    ///
    /// The in-flight load is invalidated; call `load()` to repopulate.
    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.cancel_load();
        self.uri = Some(uri.into());
    }

    /// Install `cursor` directly, closing the previous one
    pub fn change_cursor(&mut self, cursor: Option<Box<dyn RowCursor>>) {
        self.cancel_load();
        self.swap_cursor(cursor);
    }

    /// Hand over a finished load, if any, without waiting
    pub fn apply_pending(&mut self) -> bool {
        let delivery = self.loader.as_mut().and_then(RowLoader::poll_delivery);
        match delivery {
            Some(delivery) => {
                self.install(delivery);
                true
            }
            None => false,
        }
    }

    /// Wait for the active load and install its result
    pub async fn wait_for_load(&mut self) -> bool {
        let delivery = match self.loader.as_mut() {
            Some(loader) => loader.next_delivery().await,
            None => None,
        };
        match delivery {
            Some(delivery) => {
                self.install(delivery);
                true
            }
            None => false,
        }
    }

    /// Rows available; zero without a cursor
    pub fn count(&self) -> usize {
        self.cursor.as_ref().map_or(0, |c| c.count())
    }

    pub fn has_cursor(&self) -> bool {
        self.cursor.is_some()
    }

    /// `_id` of the row at `position`
    pub fn item_id(&mut self, position: usize) -> Option<i64> {
        let cursor = self.cursor.as_mut()?;
        if !cursor.move_to(position) {
            return None;
        }
        let row = cursor.current()?;
        row.column_index(ID_COLUMN).and_then(|i| row.get_int(i))
    }

    /// Item template the container should be built from
    pub fn target_descriptor(&self) -> ResourceId {
        self.plan.target_descriptor()
    }

    /// Bind the row at `position` into `container`
    pub fn bind_position(&mut self, container: &mut dyn TargetContainer, position: usize) -> bool {
        let Some(cursor) = self.cursor.as_mut() else {
            return false;
        };
        if !cursor.move_to(position) {
            return false;
        }
        let Some(row) = cursor.current() else {
            return false;
        };
        apply_bindings(&self.plan, &mut self.column_cache, container, row);
        true
    }

    /// Apply every binding of the plan to `row`; returns how many bound
    ///
    /// Bindings whose target or column is absent are skipped.
    pub fn refresh(&mut self, container: &mut dyn TargetContainer, row: &Row) -> usize {
        apply_bindings(&self.plan, &mut self.column_cache, container, row)
    }

    fn cancel_load(&mut self) {
        if let Some(loader) = self.loader.as_mut() {
            loader.cancel();
        }
    }

    fn install(&mut self, delivery: Delivery) {
        debug!(generation = delivery.generation, "installing loaded cursor");
        self.swap_cursor(delivery.cursor);
    }

    /// Release the previous cursor before the new one takes its place
    fn swap_cursor(&mut self, cursor: Option<Box<dyn RowCursor>>) {
        if let Some(mut old) = self.cursor.take() {
            old.close();
        }
        self.column_cache.clear();
        self.cursor = cursor;
    }
}

impl Drop for BoundAdapter {
    fn drop(&mut self) {
        if let Some(cursor) = self.cursor.as_mut() {
            cursor.close();
        }
    }
}

impl std::fmt::Debug for BoundAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundAdapter")
            .field("source", &self.plan.source_name())
            .field("uri", &self.uri)
            .field("rows", &self.count())
            .field("loader", &self.loader)
            .finish()
    }
}

fn apply_bindings(
    plan: &BindingPlan,
    cache: &mut ColumnIndexCache,
    container: &mut dyn TargetContainer,
    row: &Row,
) -> usize {
    let indices = cache.indices_for(plan, row.columns());
    let mut bound = 0;

    for (binding, index) in plan.bindings().iter().zip(indices) {
        let Some(column) = *index else {
            debug!(from = %binding.from, "column absent from row, skipping binding");
            continue;
        };
        let Some(target) = container.find_target(binding.to) else {
            trace!(to = %binding.to, "target not in container");
            continue;
        };
        if binding
            .binder
            .bind(target, row, column, &binding.transformation)
        {
            bound += 1;
        }
    }

    bound
}

/// Entry points that compile a definition into a [`BoundAdapter`]
#[derive(Clone)]
pub struct Adapters {
    ctx: HostContext,
    expected_root: Option<String>,
    source: Option<Arc<dyn DataSource>>,
    timeout: Option<Duration>,
    events: EventLog,
}

impl Adapters {
    pub fn new(ctx: HostContext) -> Self {
        Self {
            ctx,
            expected_root: None,
            source: None,
            timeout: None,
            events: EventLog::new(),
        }
    }

    /// Root element every definition compiled here must have
    ///
    /// Without one, `load_adapter` accepts any supported root and the cursor
    /// entry points require `cursor-adapter`.
    pub fn with_expected_root(mut self, root: Option<String>) -> Self {
        self.expected_root = root;
        self
    }

    pub fn with_data_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn context(&self) -> &HostContext {
        &self.ctx
    }

    /// Load events of every adapter created here
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Compile any supported adapter definition
    ///
    /// `params` become the query's selection arguments. When the definition
    /// declares a `uri`, the adapter is ready to `load()` from it.
    pub fn load_adapter(&self, document: &mut dyn DocumentCursor, params: &[String]) -> Result<BoundAdapter> {
        let plan = compile(document, self.expected_root.as_deref(), &self.ctx)?;
        Ok(self.bind(plan).with_selection_args(params.to_vec()))
    }

    /// Compile a cursor adapter and install caller-supplied rows
    ///
    /// The definition's `uri` is not used for loading.
    pub fn load_cursor_adapter_with_cursor(
        &self,
        document: &mut dyn DocumentCursor,
        cursor: Box<dyn RowCursor>,
    ) -> Result<BoundAdapter> {
        let plan = compile(document, Some(self.cursor_root()), &self.ctx)?;
        let mut adapter = BoundAdapter::new(Arc::new(plan));
        adapter.uri = None;
        adapter.change_cursor(Some(cursor));
        Ok(adapter)
    }

    /// Compile a cursor adapter that loads from `uri` instead of its own
    pub fn load_cursor_adapter_with_uri(
        &self,
        document: &mut dyn DocumentCursor,
        uri: &str,
        params: &[String],
    ) -> Result<BoundAdapter> {
        let plan = compile(document, Some(self.cursor_root()), &self.ctx)?;
        let mut adapter = self.bind(plan).with_selection_args(params.to_vec());
        adapter.set_uri(uri);
        Ok(adapter)
    }

    fn cursor_root(&self) -> &str {
        self.expected_root.as_deref().unwrap_or(ADAPTER_CURSOR)
    }

    fn bind(&self, plan: BindingPlan) -> BoundAdapter {
        let adapter = BoundAdapter::new(Arc::new(plan));
        match &self.source {
            Some(source) => {
                adapter.with_data_source_logged(Arc::clone(source), self.timeout, self.events.clone())
            }
            None => adapter,
        }
    }
}

impl std::fmt::Debug for Adapters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapters")
            .field("ctx", &self.ctx)
            .field("expected_root", &self.expected_root)
            .field("has_source", &self.source.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}
