//! Compiled binding plan
//!
//! A `BindingPlan` is the immutable result of compiling one definition
//! document. Every binding carries its resolved binder and its
//! transformation, so the runtime never goes back to the document.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::binder::{Binder, BinderKind};
use crate::resources::ResourceId;
use crate::row::ID_COLUMN;
use crate::transform::Transformation;

/// Ordered, duplicate-free column list with `_id` pinned first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSet {
    columns: Vec<String>,
}

impl Default for ColumnSet {
    fn default() -> Self {
        Self::new()
    }
}

impl ColumnSet {
    pub fn new() -> Self {
        Self {
            columns: vec![ID_COLUMN.to_string()],
        }
    }

    /// Append `column` unless already present; returns true when added
    pub fn insert(&mut self, column: &str) -> bool {
        if self.contains(column) {
            return false;
        }
        self.columns.push(column.to_string());
        true
    }

    pub fn contains(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Query parameters declared on the root element
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuerySpec {
    pub source_uri: Option<String>,
    pub selection: Option<String>,
    pub sort_order: Option<String>,
}

impl QuerySpec {
    /// True when the root asked for automatic loading
    pub fn is_auto_load(&self) -> bool {
        self.source_uri.is_some()
    }
}

/// One `from` column → `to` target association
#[derive(Clone)]
pub struct FieldBinding {
    pub from: String,
    pub to: ResourceId,
    pub kind: BinderKind,
    pub transformation: Transformation,
    pub binder: Arc<dyn Binder>,
}

impl fmt::Debug for FieldBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldBinding")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("kind", &self.kind)
            .field("transformation", &self.transformation)
            .finish()
    }
}

/// Immutable result of compiling a definition
#[derive(Debug, Clone)]
pub struct BindingPlan {
    source_name: String,
    target_descriptor: ResourceId,
    query: QuerySpec,
    selected_columns: ColumnSet,
    bindings: Vec<FieldBinding>,
}

impl BindingPlan {
    pub(crate) fn new(
        source_name: String,
        target_descriptor: ResourceId,
        query: QuerySpec,
        selected_columns: ColumnSet,
        bindings: Vec<FieldBinding>,
    ) -> Self {
        Self {
            source_name,
            target_descriptor,
            query,
            selected_columns,
            bindings,
        }
    }

    /// Identifier of the document this plan was compiled from
    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    /// Item template every row is bound into
    pub fn target_descriptor(&self) -> ResourceId {
        self.target_descriptor
    }

    /// Query to run automatically; `None` unless the root declares a `uri`
    pub fn query(&self) -> Option<&QuerySpec> {
        self.query.is_auto_load().then_some(&self.query)
    }

    /// Selection and sort order, also used when the URI is supplied later
    pub fn query_spec(&self) -> &QuerySpec {
        &self.query
    }

    /// Columns to fetch, `_id` first
    pub fn selected_columns(&self) -> &[String] {
        self.selected_columns.as_slice()
    }

    /// Bindings in document order
    pub fn bindings(&self) -> &[FieldBinding] {
        &self.bindings
    }

    /// Targets written by more than one binding; later bindings overwrite
    pub fn shared_targets(&self) -> Vec<ResourceId> {
        let mut seen = BTreeSet::new();
        let mut shared = BTreeSet::new();
        for binding in &self.bindings {
            if !seen.insert(binding.to) {
                shared.insert(binding.to);
            }
        }
        shared.into_iter().collect()
    }
}
