//! Bindery - compiler and runtime for declarative row-to-view bindings

pub mod adapter;
pub mod binder;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod event_log;
pub mod fixture;
pub mod loader;
pub mod parser;
pub mod plan;
pub mod presentation;
pub mod resources;
pub mod row;
pub mod transform;

pub use adapter::{Adapters, BoundAdapter};
pub use binder::{Binder, BinderKind, BinderRegistry};
pub use config::BinderyConfig;
pub use context::HostContext;
pub use document::{DocEvent, DocumentCursor, XmlDocument};
pub use error::{BinderyError, FixSuggestion, Result};
pub use event_log::{Event, EventKind, EventLog};
pub use fixture::JsonFixture;
pub use loader::{DataSource, LoadState, QueryRequest, RowLoader};
pub use parser::{compile, ADAPTER_CURSOR};
pub use plan::{BindingPlan, FieldBinding, QuerySpec};
pub use presentation::{Target, TargetContainer, ViewNode, ViewTree};
pub use resources::{ResourceId, ResourceResolver, ResourceTable};
pub use row::{Row, RowCursor, Value, VecCursor};
pub use transform::{CursorTransformation, Transformation, TransformationRegistry};
