//! Transformation Module - value rewrites applied before binding
//!
//! - `expression`: `{column}` substitution with a tokenizer cache
//! - `Transformation`: Identity / ValueMap / Expression / Custom
//! - `TransformationRegistry`: factory table for `withClass` identifiers
//!
//! Data flow:
//! ```text
//! <map>/<transform> children → TransformChild list
//!                                   ↓
//!                              resolve()
//!                                   ↓
//!                            Transformation ──▶ Binder::bind
//! ```

pub mod expression;

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::binder::BinderKind;
use crate::context::HostContext;
use crate::error::{BinderyError, CapabilityKind, Result};
use crate::resources::{resolve_attribute, unescape_literal, ResourceId};
use crate::row::Row;

/// Custom transformation supplied by the host (`<transform withClass=...>`)
pub trait CursorTransformation: Send + Sync {
    /// Text form of the transformed value
    fn transform(&self, row: &Row, column: usize) -> Option<String>;

    /// Resource form of the transformed value; defaults to the raw integer
    fn transform_to_resource(&self, row: &Row, column: usize) -> Option<ResourceId> {
        raw_resource(row, column)
    }
}

fn raw_resource(row: &Row, column: usize) -> Option<ResourceId> {
    row.get_int(column)
        .and_then(|i| u32::try_from(i).ok())
        .map(ResourceId)
}

/// Replacement value of a `<map>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappedValue {
    Text(String),
    Resource(ResourceId),
}

impl MappedValue {
    fn as_text(&self) -> String {
        match self {
            MappedValue::Text(s) => s.clone(),
            MappedValue::Resource(id) => id.0.to_string(),
        }
    }

    fn as_resource(&self) -> Option<ResourceId> {
        match self {
            MappedValue::Text(s) => s.trim().parse().ok().map(ResourceId),
            MappedValue::Resource(id) => Some(*id),
        }
    }
}

/// Ordered `from_value → to_value` table; the first match wins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueMap {
    entries: Vec<(String, MappedValue)>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, from_value: impl Into<String>, to_value: MappedValue) {
        self.entries.push((from_value.into(), to_value));
    }

    pub fn lookup(&self, raw: &str) -> Option<&MappedValue> {
        self.entries
            .iter()
            .find(|(from, _)| from == raw)
            .map(|(_, to)| to)
    }

    pub fn entries(&self) -> &[(String, MappedValue)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Value rewrite attached to every binding (never absent)
#[derive(Clone)]
pub enum Transformation {
    /// Pass the raw value through unchanged
    Identity,
    ValueMap(ValueMap),
    /// Template with `{column}` placeholders
    Expression(String),
    Custom {
        identifier: String,
        handle: Arc<dyn CursorTransformation>,
    },
}

impl fmt::Debug for Transformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transformation::Identity => write!(f, "Identity"),
            Transformation::ValueMap(map) => f.debug_tuple("ValueMap").field(map).finish(),
            Transformation::Expression(e) => f.debug_tuple("Expression").field(e).finish(),
            Transformation::Custom { identifier, .. } => {
                f.debug_struct("Custom").field("identifier", identifier).finish()
            }
        }
    }
}

impl Default for Transformation {
    fn default() -> Self {
        Transformation::Identity
    }
}

impl Transformation {
    /// Text form of the field at `column` after the rewrite
    pub fn transform(&self, row: &Row, column: usize) -> Option<String> {
        match self {
            Transformation::Identity => row.get_string(column),
            Transformation::ValueMap(map) => {
                let raw = row.get_string(column)?;
                Some(map.lookup(&raw).map_or(raw, MappedValue::as_text))
            }
            Transformation::Expression(template) => {
                Some(expression::EXPRESSIONS.resolve(template, row))
            }
            Transformation::Custom { handle, .. } => handle.transform(row, column),
        }
    }

    /// Resource form of the field at `column` after the rewrite
    pub fn transform_to_resource(&self, row: &Row, column: usize) -> Option<ResourceId> {
        match self {
            Transformation::Identity => raw_resource(row, column),
            Transformation::ValueMap(map) => {
                let mapped = row
                    .get_string(column)
                    .and_then(|raw| map.lookup(&raw).cloned());
                match mapped {
                    Some(to) => to.as_resource(),
                    None => raw_resource(row, column),
                }
            }
            Transformation::Expression(_) => self
                .transform(row, column)
                .and_then(|s| s.trim().parse().ok())
                .map(ResourceId),
            Transformation::Custom { handle, .. } => handle.transform_to_resource(row, column),
        }
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Transformation::Identity)
    }

    /// Columns an expression reads; empty for every other variant
    pub fn referenced_columns(&self) -> Vec<String> {
        match self {
            Transformation::Expression(e) => expression::extract_columns(e),
            _ => Vec::new(),
        }
    }
}

/// Raw transformation children of a `<bind>` as read from the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformChild {
    Map {
        from_value: String,
        to_value: String,
    },
    Transform {
        with_expression: Option<String>,
        with_class: Option<String>,
    },
}

/// Resolve the children of one `<bind>` into its transformation
///
/// Several `<map>` accumulate in order; of several `<transform>` only the last
/// counts; mixing the two is rejected.
pub fn resolve(
    children: &[TransformChild],
    kind: &BinderKind,
    from: &str,
    ctx: &HostContext,
    source_name: &str,
) -> Result<Transformation> {
    let has_map = children
        .iter()
        .any(|c| matches!(c, TransformChild::Map { .. }));
    let last_transform = children.iter().rev().find_map(|c| match c {
        TransformChild::Transform {
            with_expression,
            with_class,
        } => Some((with_expression, with_class)),
        TransformChild::Map { .. } => None,
    });

    match (has_map, last_transform) {
        (false, None) => Ok(Transformation::Identity),
        (true, Some(_)) => Err(BinderyError::ConflictingTransformation {
            source_name: source_name.to_string(),
            from: from.to_string(),
        }),
        (true, None) => {
            let mut map = ValueMap::new();
            for child in children {
                if let TransformChild::Map {
                    from_value,
                    to_value,
                } = child
                {
                    let to = if *kind == BinderKind::Drawable {
                        let id = resolve_attribute(ctx.resources(), to_value).ok_or_else(|| {
                            BinderyError::MissingAttribute {
                                source_name: source_name.to_string(),
                                element: "map".into(),
                                attribute: "toValue".into(),
                            }
                        })?;
                        MappedValue::Resource(id)
                    } else {
                        MappedValue::Text(unescape_literal(to_value))
                    };
                    map.push(unescape_literal(from_value), to);
                }
            }
            debug!(from, entries = map.len(), "resolved value map");
            Ok(Transformation::ValueMap(map))
        }
        (false, Some((with_expression, with_class))) => match (with_class, with_expression) {
            (Some(identifier), _) => {
                let handle = ctx.transformations().create(identifier, ctx, source_name)?;
                Ok(Transformation::Custom {
                    identifier: identifier.clone(),
                    handle,
                })
            }
            (None, Some(expression)) => Ok(Transformation::Expression(expression.clone())),
            (None, None) => Err(BinderyError::MissingAttribute {
                source_name: source_name.to_string(),
                element: "transform".into(),
                attribute: "withExpression".into(),
            }),
        },
    }
}

/// Creates a custom transformation for a host context
pub trait TransformationFactory: Send + Sync {
    fn create(&self, ctx: &HostContext) -> Result<Arc<dyn CursorTransformation>>;
}

impl<F> TransformationFactory for F
where
    F: Fn(&HostContext) -> Result<Arc<dyn CursorTransformation>> + Send + Sync,
{
    fn create(&self, ctx: &HostContext) -> Result<Arc<dyn CursorTransformation>> {
        self(ctx)
    }
}

/// Factory table for `withClass` identifiers, populated at start-up
#[derive(Default)]
pub struct TransformationRegistry {
    factories: DashMap<String, Arc<dyn TransformationFactory>>,
}

impl TransformationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, identifier: impl Into<String>, factory: impl TransformationFactory + 'static) {
        self.factories.insert(identifier.into(), Arc::new(factory));
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    /// Instantiate `identifier`; refused outright in a restricted context
    pub fn create(
        &self,
        identifier: &str,
        ctx: &HostContext,
        source_name: &str,
    ) -> Result<Arc<dyn CursorTransformation>> {
        if ctx.is_restricted() {
            return Err(BinderyError::RestrictedCapability {
                source_name: source_name.to_string(),
                kind: CapabilityKind::Transformation,
                identifier: identifier.to_string(),
            });
        }
        let unresolved = || BinderyError::UnresolvedBinder {
            source_name: source_name.to_string(),
            kind: CapabilityKind::Transformation,
            identifier: identifier.to_string(),
        };
        let factory = self
            .factories
            .get(identifier)
            .map(|f| Arc::clone(f.value()))
            .ok_or_else(unresolved)?;
        factory.create(ctx).map_err(|e| {
            debug!(identifier, error = %e, "transformation factory failed");
            unresolved()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::ResourceTable;
    use crate::row::{Columns, Value};

    struct Upper;

    impl CursorTransformation for Upper {
        fn transform(&self, row: &Row, column: usize) -> Option<String> {
            row.get_string(column).map(|s| s.to_uppercase())
        }
    }

    fn row(value: Value) -> Row {
        Row::new(
            Arc::new(Columns::new(vec!["_id".into(), "v".into()])),
            vec![Value::Integer(9), value],
        )
    }

    fn ctx() -> HostContext {
        let table = ResourceTable::new();
        table.define("drawable", "off");
        table.define("drawable", "on");
        HostContext::new(Arc::new(table))
    }

    fn map(from: &str, to: &str) -> TransformChild {
        TransformChild::Map {
            from_value: from.into(),
            to_value: to.into(),
        }
    }

    fn expr(e: &str) -> TransformChild {
        TransformChild::Transform {
            with_expression: Some(e.into()),
            with_class: None,
        }
    }

    #[test]
    fn no_children_is_identity() {
        let t = resolve(&[], &BinderKind::String, "v", &ctx(), "doc").unwrap();
        assert!(t.is_identity());
        assert_eq!(t.transform(&row(Value::Text("x".into())), 1).as_deref(), Some("x"));
    }

    #[test]
    fn value_map_keeps_declaration_order_and_first_match() {
        let children = [map("a", "first"), map("b", "second"), map("a", "shadowed")];
        let t = resolve(&children, &BinderKind::String, "v", &ctx(), "doc").unwrap();
        let Transformation::ValueMap(m) = &t else {
            panic!("expected value map");
        };
        assert_eq!(m.len(), 3);
        assert_eq!(m.entries()[1].0, "b");
        assert_eq!(t.transform(&row(Value::Text("a".into())), 1).as_deref(), Some("first"));
    }

    #[test]
    fn unmapped_value_passes_through() {
        let t = resolve(&[map("0", "off")], &BinderKind::String, "v", &ctx(), "doc").unwrap();
        assert_eq!(t.transform(&row(Value::Integer(5)), 1).as_deref(), Some("5"));
        assert_eq!(t.transform_to_resource(&row(Value::Integer(5)), 1), Some(ResourceId(5)));
    }

    #[test]
    fn drawable_maps_resolve_resources() {
        let c = ctx();
        let on = c.resources().resolve("@drawable/on").unwrap();
        let children = [map("0", "@drawable/off"), map("1", "@drawable/on")];
        let t = resolve(&children, &BinderKind::Drawable, "starred", &c, "doc").unwrap();
        assert_eq!(t.transform_to_resource(&row(Value::Integer(1)), 1), Some(on));
    }

    #[test]
    fn drawable_map_to_unknown_resource_fails() {
        let err = resolve(
            &[map("1", "@drawable/missing")],
            &BinderKind::Drawable,
            "starred",
            &ctx(),
            "doc",
        )
        .unwrap_err();
        assert!(matches!(err, BinderyError::MissingAttribute { ref attribute, .. } if attribute == "toValue"));
    }

    #[test]
    fn non_drawable_to_value_is_literal() {
        let t = resolve(&[map("1", "\\@home")], &BinderKind::String, "v", &ctx(), "doc").unwrap();
        assert_eq!(t.transform(&row(Value::Integer(1)), 1).as_deref(), Some("@home"));
    }

    #[test]
    fn mixing_map_and_transform_conflicts() {
        let err = resolve(&[map("1", "x"), expr("{v}")], &BinderKind::String, "v", &ctx(), "doc")
            .unwrap_err();
        assert!(matches!(err, BinderyError::ConflictingTransformation { .. }));
    }

    #[test]
    fn last_transform_wins() {
        let t = resolve(&[expr("first {v}"), expr("second {v}")], &BinderKind::String, "v", &ctx(), "doc")
            .unwrap();
        assert_eq!(t.transform(&row(Value::Text("x".into())), 1).as_deref(), Some("second x"));
    }

    #[test]
    fn with_class_beats_with_expression() {
        let c = ctx();
        c.transformations().register(
            "com.example.Upper",
            |_: &HostContext| -> Result<Arc<dyn CursorTransformation>> { Ok(Arc::new(Upper)) },
        );
        let child = TransformChild::Transform {
            with_expression: Some("ignored {v}".into()),
            with_class: Some("com.example.Upper".into()),
        };
        let t = resolve(&[child], &BinderKind::String, "v", &c, "doc").unwrap();
        assert_eq!(t.transform(&row(Value::Text("ann".into())), 1).as_deref(), Some("ANN"));
    }

    #[test]
    fn transform_without_attributes_is_missing_attribute() {
        let child = TransformChild::Transform {
            with_expression: None,
            with_class: None,
        };
        let err = resolve(&[child], &BinderKind::String, "v", &ctx(), "doc").unwrap_err();
        assert!(matches!(err, BinderyError::MissingAttribute { .. }));
    }

    #[test]
    fn unknown_class_is_unresolved() {
        let child = TransformChild::Transform {
            with_expression: None,
            with_class: Some("com.example.Nope".into()),
        };
        let err = resolve(&[child], &BinderKind::String, "v", &ctx(), "doc").unwrap_err();
        assert!(matches!(
            err,
            BinderyError::UnresolvedBinder {
                kind: CapabilityKind::Transformation,
                ..
            }
        ));
    }

    #[test]
    fn restricted_context_refuses_custom_transformation() {
        let c = ctx().restricted(true);
        c.transformations().register(
            "com.example.Upper",
            |_: &HostContext| -> Result<Arc<dyn CursorTransformation>> { Ok(Arc::new(Upper)) },
        );
        let child = TransformChild::Transform {
            with_expression: None,
            with_class: Some("com.example.Upper".into()),
        };
        let err = resolve(&[child], &BinderKind::String, "v", &c, "doc").unwrap_err();
        assert!(matches!(err, BinderyError::RestrictedCapability { .. }));
    }

    #[test]
    fn expression_resource_form_parses_integer() {
        let t = Transformation::Expression("{v}".into());
        assert_eq!(t.transform_to_resource(&row(Value::Text("12".into())), 1), Some(ResourceId(12)));
    }
}
