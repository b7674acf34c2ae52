//! # Binder Registry & Dispatch
//!
//! Maps the `as` token of a `<bind>` to the [`Binder`] that writes the value
//! into its presentation target.
//!
//! ## Dispatch order
//!
//! | Token | Binder | Target setter |
//! |-------|--------|---------------|
//! | `string` | [`StringBinder`] | text |
//! | `image` | [`ImageBinder`] | image bytes |
//! | `image-uri` | [`ImageUriBinder`] | image reference |
//! | `drawable` | [`DrawableBinder`] | drawable resource |
//! | `tag` | [`TagBinder`] | opaque tag |
//! | anything else | custom, from [`BinderRegistry`] | binder-defined |
//!
//! Binders are stateless: one instance per distinct token is created for a
//! plan ([`BinderCache`]) and the binding's transformation is passed on every
//! call.

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

pub use builtin::{DrawableBinder, ImageBinder, ImageUriBinder, StringBinder, TagBinder};

use crate::context::HostContext;
use crate::error::{BinderyError, CapabilityKind, Result};
use crate::presentation::Target;
use crate::row::Row;
use crate::transform::Transformation;

/// Writes a (transformed) field value into a presentation target
pub trait Binder: Send + Sync {
    /// Token this binder was resolved for
    fn kind(&self) -> &str;

    /// Returns false when the target cannot take this kind of value
    fn bind(
        &self,
        target: &mut dyn Target,
        row: &Row,
        column: usize,
        transformation: &Transformation,
    ) -> bool;
}

/// Data type of a binding (`as` attribute)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BinderKind {
    String,
    Image,
    ImageUri,
    Drawable,
    Tag,
    /// Fully-qualified identifier of a registered custom binder
    Custom(String),
}

impl BinderKind {
    pub fn parse(token: &str) -> Self {
        match token {
            "string" => BinderKind::String,
            "image" => BinderKind::Image,
            "image-uri" => BinderKind::ImageUri,
            "drawable" => BinderKind::Drawable,
            "tag" => BinderKind::Tag,
            other => BinderKind::Custom(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BinderKind::String => "string",
            BinderKind::Image => "image",
            BinderKind::ImageUri => "image-uri",
            BinderKind::Drawable => "drawable",
            BinderKind::Tag => "tag",
            BinderKind::Custom(identifier) => identifier,
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, BinderKind::Custom(_))
    }
}

impl fmt::Display for BinderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates a custom binder for a host context
pub trait BinderFactory: Send + Sync {
    fn create(&self, ctx: &HostContext) -> Result<Arc<dyn Binder>>;
}

impl<F> BinderFactory for F
where
    F: Fn(&HostContext) -> Result<Arc<dyn Binder>> + Send + Sync,
{
    fn create(&self, ctx: &HostContext) -> Result<Arc<dyn Binder>> {
        self(ctx)
    }
}

/// Factory table for custom binder identifiers, populated at start-up
#[derive(Default)]
pub struct BinderRegistry {
    factories: DashMap<String, Arc<dyn BinderFactory>>,
}

impl BinderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, identifier: impl Into<String>, factory: impl BinderFactory + 'static) {
        self.factories.insert(identifier.into(), Arc::new(factory));
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.factories.contains_key(identifier)
    }

    fn factory(&self, identifier: &str) -> Option<Arc<dyn BinderFactory>> {
        self.factories.get(identifier).map(|f| Arc::clone(f.value()))
    }
}

/// Per-plan binder instances, one per distinct kind token
#[derive(Default)]
pub struct BinderCache {
    binders: HashMap<BinderKind, Arc<dyn Binder>>,
}

impl BinderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `kind`, reusing the instance created earlier for the same token
    pub fn resolve(
        &mut self,
        kind: &BinderKind,
        ctx: &HostContext,
        source_name: &str,
    ) -> Result<Arc<dyn Binder>> {
        if let Some(binder) = self.binders.get(kind) {
            return Ok(Arc::clone(binder));
        }
        let binder = create_binder(kind, ctx, source_name)?;
        debug!(kind = %kind, "resolved binder");
        self.binders.insert(kind.clone(), Arc::clone(&binder));
        Ok(binder)
    }

    pub fn len(&self) -> usize {
        self.binders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.binders.is_empty()
    }
}

fn create_binder(kind: &BinderKind, ctx: &HostContext, source_name: &str) -> Result<Arc<dyn Binder>> {
    let binder: Arc<dyn Binder> = match kind {
        BinderKind::String => Arc::new(StringBinder),
        BinderKind::Image => Arc::new(ImageBinder),
        BinderKind::ImageUri => Arc::new(ImageUriBinder),
        BinderKind::Drawable => Arc::new(DrawableBinder),
        BinderKind::Tag => Arc::new(TagBinder),
        BinderKind::Custom(identifier) => {
            if ctx.is_restricted() {
                return Err(BinderyError::RestrictedCapability {
                    source_name: source_name.to_string(),
                    kind: CapabilityKind::Binder,
                    identifier: identifier.clone(),
                });
            }
            let unresolved = || BinderyError::UnresolvedBinder {
                source_name: source_name.to_string(),
                kind: CapabilityKind::Binder,
                identifier: identifier.clone(),
            };
            let factory = ctx.binders().factory(identifier).ok_or_else(unresolved)?;
            factory.create(ctx).map_err(|e| {
                debug!(identifier = %identifier, error = %e, "binder factory failed");
                unresolved()
            })?
        }
    };
    Ok(binder)
}
