//! Host context handed to the compiler and to custom factories
//!
//! Bundles the resource resolver, the factory tables for custom binders and
//! transformations, and the restricted-execution flag.

use std::sync::Arc;

use crate::binder::BinderRegistry;
use crate::resources::ResourceResolver;
use crate::transform::TransformationRegistry;

#[derive(Clone)]
pub struct HostContext {
    resources: Arc<dyn ResourceResolver>,
    binders: Arc<BinderRegistry>,
    transformations: Arc<TransformationRegistry>,
    restricted: bool,
}

impl HostContext {
    /// Unrestricted context with empty factory tables
    pub fn new(resources: Arc<dyn ResourceResolver>) -> Self {
        Self {
            resources,
            binders: Arc::new(BinderRegistry::new()),
            transformations: Arc::new(TransformationRegistry::new()),
            restricted: false,
        }
    }

    /// Mark the context as restricted (no custom binders or transformations)
    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }

    pub fn with_binders(mut self, binders: Arc<BinderRegistry>) -> Self {
        self.binders = binders;
        self
    }

    pub fn with_transformations(mut self, transformations: Arc<TransformationRegistry>) -> Self {
        self.transformations = transformations;
        self
    }

    pub fn resources(&self) -> &dyn ResourceResolver {
        self.resources.as_ref()
    }

    pub fn binders(&self) -> &BinderRegistry {
        &self.binders
    }

    pub fn transformations(&self) -> &TransformationRegistry {
        &self.transformations
    }

    pub fn is_restricted(&self) -> bool {
        self.restricted
    }
}

impl std::fmt::Debug for HostContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostContext")
            .field("restricted", &self.restricted)
            .finish_non_exhaustive()
    }
}
