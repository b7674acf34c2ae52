//! Symbolic resource references
//!
//! Definitions refer to layouts, view ids and drawables with `@type/name`
//! references. Resolution itself belongs to the host; this module holds the
//! capability trait plus an in-memory table used by the CLI and tests.

use std::collections::BTreeMap;
use std::fmt;

use dashmap::DashMap;
use parking_lot::Mutex;

/// Opaque identifier of a resolved resource (layout, view id, drawable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// Turns symbolic references into concrete resource ids
pub trait ResourceResolver: Send + Sync {
    /// Resolve `@type/name` (or `@package:type/name`)
    fn resolve(&self, reference: &str) -> Option<ResourceId>;

    /// Reverse lookup, used for diagnostics and CLI output
    fn entry_name(&self, id: ResourceId) -> Option<String>;
}

/// Resolve an attribute value to a resource id
///
/// `@` references go through the resolver; bare decimal numbers are taken as
/// literal ids. Zero never names a resource.
pub fn resolve_attribute(resolver: &dyn ResourceResolver, value: &str) -> Option<ResourceId> {
    let id = if value.starts_with('@') {
        resolver.resolve(value)?
    } else {
        ResourceId(value.trim().parse().ok()?)
    };
    (id.0 != 0).then_some(id)
}

/// Remove the backslash protecting a literal `@`
///
/// `\@home` reads as the string `@home` instead of a resource reference.
pub fn unescape_literal(value: &str) -> String {
    match value.strip_prefix("\\@") {
        Some(rest) => format!("@{rest}"),
        None => value.to_string(),
    }
}

/// Split `@[package:]type/name` into `(type, name)`
pub fn split_reference(reference: &str) -> Option<(&str, &str)> {
    let body = reference.strip_prefix('@')?;
    let body = body.split_once(':').map_or(body, |(_, rest)| rest);
    let (kind, name) = body.split_once('/')?;
    (!kind.is_empty() && !name.is_empty()).then_some((kind, name))
}

/// In-memory resource table
///
/// Ids are assigned in definition order starting at `0x7f000001`, the way a
/// generated resource table numbers application resources.
pub struct ResourceTable {
    by_name: DashMap<(String, String), ResourceId>,
    by_id: DashMap<ResourceId, (String, String)>,
    next: Mutex<u32>,
}

impl Default for ResourceTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTable {
    pub fn new() -> Self {
        Self {
            by_name: DashMap::new(),
            by_id: DashMap::new(),
            next: Mutex::new(0x7f00_0001),
        }
    }

    /// Build a table from `type -> [names]`, as found in the config file
    pub fn from_groups(groups: &BTreeMap<String, Vec<String>>) -> Self {
        let table = Self::new();
        for (kind, names) in groups {
            for name in names {
                table.define(kind, name);
            }
        }
        table
    }

    /// Define a resource, returning its id (existing ids are kept)
    pub fn define(&self, kind: &str, name: &str) -> ResourceId {
        let key = (kind.to_string(), name.to_string());
        // allocation happens under the entry's shard lock, so a racing
        // define of the same key sees the id instead of minting another
        let id = *self.by_name.entry(key.clone()).or_insert_with(|| {
            let mut next = self.next.lock();
            let id = ResourceId(*next);
            *next += 1;
            self.by_id.insert(id, key);
            id
        });
        id
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl ResourceResolver for ResourceTable {
    fn resolve(&self, reference: &str) -> Option<ResourceId> {
        let (kind, name) = split_reference(reference)?;
        // `@+id/x` declares an id inline
        let kind = kind.trim_start_matches('+');
        self.by_name
            .get(&(kind.to_string(), name.to_string()))
            .map(|id| *id)
    }

    fn entry_name(&self, id: ResourceId) -> Option<String> {
        self.by_id.get(&id).map(|entry| entry.1.clone())
    }
}
