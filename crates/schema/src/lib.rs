//! kport schema: resolve the [`FieldSchema`] for a resource type, with a process-wide cache.

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use kport_core::{FieldSchema, Gvk, ResourceIdentity, SchemaError};
use metrics::counter;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

mod kube_registry;
pub mod openapi;

pub use kube_registry::KubeSchemaRegistry;

/// Source of schemas, keyed by group/version/kind.
#[async_trait::async_trait]
pub trait SchemaRegistry: Send + Sync {
    async fn schema_for(&self, gvk: &Gvk) -> Result<FieldSchema, SchemaError>;
}

/// Schemas resolved so far in this process. Populated on miss, never evicted: a type's
/// schema does not change while the process runs.
///
/// Cloning yields another handle to the same cache. Lookups are lock-free; inserts copy the
/// map (misses are rare and the map stays small).
#[derive(Clone)]
pub struct SchemaCache {
    inner: Arc<ArcSwap<FxHashMap<Gvk, Arc<FieldSchema>>>>,
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self { inner: Arc::new(ArcSwap::from_pointee(FxHashMap::default())) }
    }
}

impl SchemaCache {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, gvk: &Gvk) -> Option<Arc<FieldSchema>> {
        self.inner.load().get(gvk).cloned()
    }

    /// Insert unless another import got there first; returns the schema that ended up cached.
    pub fn insert(&self, gvk: &Gvk, schema: Arc<FieldSchema>) -> Arc<FieldSchema> {
        self.inner.rcu(|cur| {
            let mut next: FxHashMap<Gvk, Arc<FieldSchema>> = (**cur).clone();
            next.entry(gvk.clone()).or_insert_with(|| schema.clone());
            next
        });
        self.get(gvk).unwrap_or(schema)
    }

    pub fn len(&self) -> usize { self.inner.load().len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

/// Looks schemas up in the cache first and asks the registry on a miss.
#[derive(Clone)]
pub struct SchemaResolver {
    registry: Arc<dyn SchemaRegistry>,
    cache: SchemaCache,
}

impl SchemaResolver {
    pub fn new(registry: Arc<dyn SchemaRegistry>, cache: SchemaCache) -> Self {
        Self { registry, cache }
    }

    pub fn cache(&self) -> &SchemaCache { &self.cache }

    pub async fn schema_for(&self, identity: &ResourceIdentity) -> Result<Arc<FieldSchema>, SchemaError> {
        let gvk = identity.gvk();
        if let Some(hit) = self.cache.get(&gvk) {
            counter!("schema_cache_hits", 1u64);
            debug!(gvk = %gvk, "schema cache hit");
            return Ok(hit);
        }
        counter!("schema_cache_misses", 1u64);
        let t0 = Instant::now();
        let schema = self.registry.schema_for(&gvk).await?;
        let cached = self.cache.insert(&gvk, Arc::new(schema));
        info!(gvk = %gvk, took_ms = %t0.elapsed().as_millis(), cached = self.cache.len(), "schema resolved");
        Ok(cached)
    }
}
