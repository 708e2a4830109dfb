//! In-memory cluster for tests: serves types, objects and schemas from maps.

use std::collections::HashMap;
use std::time::Duration;

use kport_core::{FetchError, FieldSchema, Gvk, ResolutionError, SchemaError};
use kport_kubehub::{EndpointDescriptor, ObjectStore, TypeRegistry};
use kport_schema::SchemaRegistry;

type ObjectKey = (Gvk, Option<String>, String);

#[derive(Default)]
pub struct MockCluster {
    pub types: HashMap<Gvk, (EndpointDescriptor, bool)>,
    pub objects: HashMap<ObjectKey, serde_json::Value>,
    pub schemas: HashMap<Gvk, FieldSchema>,
    /// Every registry call fails as if the API server were down.
    pub unreachable: bool,
    /// Object reads sleep this long first.
    pub get_delay: Option<Duration>,
}

impl MockCluster {
    pub fn new() -> Self { Self::default() }

    pub fn with_type(mut self, gvk: Gvk, plural: &str, namespaced: bool) -> Self {
        let ep = EndpointDescriptor {
            group: gvk.group.clone(),
            version: gvk.version.clone(),
            kind: gvk.kind.clone(),
            api_version: gvk.api_version(),
            plural: plural.to_string(),
        };
        self.types.insert(gvk, (ep, namespaced));
        self
    }

    pub fn with_object(mut self, gvk: Gvk, namespace: Option<&str>, name: &str, obj: serde_json::Value) -> Self {
        self.objects.insert((gvk, namespace.map(|s| s.to_string()), name.to_string()), obj);
        self
    }

    pub fn with_schema(mut self, gvk: Gvk, schema: FieldSchema) -> Self {
        self.schemas.insert(gvk, schema);
        self
    }

    fn down(&self) -> Option<String> {
        self.unreachable.then(|| "connection refused".to_string())
    }

    fn find_type(&self, gvk: &Gvk) -> Result<&(EndpointDescriptor, bool), ResolutionError> {
        if let Some(cause) = self.down() {
            return Err(ResolutionError::Unreachable { cause });
        }
        self.types.get(gvk).ok_or_else(|| ResolutionError::UnknownType { gvk: gvk.key() })
    }
}

#[async_trait::async_trait]
impl TypeRegistry for MockCluster {
    async fn lookup_endpoint(&self, gvk: &Gvk) -> Result<EndpointDescriptor, ResolutionError> {
        self.find_type(gvk).map(|(ep, _)| ep.clone())
    }

    async fn is_namespace_scoped(&self, gvk: &Gvk) -> Result<bool, ResolutionError> {
        self.find_type(gvk).map(|(_, ns)| *ns)
    }
}

#[async_trait::async_trait]
impl ObjectStore for MockCluster {
    async fn get(&self, endpoint: &EndpointDescriptor, namespace: Option<&str>, name: &str) -> Result<serde_json::Value, FetchError> {
        if let Some(delay) = self.get_delay {
            tokio::time::sleep(delay).await;
        }
        let resource = format!("{} {}", endpoint.kind, name);
        if let Some(cause) = self.down() {
            return Err(FetchError::Transport { resource, cause });
        }
        let gvk = Gvk::new(endpoint.group.clone(), endpoint.version.clone(), endpoint.kind.clone());
        self.objects
            .get(&(gvk, namespace.map(|s| s.to_string()), name.to_string()))
            .cloned()
            .ok_or(FetchError::NotFound { resource })
    }
}

#[async_trait::async_trait]
impl SchemaRegistry for MockCluster {
    async fn schema_for(&self, gvk: &Gvk) -> Result<FieldSchema, SchemaError> {
        if let Some(cause) = self.down() {
            return Err(SchemaError::Unavailable { cause });
        }
        self.schemas.get(gvk).cloned().ok_or_else(|| SchemaError::NotFound { gvk: gvk.key() })
    }
}
