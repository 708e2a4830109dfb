//! kport kubehub: resolve a resource type to its API endpoint and fetch live objects.
//!
//! The pipeline only talks to the cluster through [`TypeRegistry`] and [`ObjectStore`];
//! [`KubeTypeRegistry`] and [`KubeObjectStore`] are the kube-rs backed implementations.

#![forbid(unsafe_code)]

use std::sync::Mutex;

use anyhow::Result;
use kport_core::{FetchError, Gvk, ResolutionError, ResourceIdentity};
use kube::{
    api::Api,
    core::{ApiResource, DynamicObject},
    discovery::{Discovery, Scope},
    Client,
};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

mod filter;

pub use filter::{strip_server_fields, SERVER_METADATA_FIELDS};

static KUBE_CLIENT: OnceCell<Client> = OnceCell::const_new();

/// Shared client for the current kube context, created on first use.
pub async fn get_kube_client() -> Result<Client> {
    let client = KUBE_CLIENT.get_or_try_init(Client::try_default).await?;
    Ok(client.clone())
}

/// Where objects of one resource type live on the API server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub api_version: String,
    /// Plural resource name used in URLs, e.g. "secrets".
    pub plural: String,
}

impl From<&ApiResource> for EndpointDescriptor {
    fn from(ar: &ApiResource) -> Self {
        Self {
            group: ar.group.clone(),
            version: ar.version.clone(),
            kind: ar.kind.clone(),
            api_version: ar.api_version.clone(),
            plural: ar.plural.clone(),
        }
    }
}

impl EndpointDescriptor {
    pub fn api_resource(&self) -> ApiResource {
        ApiResource {
            group: self.group.clone(),
            version: self.version.clone(),
            api_version: self.api_version.clone(),
            kind: self.kind.clone(),
            plural: self.plural.clone(),
        }
    }
}

/// Mapping from resource types to endpoints and scope.
#[async_trait::async_trait]
pub trait TypeRegistry: Send + Sync {
    async fn lookup_endpoint(&self, gvk: &Gvk) -> Result<EndpointDescriptor, ResolutionError>;
    async fn is_namespace_scoped(&self, gvk: &Gvk) -> Result<bool, ResolutionError>;
}

/// Read access to live objects.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, endpoint: &EndpointDescriptor, namespace: Option<&str>, name: &str) -> Result<serde_json::Value, FetchError>;
}

/// Resolve the identity's type to an endpoint and its scope.
///
/// A scope mismatch (namespaced type without a namespace in the ID, or the other way around)
/// does not fail resolution; callers report it through [`scope_mismatch`].
pub async fn resolve(registry: &dyn TypeRegistry, identity: &ResourceIdentity) -> Result<(EndpointDescriptor, bool), ResolutionError> {
    let gvk = identity.gvk();
    let endpoint = registry.lookup_endpoint(&gvk).await?;
    let namespaced = registry.is_namespace_scoped(&gvk).await?;
    debug!(gvk = %gvk, plural = %endpoint.plural, namespaced, "type resolved");
    Ok((endpoint, namespaced))
}

/// Describe a disagreement between the ID's namespace segment and the type's scope.
pub fn scope_mismatch(identity: &ResourceIdentity, namespaced: bool) -> Option<String> {
    match (namespaced, identity.namespace.as_deref()) {
        (true, None) => Some(format!("{} is namespaced but the import ID has no namespace segment", identity.kind)),
        (false, Some(ns)) => Some(format!("{} is cluster-scoped; namespace {:?} in the import ID is ignored", identity.kind, ns)),
        _ => None,
    }
}

/// Fetch the live object. Namespaced types are read as `(namespace, name)`, others by name only.
pub async fn fetch(
    store: &dyn ObjectStore,
    endpoint: &EndpointDescriptor,
    identity: &ResourceIdentity,
    namespaced: bool,
) -> Result<serde_json::Value, FetchError> {
    let namespace = if namespaced { identity.namespace.as_deref() } else { None };
    let obj = store.get(endpoint, namespace, &identity.name).await?;
    debug!(object = %identity, bytes = obj.to_string().len(), "live object fetched");
    Ok(obj)
}

// ----------------- kube-backed implementations -----------------

/// Type registry backed by API discovery, memoized per GVK for the registry's lifetime.
pub struct KubeTypeRegistry {
    client: Client,
    found: Mutex<FxHashMap<Gvk, (EndpointDescriptor, bool)>>,
}

impl KubeTypeRegistry {
    pub fn new(client: Client) -> Self {
        Self { client, found: Mutex::new(FxHashMap::default()) }
    }

    fn remembered(&self, gvk: &Gvk) -> Option<(EndpointDescriptor, bool)> {
        self.found.lock().unwrap_or_else(|e| e.into_inner()).get(gvk).cloned()
    }

    async fn find_api_resource(&self, gvk: &Gvk) -> Result<(EndpointDescriptor, bool), ResolutionError> {
        if let Some(hit) = self.remembered(gvk) {
            return Ok(hit);
        }
        let discovery = Discovery::new(self.client.clone())
            .filter(&[gvk.group.as_str()])
            .run()
            .await
            .map_err(|e| ResolutionError::Unreachable { cause: e.to_string() })?;
        for group in discovery.groups() {
            for (ar, caps) in group.recommended_resources() {
                if ar.group == gvk.group && ar.version == gvk.version && ar.kind == gvk.kind {
                    let found = (EndpointDescriptor::from(&ar), matches!(caps.scope, Scope::Namespaced));
                    self.found.lock().unwrap_or_else(|e| e.into_inner()).insert(gvk.clone(), found.clone());
                    return Ok(found);
                }
            }
            // Recommended resources only cover the preferred version; fall back to the rest.
            for version in group.versions() {
                if version != gvk.version {
                    continue;
                }
                for (ar, caps) in group.versioned_resources(version) {
                    if ar.kind == gvk.kind {
                        let found = (EndpointDescriptor::from(&ar), matches!(caps.scope, Scope::Namespaced));
                        self.found.lock().unwrap_or_else(|e| e.into_inner()).insert(gvk.clone(), found.clone());
                        return Ok(found);
                    }
                }
            }
        }
        Err(ResolutionError::UnknownType { gvk: gvk.key() })
    }
}

#[async_trait::async_trait]
impl TypeRegistry for KubeTypeRegistry {
    async fn lookup_endpoint(&self, gvk: &Gvk) -> Result<EndpointDescriptor, ResolutionError> {
        self.find_api_resource(gvk).await.map(|(ep, _)| ep)
    }

    async fn is_namespace_scoped(&self, gvk: &Gvk) -> Result<bool, ResolutionError> {
        self.find_api_resource(gvk).await.map(|(_, ns)| ns)
    }
}

/// Object store reading `DynamicObject`s through the API server.
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    pub fn new(client: Client) -> Self { Self { client } }
}

#[async_trait::async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get(&self, endpoint: &EndpointDescriptor, namespace: Option<&str>, name: &str) -> Result<serde_json::Value, FetchError> {
        let ar = endpoint.api_resource();
        let api: Api<DynamicObject> = match namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, &ar),
            None => Api::all_with(self.client.clone(), &ar),
        };
        let resource = match namespace {
            Some(ns) => format!("{} {}/{}", endpoint.kind, ns, name),
            None => format!("{} {}", endpoint.kind, name),
        };
        info!(api_version = %endpoint.api_version, plural = %endpoint.plural, ns = ?namespace, name = %name, "get live object");
        let obj = match api.get(name).await {
            Ok(o) => o,
            Err(kube::Error::Api(ae)) if ae.code == 404 => return Err(FetchError::NotFound { resource }),
            Err(e) => return Err(FetchError::Transport { resource, cause: e.to_string() }),
        };
        serde_json::to_value(&obj).map_err(|e| FetchError::Transport { resource, cause: format!("serializing DynamicObject: {}", e) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRegistry { namespaced: bool }

    #[async_trait::async_trait]
    impl TypeRegistry for FixedRegistry {
        async fn lookup_endpoint(&self, gvk: &Gvk) -> Result<EndpointDescriptor, ResolutionError> {
            if gvk.kind == "Unknown" {
                return Err(ResolutionError::UnknownType { gvk: gvk.key() });
            }
            Ok(EndpointDescriptor {
                group: gvk.group.clone(),
                version: gvk.version.clone(),
                kind: gvk.kind.clone(),
                api_version: gvk.api_version(),
                plural: format!("{}s", gvk.kind.to_lowercase()),
            })
        }
        async fn is_namespace_scoped(&self, _gvk: &Gvk) -> Result<bool, ResolutionError> { Ok(self.namespaced) }
    }

    #[derive(Default)]
    struct RecordingStore { calls: Mutex<Vec<(Option<String>, String)>>, hits: AtomicUsize }

    #[async_trait::async_trait]
    impl ObjectStore for RecordingStore {
        async fn get(&self, _ep: &EndpointDescriptor, namespace: Option<&str>, name: &str) -> Result<serde_json::Value, FetchError> {
            self.hits.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push((namespace.map(|s| s.to_string()), name.to_string()));
            Ok(serde_json::json!({ "metadata": { "name": name } }))
        }
    }

    #[tokio::test]
    async fn resolve_reports_unknown_type() {
        let id = kport_core::parse_import_id("v1#Unknown#x").unwrap();
        let err = resolve(&FixedRegistry { namespaced: false }, &id).await.unwrap_err();
        assert!(matches!(err, ResolutionError::UnknownType { .. }));
    }

    #[tokio::test]
    async fn scope_mismatch_does_not_abort_resolution() {
        let id = kport_core::parse_import_id("v1#Secret#orphan").unwrap();
        let (ep, namespaced) = resolve(&FixedRegistry { namespaced: true }, &id).await.unwrap();
        assert!(namespaced);
        assert_eq!(ep.plural, "secrets");
        assert!(scope_mismatch(&id, namespaced).unwrap().contains("no namespace"));
        assert!(scope_mismatch(&id, false).is_none());
        let with_ns = kport_core::parse_import_id("v1#Namespace#stray#kube-system").unwrap();
        assert!(scope_mismatch(&with_ns, false).unwrap().contains("\"stray\""));
    }

    #[tokio::test]
    async fn fetch_scopes_read_by_namespace_only_when_namespaced() {
        let store = RecordingStore::default();
        let reg = FixedRegistry { namespaced: true };
        let id = kport_core::parse_import_id("v1#Secret#default#tok").unwrap();
        let (ep, ns) = resolve(&reg, &id).await.unwrap();
        fetch(&store, &ep, &id, ns).await.unwrap();

        let cluster = kport_core::parse_import_id("rbac.authorization.k8s.io/v1#ClusterRole#extra-ns#admin").unwrap();
        fetch(&store, &ep, &cluster, false).await.unwrap();

        let calls = store.calls.lock().unwrap().clone();
        assert_eq!(calls, vec![(Some("default".to_string()), "tok".to_string()), (None, "admin".to_string())]);
        assert_eq!(store.hits.load(Ordering::SeqCst), 2);
    }
}
