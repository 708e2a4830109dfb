//! kport import: turn an operator-supplied import ID into the full imported state of one
//! cluster object.
//!
//! Stages run in order and the first failure aborts the import:
//! parse ID, resolve type, fetch object and schema, strip server fields, convert, backfill
//! pending markers, assemble. Nothing is written to the cluster.

#![forbid(unsafe_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use kport_core::parse_import_id;
use kport_kubehub::{get_kube_client, KubeObjectStore, KubeTypeRegistry, ObjectStore, TypeRegistry};
use kport_schema::{KubeSchemaRegistry, SchemaCache, SchemaRegistry, SchemaResolver};
use metrics::{counter, histogram};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

mod config;
mod diagnostics;
mod error;
pub mod mock;
mod state;

pub use config::ImportConfig;
pub use diagnostics::{Diagnostic, ImportResponse, ImportedResource, Severity};
pub use error::ImportError;
pub use state::{assemble, pending_sentinel, ImportedState, PENDING_SENTINEL};

/// The only resource type name this importer serves.
pub const MANIFEST_TYPE_NAME: &str = "kubernetes_manifest";

/// A successful import: the state plus any non-fatal findings.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportOutcome {
    pub state: ImportedState,
    /// `state` in its wire encoding.
    pub encoded: serde_json::Value,
    pub warnings: Vec<Diagnostic>,
}

/// Runs imports against one cluster. Cheap to share; holds no per-import state.
pub struct Importer {
    types: Arc<dyn TypeRegistry>,
    objects: Arc<dyn ObjectStore>,
    schemas: SchemaResolver,
    config: ImportConfig,
}

impl Importer {
    pub fn new(
        types: Arc<dyn TypeRegistry>,
        objects: Arc<dyn ObjectStore>,
        schemas: Arc<dyn SchemaRegistry>,
        cache: SchemaCache,
        config: ImportConfig,
    ) -> Self {
        Self { types, objects, schemas: SchemaResolver::new(schemas, cache), config }
    }

    /// Importer for the current kube context.
    pub async fn connect(cache: SchemaCache, config: ImportConfig) -> Result<Self> {
        let client = get_kube_client().await?;
        Ok(Self::new(
            Arc::new(KubeTypeRegistry::new(client.clone())),
            Arc::new(KubeObjectStore::new(client.clone())),
            Arc::new(KubeSchemaRegistry::new(client)),
            cache,
            config,
        ))
    }

    pub fn schema_cache(&self) -> &SchemaCache { self.schemas.cache() }

    /// Import the object named by `id`.
    ///
    /// Canceling `cancel`, or exceeding the configured fetch timeout, while the cluster is
    /// being queried aborts with [`ImportError::Canceled`].
    pub async fn import(&self, id: &str, cancel: &CancellationToken) -> Result<ImportOutcome, ImportError> {
        let t0 = Instant::now();
        counter!("import_attempts", 1u64);
        let res = self.run(id, cancel).await;
        histogram!("import_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        match &res {
            Ok(out) => {
                counter!("import_ok", 1u64);
                info!(id = %id, warnings = out.warnings.len(), took_ms = %t0.elapsed().as_millis(), "import ok");
            }
            Err(e) => {
                counter!("import_err", 1u64, "stage" => e.stage());
                warn!(id = %id, stage = e.stage(), error = %e, took_ms = %t0.elapsed().as_millis(), "import failed");
            }
        }
        res
    }

    async fn run(&self, id: &str, cancel: &CancellationToken) -> Result<ImportOutcome, ImportError> {
        let deadline = self.config.fetch_timeout.map(|d| tokio::time::Instant::now() + d);

        let identity = parse_import_id(id)?;
        debug!(object = %identity, "import ID parsed");

        let (endpoint, namespaced) = guarded(cancel, deadline, kport_kubehub::resolve(self.types.as_ref(), &identity)).await?;
        let mut warnings = Vec::new();
        if let Some(detail) = kport_kubehub::scope_mismatch(&identity, namespaced) {
            warnings.push(Diagnostic { severity: Severity::Warning, summary: "Import ID does not match resource scope".into(), detail });
        }

        // The object read and the schema lookup are independent; a fetch failure still wins.
        let (raw, schema) = guarded(cancel, deadline, async {
            let (raw, schema) = futures::join!(
                kport_kubehub::fetch(self.objects.as_ref(), &endpoint, &identity, namespaced),
                self.schemas.schema_for(&identity),
            );
            Ok::<_, ImportError>((raw?, schema?))
        })
        .await?;

        let raw = kport_kubehub::strip_server_fields(raw);
        let typed = kport_convert::convert(&raw, &schema)?;
        let object = kport_convert::narrow_top_level(&schema, kport_convert::backfill(&schema, typed));
        let state = assemble(object);
        let encoded = state.to_json()?;
        debug!(object = %identity, pending = state.object.pending_paths().len(), "state assembled");
        Ok(ImportOutcome { state, encoded, warnings })
    }

    /// Entry point for callers that name the resource type: validates `type_name`, imports,
    /// and packages the result with diagnostics.
    pub async fn import_resource_state(&self, type_name: &str, id: &str, cancel: &CancellationToken) -> ImportResponse {
        if type_name != MANIFEST_TYPE_NAME {
            let e = ImportError::UnsupportedType(type_name.to_string());
            warn!(type_name = %type_name, "refusing import for unsupported type");
            return ImportResponse::failed(&e);
        }
        let out = match self.import(id, cancel).await {
            Ok(out) => out,
            Err(e) => return ImportResponse::failed(&e),
        };
        ImportResponse {
            diagnostics: out.warnings,
            imported: vec![ImportedResource { type_name: type_name.to_string(), state: out.encoded }],
        }
    }
}

/// Await `fut` unless the token fires or the deadline passes first.
async fn guarded<T, E, F>(cancel: &CancellationToken, deadline: Option<tokio::time::Instant>, fut: F) -> Result<T, ImportError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<ImportError>,
{
    let bounded = async {
        match deadline {
            Some(at) => tokio::time::timeout_at(at, fut)
                .await
                .map_err(|_| ImportError::Canceled { reason: "fetch timeout elapsed".into() }),
            None => Ok(fut.await),
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ImportError::Canceled { reason: "canceled by caller".into() }),
        res = bounded => res?.map_err(Into::into),
    }
}
