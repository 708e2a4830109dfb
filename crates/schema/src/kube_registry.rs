//! Schema registry backed by the API server: CRD `openAPIV3Schema` for custom kinds, the
//! `/openapi/v2` document for built-ins.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1 as apiextv1;
use kport_core::{FieldSchema, Gvk, SchemaError};
use kube::{api::ListParams, Api, Client};
use serde_json::Value as Json;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{openapi, SchemaRegistry};

pub struct KubeSchemaRegistry {
    client: Client,
    /// The v2 document is several MiB; fetch it once per registry.
    openapi_v2: OnceCell<Arc<Json>>,
}

impl KubeSchemaRegistry {
    pub fn new(client: Client) -> Self {
        Self { client, openapi_v2: OnceCell::new() }
    }

    /// `openAPIV3Schema` of the CRD serving `gvk`, if there is one.
    async fn crd_schema(&self, gvk: &Gvk) -> Result<Option<Json>> {
        let api: Api<apiextv1::CustomResourceDefinition> = Api::all(self.client.clone());
        let crds = api.list(&ListParams::default()).await.context("listing CustomResourceDefinitions")?;
        let Some(crd) = crds.into_iter().find(|crd| crd.spec.group == gvk.group && crd.spec.names.kind == gvk.kind) else {
            return Ok(None);
        };
        let Some(version) = crd.spec.versions.iter().find(|v| v.name == gvk.version) else {
            return Ok(None);
        };
        let schema = version
            .schema
            .as_ref()
            .and_then(|s| s.open_api_v3_schema.as_ref())
            .map(serde_json::to_value)
            .transpose()
            .context("serializing openAPIV3Schema")?;
        Ok(schema)
    }

    async fn openapi_v2(&self) -> Result<Arc<Json>> {
        let doc = self
            .openapi_v2
            .get_or_try_init(|| async {
                let req = http::Request::get("/openapi/v2").body(Vec::new()).context("building /openapi/v2 request")?;
                let text = self.client.request_text(req).await.context("fetching /openapi/v2")?;
                let doc: Json = serde_json::from_str(&text).context("parsing /openapi/v2")?;
                info!(bytes = text.len(), "openapi v2 document loaded");
                Ok::<_, anyhow::Error>(Arc::new(doc))
            })
            .await?;
        Ok(doc.clone())
    }

    async fn builtin_schema(&self, gvk: &Gvk) -> Result<Option<FieldSchema>> {
        let doc = self.openapi_v2().await?;
        let defs = doc.get("definitions").and_then(|d| d.as_object()).ok_or_else(|| anyhow!("/openapi/v2 has no definitions"))?;
        Ok(openapi::find_definition(defs, gvk).map(|root| openapi::resource_schema(root, Some(defs))))
    }
}

#[async_trait::async_trait]
impl SchemaRegistry for KubeSchemaRegistry {
    async fn schema_for(&self, gvk: &Gvk) -> Result<FieldSchema, SchemaError> {
        let unavailable = |e: anyhow::Error| SchemaError::Unavailable { cause: format!("{:#}", e) };
        if !gvk.group.is_empty() {
            if let Some(v3) = self.crd_schema(gvk).await.map_err(unavailable)? {
                debug!(gvk = %gvk, "schema from CRD");
                // metadata comes from the cluster's ObjectMeta when the v2 document is reachable
                let doc = match self.openapi_v2().await {
                    Ok(doc) => Some(doc),
                    Err(e) => {
                        warn!(gvk = %gvk, error = %format!("{:#}", e), "openapi v2 unavailable; using built-in ObjectMeta");
                        None
                    }
                };
                let defs = doc.as_deref().and_then(|d| d.get("definitions")).and_then(|d| d.as_object());
                return Ok(openapi::crd_resource_schema(&v3, defs));
            }
        }
        match self.builtin_schema(gvk).await.map_err(unavailable)? {
            Some(schema) => {
                debug!(gvk = %gvk, "schema from openapi v2");
                Ok(schema)
            }
            None => Err(SchemaError::NotFound { gvk: gvk.key() }),
        }
    }
}
