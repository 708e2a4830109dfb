use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kport_core::{parse_import_id, FieldSchema};
use kport_import::{ImportConfig, ImportError, ImportResponse, Importer, Severity, MANIFEST_TYPE_NAME};
use kport_schema::{KubeSchemaRegistry, SchemaCache, SchemaResolver};
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "kportctl", version, about = "Import live Kubernetes objects as typed state")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json, Yaml }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Import one object, e.g. "v1#Secret#default#default-token-qgm6s"
    Import {
        /// Import ID: <apiVersion>#<Kind>[#<namespace>]#<name>
        id: String,
        /// Resource type name the state is imported as
        #[arg(long = "type-name", default_value = MANIFEST_TYPE_NAME)]
        type_name: String,
        /// Abort if the cluster has not answered within this many seconds; 0 waits indefinitely
        #[arg(long = "timeout", env = "KPORT_FETCH_TIMEOUT_SECS")]
        timeout_secs: Option<u64>,
        /// Print the object as plain JSON, dropping pending markers
        #[arg(long = "flat", action = ArgAction::SetTrue)]
        flat: bool,
    },
    /// Parse an import ID without contacting the cluster
    Parse {
        id: String,
    },
    /// Show the schema the importer would use for an import ID
    Schema {
        id: String,
    },
}

fn init_tracing() {
    let env = std::env::var("KPORT_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("KPORT_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid KPORT_METRICS_ADDR; expected host:port");
        }
    }
}

fn emit<T: Serialize>(output: Output, value: &T) -> Result<()> {
    match output {
        Output::Json | Output::Human => println!("{}", serde_json::to_string_pretty(value)?),
        Output::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

fn print_schema(schema: &FieldSchema, name: &str, optional: bool, depth: usize) {
    let pad = "  ".repeat(depth);
    let mark = if optional { "?" } else { "" };
    match schema {
        FieldSchema::Scalar { kind } => println!("{}{}{}: {}", pad, name, mark, kind.as_str()),
        FieldSchema::Dynamic => println!("{}{}{}: any", pad, name, mark),
        FieldSchema::Object { attributes, optional: opt } => {
            println!("{}{}{}: object", pad, name, mark);
            for (k, v) in attributes {
                print_schema(v, k, opt.contains(k), depth + 1);
            }
        }
        FieldSchema::List { element } => print_schema(element, &format!("{}{}[]", name, mark), false, depth),
        FieldSchema::Set { element } => print_schema(element, &format!("{}{}{{}}", name, mark), false, depth),
        FieldSchema::Map { value } => print_schema(value, &format!("{}{}[*]", name, mark), false, depth),
    }
}

fn print_response_human(resp: &ImportResponse) -> Result<()> {
    for d in &resp.diagnostics {
        let level = match d.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        eprintln!("{}: {}: {}", level, d.summary, d.detail);
    }
    for r in &resp.imported {
        println!("# {}", r.type_name);
        println!("{}", serde_json::to_string_pretty(&r.state)?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    match cli.command {
        Commands::Parse { id } => match parse_import_id(&id) {
            Ok(identity) => match cli.output {
                Output::Human => {
                    println!("apiVersion: {}", identity.api_version());
                    println!("kind:       {}", identity.kind);
                    println!("namespace:  {}", identity.namespace.as_deref().unwrap_or("-"));
                    println!("name:       {}", identity.name);
                }
                out => emit(out, &identity)?,
            },
            Err(e) => {
                eprintln!("parse error: {}", e);
                anyhow::bail!(e);
            }
        },
        Commands::Schema { id } => {
            let identity = parse_import_id(&id)?;
            let client = kport_kubehub::get_kube_client().await?;
            let resolver = SchemaResolver::new(Arc::new(KubeSchemaRegistry::new(client)), SchemaCache::new());
            let t0 = Instant::now();
            match resolver.schema_for(&identity).await {
                Ok(schema) => {
                    info!(gvk = %identity.gvk(), took_ms = %t0.elapsed().as_millis(), "schema fetched");
                    match cli.output {
                        Output::Human => print_schema(&schema, &identity.kind, false, 0),
                        out => emit(out, schema.as_ref())?,
                    }
                }
                Err(e) => {
                    error!(error = %e, "schema lookup failed");
                    eprintln!("schema error: {}", e);
                    anyhow::bail!(e);
                }
            }
        }
        Commands::Import { id, type_name, timeout_secs, flat } => {
            let mut config = ImportConfig::from_env();
            if let Some(secs) = timeout_secs {
                config.fetch_timeout = (secs > 0).then(|| Duration::from_secs(secs));
            }
            info!(id = %id, type_name = %type_name, timeout = ?config.fetch_timeout, "import invoked");
            let importer = Importer::connect(SchemaCache::new(), config).await?;

            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received; canceling import");
                    on_signal.cancel();
                }
            });

            if flat {
                if type_name != MANIFEST_TYPE_NAME {
                    anyhow::bail!(ImportError::UnsupportedType(type_name));
                }
                match importer.import(&id, &cancel).await {
                    Ok(out) => {
                        for w in &out.warnings {
                            eprintln!("warning: {}: {}", w.summary, w.detail);
                        }
                        emit(cli.output, &kport_convert::flatten(&out.state.object))?;
                    }
                    Err(e) => {
                        eprintln!("error: {}: {}", e.summary(), e);
                        anyhow::bail!(e);
                    }
                }
                return Ok(());
            }

            let resp = importer.import_resource_state(&type_name, &id, &cancel).await;
            match cli.output {
                Output::Human => print_response_human(&resp)?,
                out => emit(out, &resp)?,
            }
            if resp.has_errors() {
                anyhow::bail!("import of {} failed", id);
            }
        }
    }
    Ok(())
}
