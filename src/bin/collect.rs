//! Record collector CLI.

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use record_collector::telemetry::init_tracing;
use record_collector::{Collector, CollectorConfig, HttpRemote, ParamBag, RequestContext, SchemaDocument};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "collect")]
#[command(about = "Collect paginated records from a remote API using declarative schemas", long_about = None)]
struct Cli {
    /// Emit JSON log lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Collect records for a schema and print them as JSON
    Run {
        /// Schema name
        schema: String,

        /// Schema document (YAML or JSON)
        #[arg(long)]
        schemas: String,

        /// Remote Call endpoint
        #[arg(long, env = "COLLECTOR_ENDPOINT")]
        endpoint: String,

        /// Parameter as key=value; the value is parsed as JSON, or taken as a string
        #[arg(long = "param", short = 'p')]
        params: Vec<String>,

        /// Ambient client configuration as a JSON object
        #[arg(long)]
        ambient: Option<String>,

        /// Collector configuration file (YAML or JSON)
        #[arg(long)]
        config: Option<String>,

        /// Deadline for the whole request, in seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Timeout for each remote call, in seconds
        #[arg(long, default_value = "60")]
        call_timeout_secs: u64,

        /// Pretty-print output
        #[arg(long)]
        pretty: bool,
    },

    /// List schemas in a document
    Schemas {
        /// Schema document (YAML or JSON)
        #[arg(long)]
        schemas: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    match cli.command {
        Commands::Run {
            schema,
            schemas,
            endpoint,
            params,
            ambient,
            config,
            deadline_secs,
            call_timeout_secs,
            pretty,
        } => {
            let registry = SchemaDocument::load(expand(&schemas)?)?.into_registry()?;

            let config = match config {
                Some(path) => CollectorConfig::load(expand(&path)?)?,
                None => CollectorConfig::from_env()?,
            };

            let remote = HttpRemote::with_timeout(endpoint, Duration::from_secs(call_timeout_secs))?;
            let collector = Collector::with_config(registry, Arc::new(remote), config);

            let mut ctx = RequestContext::new();
            if let Some(ambient) = ambient {
                let ambient: Value = serde_json::from_str(&ambient).context("--ambient must be a JSON object")?;
                if !ambient.is_object() {
                    return Err(anyhow!("--ambient must be a JSON object"));
                }
                ctx = ctx.with_ambient(ambient);
            }
            if let Some(secs) = deadline_secs {
                ctx = ctx.with_timeout(Duration::from_secs(secs));
            }

            let records = collector
                .lookup_records_with(&schema, parse_params(&params)?, ctx)
                .await?;

            let output = if pretty {
                serde_json::to_string_pretty(&records)?
            } else {
                serde_json::to_string(&records)?
            };
            println!("{}", output);
        }

        Commands::Schemas { schemas } => {
            let registry = SchemaDocument::load(expand(&schemas)?)?.into_registry()?;
            for name in registry.names() {
                let schema = registry.get(&name)?;
                let required: Vec<&str> = schema.required_params.iter().map(|(p, _)| p.as_str()).collect();
                println!("{}\t{}\t[{}]", name, schema.api_method, required.join(", "));
            }
        }
    }

    Ok(())
}

fn expand(path: &str) -> anyhow::Result<PathBuf> {
    let expanded = shellexpand::full(path).with_context(|| format!("Cannot expand path {}", path))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

fn parse_params(raw: &[String]) -> anyhow::Result<ParamBag> {
    let mut params = ParamBag::new();
    for pair in raw {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("Parameter {:?} is not key=value", pair))?;
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
        params.insert(key.to_string(), value);
    }
    Ok(params)
}
