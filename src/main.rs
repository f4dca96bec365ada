//! Capstan - event-delivery adapter binary
//!
//! Reads approval events as JSON lines from stdin, feeds them through the
//! deployment controller, and prints one outcome report per processed
//! event as a JSON line on stdout. Runs against the in-memory platform
//! simulator, making it a rehearsal harness for the deployment flow;
//! production deployments embed the library and wire real platform
//! clients into [`Controller`].

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use capstan::config::DeployConfig;
use capstan::controller::Controller;
use capstan::endpoint::ModelRegistry;
use capstan::event::ApprovalEvent;
use capstan::simulator::{InMemoryRegistry, SimulatedEndpointService};

/// Capstan - promote approved ML models to a live inference endpoint
#[derive(Parser, Debug)]
#[command(name = "capstan", version, about, long_about = None)]
struct Cli {
    /// Path to a YAML deployment config file
    #[arg(short = 'f', long = "config")]
    config_file: Option<PathBuf>,

    /// Logical endpoint name (overrides the config file)
    #[arg(long, env = "CAPSTAN_ENDPOINT_NAME")]
    endpoint_name: Option<String>,

    /// Budget for endpoint deletion to converge, in milliseconds
    #[arg(long)]
    reclaim_timeout_ms: Option<u64>,

    /// Budget for a new endpoint to reach InService, in milliseconds
    #[arg(long)]
    provision_timeout_ms: Option<u64>,

    /// Interval between endpoint status polls, in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli).await?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid config: {e}"))?;

    tracing::info!(
        endpoint = %config.endpoint_name,
        "starting deployment controller (simulated platform)"
    );

    let service = Arc::new(SimulatedEndpointService::new());
    let registry = Arc::new(InMemoryRegistry::permissive());
    let controller = Controller::new(service, registry.clone(), config);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let mut event: ApprovalEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "discarding unparseable event line");
                continue;
            }
        };

        // A notification may name only the package group; pin the
        // deployment to the newest approved version in it.
        if event.model_package_arn.trim().is_empty() {
            if let Some(arn) = registry
                .latest_approved(&event.model_package_group_name)
                .await?
            {
                event.model_package_arn = arn;
            }
        }

        if let Some(outcome) = controller.handle(event).await {
            println!("{}", serde_json::to_string(&outcome)?);
        }
    }

    Ok(())
}

/// Build the effective config from file and flag overrides
async fn load_config(cli: &Cli) -> anyhow::Result<DeployConfig> {
    let mut config = match &cli.config_file {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| anyhow::anyhow!("failed to read config file {path:?}: {e}"))?;
            serde_yaml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("failed to parse config file {path:?}: {e}"))?
        }
        None => DeployConfig::default(),
    };

    if let Some(name) = &cli.endpoint_name {
        config.endpoint_name = name.clone();
    }
    if let Some(ms) = cli.reclaim_timeout_ms {
        config.reclaim_timeout_ms = ms;
    }
    if let Some(ms) = cli.provision_timeout_ms {
        config.provision_timeout_ms = ms;
    }
    if let Some(ms) = cli.poll_interval_ms {
        config.poll_interval_ms = ms;
    }

    Ok(config)
}
