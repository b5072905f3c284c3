use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;
use protocol::RuntimeTuning;

/// Broker startup flags (SPEC_FULL.md §13). Everything reachable here
/// exists only to seed the runtime-tuning record before the first client
/// connects; once running, tuning only changes via `framework.setConfig`
/// (spec.md §9).
#[derive(Debug, Parser)]
#[command(name = "human-browser-broker", version, about = "Local WebSocket relay between automation clients and the browser extension")]
struct Cli {
    /// Port to listen on. The broker is always bound to loopback (spec.md
    /// §1: no authenticated/multi-tenant surface).
    #[arg(long, default_value_t = protocol::DEFAULT_PORT)]
    port: u16,

    /// Inline JSON object merged onto the default runtime tuning at
    /// startup, e.g. `--tuning-json '{"click":{"maxShiftPx":20}}'`.
    #[arg(long, conflicts_with = "tuning_file")]
    tuning_json: Option<String>,

    /// Path to a JSON file with the same shape as `--tuning-json`. Reading
    /// a path the operator names explicitly is not the priority-search
    /// file-based configuration loading spec.md §1 places out of scope.
    #[arg(long)]
    tuning_file: Option<PathBuf>,
}

fn load_tuning(cli: &Cli) -> anyhow::Result<RuntimeTuning> {
    let default = RuntimeTuning::default();
    if let Some(json) = &cli.tuning_json {
        let value: serde_json::Value = serde_json::from_str(json)?;
        return Ok(default.merge(&value));
    }
    if let Some(path) = &cli.tuning_file {
        let contents = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&contents)?;
        return Ok(default.merge(&value));
    }
    Ok(default)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let tuning = load_tuning(&cli)?;
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), cli.port);

    let shutdown = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    };

    broker::server::run(addr, tuning, shutdown)
        .await
        .map_err(anyhow::Error::from)
}
