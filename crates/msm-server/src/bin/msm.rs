//! Thin `msm` CLI (§6.1): talks to a running `msmd` over its HTTP API. No
//! business logic lives here — every command is one `reqwest` call.

use clap::{Parser, Subcommand};
use msm_db::{DistributionKind, ManagedServer};
use msm_utils::response::ApiResponse;
use serde::Serialize;

#[derive(Parser)]
#[command(name = "msm", about = "control a msmd daemon")]
struct Cli {
    /// Base URL of the daemon, e.g. http://127.0.0.1:25500. Defaults to the
    /// currently registered instance.
    #[arg(long)]
    url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List managed servers.
    List,
    /// Create a new managed server.
    Create {
        name: String,
        #[arg(long, value_enum)]
        distribution: DistributionArg,
        #[arg(long)]
        version: String,
        #[arg(long)]
        tcp_port: i64,
        #[arg(long, default_value = "2G")]
        heap_size: String,
    },
    /// Start a server.
    Start { id: i64 },
    /// Stop a server.
    Stop { id: i64 },
    /// Restart a server.
    Restart { id: i64 },
    /// Print a server's current status.
    Status { id: i64 },
}

#[derive(Clone, clap::ValueEnum)]
enum DistributionArg {
    Vanilla,
    Paper,
    Purpur,
    Fabric,
    Forge,
}

impl From<DistributionArg> for DistributionKind {
    fn from(value: DistributionArg) -> Self {
        match value {
            DistributionArg::Vanilla => DistributionKind::Vanilla,
            DistributionArg::Paper => DistributionKind::Paper,
            DistributionArg::Purpur => DistributionKind::Purpur,
            DistributionArg::Fabric => DistributionKind::Fabric,
            DistributionArg::Forge => DistributionKind::Forge,
        }
    }
}

#[derive(Serialize)]
struct CreateServerBody {
    name: String,
    distribution: DistributionKind,
    version: String,
    tcp_port: i64,
    heap_size: String,
}

async fn base_url(explicit: Option<String>) -> anyhow::Result<String> {
    if let Some(url) = explicit {
        return Ok(url);
    }
    match msm_utils::instance::current().await {
        Some(info) => Ok(info.base_url()),
        None => anyhow::bail!("no msmd instance is registered; pass --url or start the daemon"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let url = base_url(cli.url).await?;
    let client = reqwest::Client::new();

    match cli.command {
        Command::List => {
            let body: ApiResponse<Vec<ManagedServer>> =
                client.get(format!("{url}/api/v1/servers")).send().await?.json().await?;
            print_result(body);
        }
        Command::Create { name, distribution, version, tcp_port, heap_size } => {
            let payload = CreateServerBody { name, distribution: distribution.into(), version, tcp_port, heap_size };
            let body: ApiResponse<ManagedServer> =
                client.post(format!("{url}/api/v1/servers")).json(&payload).send().await?.json().await?;
            print_result(body);
        }
        Command::Start { id } => {
            let body: ApiResponse<serde_json::Value> =
                client.post(format!("{url}/api/v1/servers/{id}/start")).send().await?.json().await?;
            print_result(body);
        }
        Command::Stop { id } => {
            let body: ApiResponse<serde_json::Value> =
                client.post(format!("{url}/api/v1/servers/{id}/stop")).send().await?.json().await?;
            print_result(body);
        }
        Command::Restart { id } => {
            let body: ApiResponse<serde_json::Value> =
                client.post(format!("{url}/api/v1/servers/{id}/restart")).send().await?.json().await?;
            print_result(body);
        }
        Command::Status { id } => {
            let body: ApiResponse<serde_json::Value> =
                client.get(format!("{url}/api/v1/servers/{id}/status")).send().await?.json().await?;
            print_result(body);
        }
    }

    Ok(())
}

fn print_result<T: std::fmt::Debug>(body: ApiResponse<T>) {
    match (body.data, body.error) {
        (Some(data), _) => println!("{data:#?}"),
        (None, Some(error)) => eprintln!("error: {error}"),
        (None, None) => println!("ok"),
    }
}
