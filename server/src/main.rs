//! Binary entry point: CLI parsing, config/DB wiring, and the `serve`/
//! `migrate` subcommands. Router construction itself lives in the library
//! crate (see `netly_server::router`) so it can be exercised in tests.

use std::path::PathBuf;
use std::net::SocketAddr;

use clap::{Parser, Subcommand};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use netly_server::AppState;

#[derive(Parser)]
#[command(name = "netly-server", version, about = "Netly control-plane server")]
struct Cli {
    /// Path to a config file (without extension); falls back to `netly.toml`
    /// if omitted. Overridden by `NETLY_`-prefixed environment variables.
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default if no subcommand is given).
    Serve {
        /// Path to the `netly-agent` binary to ship to nodes during bootstrap.
        #[arg(long, env = "NETLY_AGENT_BINARY", default_value = "netly-agent")]
        agent_binary: PathBuf,
    },
    /// Apply pending database migrations and exit.
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "netly_server=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = netly_core::Config::load(cli.config.as_deref())?;

    let db = netly_db::connect(
        &config.database.dsn,
        config.database.min_connections,
        config.database.max_connections,
    )
    .await?;

    match cli.command.unwrap_or(Command::Serve {
        agent_binary: PathBuf::from("netly-agent"),
    }) {
        Command::Migrate => {
            info!("applying pending migrations");
            netly_migration::Migrator::up(&db, None).await?;
            info!("migrations applied");
            Ok(())
        }
        Command::Serve { agent_binary } => serve(db, config, agent_binary).await,
    }
}

async fn serve(
    db: sea_orm::DatabaseConnection,
    config: netly_core::Config,
    agent_binary: PathBuf,
) -> anyhow::Result<()> {
    let agent_binary_bytes = std::fs::read(&agent_binary).unwrap_or_else(|e| {
        tracing::warn!(
            path = %agent_binary.display(),
            error = %e,
            "could not read agent binary; bootstrap uploads will fail until this is fixed"
        );
        Vec::new()
    });

    let host = config.server.host.clone();
    let port = config.server.port;
    let state = AppState::new(db, config, agent_binary_bytes)?;
    let app = netly_server::router(state);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!("netly control plane listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
