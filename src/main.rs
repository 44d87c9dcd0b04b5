//! SQL workbench backend.
//!
//! Serves query execution, schema introspection and saved SQL files over
//! HTTP for a browser UI. One MySQL server is targeted per process; every
//! request opens its own short-lived connection.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use sqldeck::http;
use sqldeck::models::ConnectionProfile;
use sqldeck::state::AppState;

const DEFAULT_PORT: u16 = 5270;

/// Command line arguments.
#[derive(Parser, Debug)]
#[command(name = "sqldeck")]
#[command(about = "SQL workbench backend for MySQL")]
struct Args {
    /// Bind address for the HTTP server.
    #[arg(long, default_value = "127.0.0.1", env = "SQLDECK_BIND")]
    bind: String,

    /// HTTP port to listen on.
    #[arg(long, default_value_t = DEFAULT_PORT, env = "SQLDECK_PORT")]
    port: u16,

    /// MySQL server host.
    #[arg(long, default_value = "127.0.0.1", env = "SQLDECK_DB_HOST")]
    db_host: String,

    /// MySQL server port.
    #[arg(long, default_value_t = 3306, env = "SQLDECK_DB_PORT")]
    db_port: u16,

    /// MySQL user.
    #[arg(long, default_value = "root", env = "SQLDECK_DB_USER")]
    db_user: String,

    /// MySQL password; omit for password-less local servers.
    #[arg(long, env = "SQLDECK_DB_PASSWORD")]
    db_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sqldeck=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let profile = ConnectionProfile {
        host: args.db_host,
        port: args.db_port,
        user: args.db_user,
        password: args.db_password,
    };

    info!(
        db_host = %profile.host,
        db_port = profile.port,
        db_user = %profile.user,
        "starting sqldeck"
    );

    let state = AppState::new(profile);
    let app = http::build_router(state);

    let addr: SocketAddr = format!("{}:{}", args.bind, args.port)
        .parse()
        .context("invalid bind address")?;

    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
