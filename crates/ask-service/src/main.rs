use std::sync::Arc;

use anyhow::{anyhow, Result};
use ask_core::{CredentialStore, MegaClient, SessionBootstrapper};
use ask_service::config::{RunArgs, SessionArgs};
use ask_service::context::AppContext;
use ask_service::gateway::GatewayClient;
use ask_service::http;
use ask_service::supervisor::{run_supervisor, SupervisorExit};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "ASK XMD WhatsApp bot service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Restore the session, connect the gateway and serve HTTP
    Run(RunArgs),
    /// Only restore or download the session credentials
    FetchSession(SessionArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_command(args).await,
        Commands::FetchSession(args) => fetch_session_command(args).await,
    }
}

fn bootstrapper(args: &SessionArgs) -> Result<SessionBootstrapper> {
    let remote = MegaClient::new(args.mega_api_url.clone(), args.download_timeout())
        .map_err(|e| anyhow!("storage client: {e}"))?;
    Ok(SessionBootstrapper::new(
        CredentialStore::new(&args.session_dir),
        Arc::new(remote),
        args.session_id.clone(),
    )
    .with_storage_host(args.mega_host.clone()))
}

async fn fetch_session_command(args: SessionArgs) -> Result<()> {
    let outcome = bootstrapper(&args)?.initialize().await;
    println!("{}", serde_json::to_string(&outcome)?);
    if !outcome.is_authenticated() {
        return Err(anyhow!("no session available"));
    }
    Ok(())
}

async fn run_command(args: RunArgs) -> Result<()> {
    let boot = bootstrapper(&args.session)?;
    let outcome = boot.initialize().await;

    let (client, events) = GatewayClient::new(args.gateway())?;
    let ctx = AppContext::new(
        args.bot_settings(),
        boot.store().clone(),
        Arc::new(client),
        events,
        outcome,
    );

    let listener = TcpListener::bind(("0.0.0.0", args.port)).await?;
    let server_task = {
        let ctx = ctx.clone();
        tokio::spawn(async move { http::serve(listener, ctx).await })
    };
    let mut supervisor_task = tokio::spawn(run_supervisor(ctx.clone(), args.reconnect_policy()));

    info!(mode = %ctx.settings.mode, prefix = %ctx.settings.prefix, "service started");
    let result = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("service stopping");
            supervisor_task.abort();
            Ok(())
        }
        exit = &mut supervisor_task => match exit? {
            SupervisorExit::LoggedOut => {
                info!("session logged out; remove the session directory and pair again");
                Ok(())
            }
            SupervisorExit::Exhausted { attempts } => {
                error!(attempts, "giving up on gateway connection");
                Err(anyhow!("gateway unreachable after {attempts} reconnect attempts"))
            }
        },
    };
    server_task.abort();
    result
}
