use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use cmdrelay_core::Database;
use cmdrelay_core::eventbus::EventBus;
use cmdrelay_core::platforms::LiveAdapterFactory;
use cmdrelay_core::repositories::{
    CommandRepository, ConfigRepository, InMemoryCommandRepository, InMemoryConfigRepository,
    PostgresCommandRepository, PostgresConfigRepository,
};
use cmdrelay_core::services::{CommandService, ConfigService, RelayCoordinator};
use cmdrelay_core::telemetry::TracingTelemetry;

mod admin;
mod settings;

#[derive(Parser, Debug, Clone)]
#[command(name = "cmdrelay")]
#[command(author, version, about = "cmdrelay - relays enabled chat commands from YouTube and Discord into Twitch chat")]
struct Args {
    /// Postgres connection URL. Without it the relay keeps its state in memory.
    #[arg(long)]
    database_url: Option<String>,

    /// Address the admin JSON API binds to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    admin_addr: SocketAddr,

    /// Don't start the admin API.
    #[arg(long, default_value = "false")]
    no_admin: bool,
}

fn init_tracing() {
    let filter = EnvFilter::from_default_env()
        .add_directive("cmdrelay=info".parse().unwrap_or_default());
    let sub = fmt().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(sub) {
        eprintln!("Failed to set global subscriber: {}", e);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is normal; real deployments set the environment directly.
    let _ = dotenv::dotenv();
    init_tracing();
    let args = Args::parse();
    info!(
        "cmdrelay starting. store={}, admin={}",
        if args.database_url.is_some() { "postgres" } else { "memory" },
        if args.no_admin { "off".to_string() } else { args.admin_addr.to_string() }
    );

    if let Err(e) = run_server(args).await {
        error!("Server error: {:?}", e);
        return Err(e);
    }
    info!("Main finished. Goodbye!");
    Ok(())
}

async fn run_server(args: Args) -> anyhow::Result<()> {
    // 1) Stores
    let (config_repo, command_repo): (Arc<dyn ConfigRepository>, Arc<dyn CommandRepository>) =
        match args.database_url.as_deref() {
            Some(url) => {
                let db = Database::new(url).await?;
                db.migrate().await?;
                (
                    Arc::new(PostgresConfigRepository::new(db.pool().clone())),
                    Arc::new(PostgresCommandRepository::new(db.pool().clone())),
                )
            }
            None => {
                warn!("No --database-url given; config and commands live in memory only.");
                (
                    Arc::new(InMemoryConfigRepository::new()),
                    Arc::new(InMemoryCommandRepository::new()),
                )
            }
        };

    // 2) Event bus & relay
    let event_bus = Arc::new(EventBus::new());
    let coordinator = Arc::new(RelayCoordinator::new(
        config_repo.clone(),
        command_repo.clone(),
        event_bus.clone(),
        Arc::new(TracingTelemetry),
        Arc::new(LiveAdapterFactory),
        settings::from_env(),
    ));
    coordinator.start().await?;

    let relay = coordinator.clone();
    let relay_handle = tokio::spawn(async move { relay.run().await });

    // 3) Admin API
    let admin_handle = if args.no_admin {
        None
    } else {
        let state = admin::AdminState {
            config_service: Arc::new(ConfigService::new(config_repo, event_bus.clone())),
            command_service: Arc::new(CommandService::new(command_repo)),
        };
        let addr = args.admin_addr;
        let shutdown_rx = event_bus.shutdown_signal();
        Some(tokio::spawn(async move {
            if let Err(e) = admin::serve(addr, state, shutdown_rx).await {
                error!("Admin API error: {:?}", e);
            }
        }))
    };

    // 4) Ctrl-C signals shutdown
    let eb_clone = event_bus.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {:?}", e);
            return;
        }
        info!("Ctrl-C detected; shutting down event bus...");
        eb_clone.shutdown();
    });

    // 5) Wait for the relay loop; it returns once shutdown is signaled.
    let relay_result = relay_handle.await;
    event_bus.shutdown();
    if let Some(handle) = admin_handle {
        let _ = handle.await;
    }
    relay_result??;
    Ok(())
}
