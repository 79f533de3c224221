//! Cashbook entitlement engine host.
//!
//! Composition root: loads layered configuration, wires the entitlement
//! services over the in-memory adapters, runs them under a cancellation
//! token, and tears everything down on shutdown signals.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use entitlements::domain::ports::{BillingClient, LifecycleSignal};
use entitlements::infra::{AppLifecycle, InMemoryRecordStore, StaticBillingClient};
use entitlements::{
    AdminOperations, ChangeListener, EntitlementCache, EntitlementsService, PeriodicValidator,
    RecordStore, StatusResolver,
};
use entitlements_sdk::{EntitlementsApi, Subject};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::AppConfig;

/// Cashbook Server - cashbook backend with a paywalled premium tier
#[derive(Parser)]
#[command(name = "cashbook-server")]
#[command(about = "Cashbook Server - cashbook backend with a paywalled premium tier")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Run,
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(ref path) = cli.config {
        if !path.is_file() {
            anyhow::bail!("config file does not exist: {}", path.display());
        }
    }

    let config = AppConfig::load(cli.config.as_deref())?;
    init_logging(&config, cli.verbose);

    if cli.print_config {
        println!("Effective configuration:\n{}", config.render()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_server(config).await,
        Commands::Check => {
            println!("Configuration is valid");
            println!("{}", config.render()?);
            Ok(())
        }
    }
}

fn init_logging(config: &AppConfig, verbose: u8) {
    let level = match verbose {
        0 => config.logging.level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_server(config: AppConfig) -> Result<()> {
    tracing::info!("Cashbook Server starting");

    let subject = Subject::new(&config.subject);

    // Leaf clients. The in-memory store doubles as the realtime feed;
    // production wiring swaps in the hosted document store and the real
    // billing provider here.
    let store = Arc::new(InMemoryRecordStore::new());
    let billing: Arc<dyn BillingClient> = Arc::new(StaticBillingClient::new(config.billing_active));
    let lifecycle = AppLifecycle::new();

    // Engine services, resolver outward.
    let record_store = Arc::new(RecordStore::new(store.clone()));
    let resolver = Arc::new(StatusResolver::new(
        record_store.clone(),
        billing.clone(),
        &config.entitlements,
    ));
    let cache = Arc::new(EntitlementCache::new(resolver, &config.entitlements));
    let validator = Arc::new(PeriodicValidator::new(
        record_store.clone(),
        billing,
        cache.clone(),
        &config.entitlements,
    ));
    let listener = Arc::new(ChangeListener::new(
        store.clone(),
        cache.clone(),
        &config.entitlements,
    ));
    let admin = AdminOperations::new(record_store, cache.clone());
    let service = EntitlementsService::new(cache, admin);

    validator.start(subject.clone());
    let lifecycle_task = validator.bind_lifecycle(lifecycle.subscribe());
    listener.start_listening(subject.clone()).await?;

    let status = service.get_subscription_status(&subject).await;
    tracing::info!(
        subject = %subject,
        is_premium = status.is_premium,
        state = %status.state,
        "entitlement engine ready"
    );

    let cancel = CancellationToken::new();
    spawn_shutdown_waiter(cancel.clone());
    cancel.cancelled().await;

    tracing::info!("shutting down");
    lifecycle_task.abort();
    listener.destroy().await;
    validator.stop().await;

    Ok(())
}

/// Resolve the shutdown future: SIGTERM where available, Ctrl+C everywhere.
fn spawn_shutdown_waiter(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            let mut sigterm = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(sigterm) => sigterm,
                Err(err) => {
                    tracing::warn!(error = %err, "SIGTERM handler unavailable; falling back to ctrl_c");
                    let _ = ctrl_c.await;
                    cancel.cancel();
                    return;
                }
            };

            tokio::select! {
                _ = ctrl_c => tracing::info!("shutdown: ctrl_c received"),
                _ = sigterm.recv() => tracing::info!("shutdown: SIGTERM received"),
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            tracing::info!("shutdown: ctrl_c received");
        }

        cancel.cancel();
    });
}
