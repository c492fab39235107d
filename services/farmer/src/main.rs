//! Time Farm fleet farmer
//!
//! Single binary that:
//! 1. Loads the account store and configuration
//! 2. Runs one farm loop per stored account until SIGINT/SIGTERM
//! 3. Registers, lists and removes accounts from the command line
//!
//! Platform authentication is delegated to an external helper program; the
//! mini-app backend is called directly over HTTP.

mod cli;
mod config;
mod metrics;

use anyhow::{Context, Result};
use clap::Parser;
use common::Secret;
use farm_fleet::{AccountStore, ApiFactory, Fleet, SystemClock};
use platform::{HelperClient, SessionRegistrar};
use std::sync::Arc;
use std::time::Duration;
use timefarm_api::{ApiClient, FarmApi};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::{Cli, Command};
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config_path = Config::resolve_path(cli.config.as_deref());
    info!(
        path = %config_path.path.display(),
        explicit = config_path.explicit,
        "loading configuration"
    );

    let config = Config::load_or_default(&config_path).with_context(|| {
        format!("failed to load config from {}", config_path.path.display())
    })?;

    let store = AccountStore::load(config.store.path.clone())
        .await
        .with_context(|| {
            format!(
                "failed to open account store {}",
                config.store.path.display()
            )
        })?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config, store).await,
        Command::AddAccount { phone, proxy } => add_account(&config, &store, phone, proxy).await,
        Command::ListAccounts => {
            list_accounts(&store).await;
            Ok(())
        }
        Command::RemoveAccount { id } => remove_account(&store, id).await,
    }
}

/// JSON output by default; `LOG_FORMAT=pretty` for a human-readable console.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let pretty = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("pretty"));

    if pretty {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    }
}

/// Farm every stored account until a shutdown signal.
async fn run(config: Config, store: AccountStore) -> Result<()> {
    info!(
        api_url = %config.api.base_url,
        accounts = store.len().await,
        retry_backoff_secs = config.farm.retry_backoff_secs,
        reinit_after_failures = config.farm.reinit_after_failures,
        "starting timefarm-farmer"
    );

    let shutdown = CancellationToken::new();

    let metrics_task = match config.metrics.listen_addr {
        Some(addr) => {
            let handle = metrics::install_recorder()?;
            Some(metrics::serve(addr, handle, shutdown.clone()).await?)
        }
        None => None,
    };

    let web_view = Arc::new(HelperClient::new(config.platform.helper_config()));
    let fleet = Fleet::from_store(
        &store,
        web_view,
        api_factory(&config),
        Arc::new(SystemClock),
        config.farm.settings(),
    )
    .await;

    let mut fleet_task = tokio::spawn(fleet.run(shutdown.clone()));

    // The fleet can end on its own when every account is abandoned
    tokio::select! {
        _ = shutdown_signal() => {}
        joined = &mut fleet_task => {
            shutdown.cancel();
            log_fleet_result(joined);
            await_metrics(metrics_task).await;
            info!("shutdown complete");
            return Ok(());
        }
    }

    shutdown.cancel();

    let drain_timeout = config.farm.drain_timeout();
    match tokio::time::timeout(drain_timeout, fleet_task).await {
        Ok(joined) => log_fleet_result(joined),
        Err(_) => warn!(
            drain_timeout_secs = drain_timeout.as_secs(),
            "drain timeout exceeded, forcing shutdown"
        ),
    }
    await_metrics(metrics_task).await;

    info!("shutdown complete");
    Ok(())
}

/// One backend client per account, honouring its proxy.
fn api_factory(config: &Config) -> ApiFactory {
    let base_url = config.api.base_url.clone();
    let timeout = Duration::from_secs(config.api.timeout_secs);
    Arc::new(
        move |proxy: Option<&str>| -> timefarm_api::Result<Arc<dyn FarmApi>> {
            let client = ApiClient::new(&base_url, proxy, timeout)?;
            Ok(Arc::new(client) as Arc<dyn FarmApi>)
        },
    )
}

fn log_fleet_result(joined: std::result::Result<farm_fleet::FleetReport, tokio::task::JoinError>) {
    match joined {
        Ok(report) => info!(
            accounts = report.accounts,
            abandoned = report.abandoned,
            stopped = report.stopped,
            panicked = report.panicked,
            "fleet stopped"
        ),
        Err(e) => error!(error = %e, "fleet task panicked"),
    }
}

async fn await_metrics(task: Option<tokio::task::JoinHandle<()>>) {
    if let Some(task) = task {
        if let Err(e) = task.await {
            error!(error = %e, "metrics server task panicked");
        }
    }
}

/// Log in through the helper and store the resulting session.
async fn add_account(
    config: &Config,
    store: &AccountStore,
    phone_number: String,
    proxy: Option<String>,
) -> Result<()> {
    if let Some(p) = proxy.as_deref() {
        // Reject an unusable proxy now rather than at farm time
        let timeout = Duration::from_secs(config.api.timeout_secs);
        ApiClient::new(&config.api.base_url, Some(p), timeout)
            .with_context(|| format!("invalid proxy {}", redact_proxy(p)))?;
    }

    let helper = HelperClient::new(config.platform.helper_config());
    let session: Secret<String> = helper
        .register(&phone_number)
        .await
        .with_context(|| format!("login failed for {phone_number}"))?;

    let id = store
        .add(phone_number.clone(), &session, proxy)
        .await
        .context("failed to save account")?;

    info!(account_id = id, phone_number = %phone_number, "account added");
    println!("added account {id} ({phone_number})");
    Ok(())
}

async fn list_accounts(store: &AccountStore) {
    let accounts = store.list().await;
    if accounts.is_empty() {
        println!("no accounts registered");
        return;
    }
    for account in accounts {
        let proxy = account.proxy().map(redact_proxy).unwrap_or_else(|| "-".into());
        println!("{}\t{}\t{}", account.id, account.phone_number, proxy);
    }
}

async fn remove_account(store: &AccountStore, id: u64) -> Result<()> {
    match store.remove(id).await.context("failed to update account store")? {
        Some(account) => {
            info!(account_id = id, "account removed");
            println!("removed account {id} ({})", account.phone_number);
            Ok(())
        }
        None => anyhow::bail!("no account with id {id}"),
    }
}

/// Proxy URL with any password replaced, for display.
fn redact_proxy(proxy: &str) -> String {
    let Some((scheme, rest)) = proxy.split_once("://") else {
        return proxy.to_string();
    };
    match rest.rsplit_once('@') {
        Some((userinfo, host)) => {
            let user = userinfo.split(':').next().unwrap_or_default();
            format!("{scheme}://{user}:***@{host}")
        }
        None => proxy.to_string(),
    }
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
