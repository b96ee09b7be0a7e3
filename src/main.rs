use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use printwatch::application::config::AppConfig;
use printwatch::application::services::alerts::AlertService;
use printwatch::application::services::discovery::DiscoveryService;
use printwatch::application::services::dispatch::DispatchService;
use printwatch::application::services::evaluator::EvaluatorService;
use printwatch::application::services::ingest::IngestService;
use printwatch::application::services::poller::PollerService;
use printwatch::application::services::retention::CleanupService;
use printwatch::application::services::scheduler::Scheduler;
use printwatch::application::services::summary::SummaryService;
use printwatch::domain::ports::channel::NotificationChannel;
use printwatch::domain::value_objects::Channel;
use printwatch::infrastructure::channels::gateway::HttpGatewayChannel;
use printwatch::infrastructure::channels::system::SystemFeedChannel;
use printwatch::infrastructure::persistence::sqlite_store::SqliteStore;
use printwatch::infrastructure::snmp::client::UdpSnmpClient;
use printwatch::presentation::cli::app::{Cli, Commands};
use printwatch::presentation::cli::commands::alerts::{run_alerts, AlertAction};
use printwatch::presentation::cli::commands::daemon::run_daemon;
use printwatch::presentation::cli::commands::discover::run_discover;
use printwatch::presentation::cli::commands::poll::run_poll;
use printwatch::presentation::cli::commands::status::run_status;

fn print_banner() {
    println!("{}", "━".repeat(40).cyan());
    println!("{}", "  printwatch — Printer Fleet Monitor".bold().cyan());
    println!("{}", "━".repeat(40).cyan());
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_transports(config: &AppConfig) -> anyhow::Result<Vec<Arc<dyn NotificationChannel>>> {
    let mut transports: Vec<Arc<dyn NotificationChannel>> = vec![Arc::new(
        SystemFeedChannel::new(&config.notifications.system_feed_path),
    )];
    if let Some(url) = &config.notifications.email_gateway_url {
        transports.push(Arc::new(HttpGatewayChannel::new(Channel::Email, url)?));
    }
    if let Some(url) = &config.notifications.sms_gateway_url {
        transports.push(Arc::new(HttpGatewayChannel::new(Channel::Sms, url)?));
    }
    if let Some(url) = &config.notifications.webhook_url {
        transports.push(Arc::new(HttpGatewayChannel::new(Channel::Webhook, url)?));
    }
    Ok(transports)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    let config = if let Some(ref path) = cli.config {
        AppConfig::load_from(path)?
    } else {
        AppConfig::load()?
    };

    // Manual DI; main.rs is the only place that knows concrete types.
    let store = Arc::new(SqliteStore::new(&config.database.path)?);
    let protocol = Arc::new(UdpSnmpClient::new());

    let ingest = Arc::new(IngestService::new(
        store.clone(),
        store.clone(),
        store.clone(),
    ));
    let poller = PollerService::new(
        protocol.clone(),
        store.clone(),
        store.clone(),
        ingest,
        config.snmp.clone(),
    );
    let discovery = DiscoveryService::new(
        protocol,
        store.clone(),
        config.discovery.clone(),
        config.snmp.clone(),
    );
    let dispatcher = DispatchService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        build_transports(&config)?,
        config.notifications.max_attempts,
    );
    let alert_manager = AlertService::new(store.clone(), store.clone(), dispatcher.clone());
    let evaluator = EvaluatorService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        alert_manager.clone(),
    );
    let summary = SummaryService::new(store.clone(), store.clone(), store.clone());
    let cleanup = CleanupService::new(store.clone(), store.clone(), config.retention.days);

    match cli.command {
        None | Some(Commands::Daemon) => {
            print_banner();
            let scheduler = Scheduler::new(
                poller,
                config.discovery.enabled.then_some(discovery),
                evaluator,
                dispatcher,
                alert_manager,
                summary,
                cleanup,
                config.scheduler.clone(),
            );
            run_daemon(scheduler).await?;
        }
        Some(Commands::Poll) => {
            run_poll(&poller).await?;
        }
        Some(Commands::Discover) => {
            run_discover(&discovery, store.as_ref()).await?;
        }
        Some(Commands::Status { json }) => {
            run_status(store.as_ref(), store.as_ref(), store.as_ref(), json)?;
        }
        Some(Commands::Alerts {
            ack,
            resolve,
            close,
            notes,
            limit,
        }) => {
            let action = if let Some(id) = ack {
                AlertAction::Acknowledge(id)
            } else if let Some(id) = resolve {
                AlertAction::Resolve(id, notes.as_deref())
            } else if let Some(id) = close {
                AlertAction::Close(id)
            } else {
                AlertAction::List { limit }
            };
            run_alerts(&alert_manager, store.as_ref(), action)?;
        }
    }

    Ok(())
}
