use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

use coinwatch::apis::coingecko::CoinGeckoClient;
use coinwatch::apis::MarketDataSource;
use coinwatch::arguments;
use coinwatch::config::Config;
use coinwatch::governor::RateGovernor;
use coinwatch::logger::{self, LogTag};
use coinwatch::monitor;
use coinwatch::paths;
use coinwatch::tokens::{TokenStore, TokenTracker};

/// Main entry point for coinwatch
///
/// Wires the durable store, the shared governor, the CoinGecko client and
/// the tracker together, then runs the background sweep and (with the `web`
/// feature) the REST server until Ctrl-C.
#[tokio::main]
async fn main() {
    if arguments::is_help_requested() {
        arguments::print_help();
        return;
    }

    // Directories must exist before anything touches the data dir
    if let Err(e) = paths::ensure_all_directories() {
        eprintln!("Failed to create required directories: {}", e);
        std::process::exit(1);
    }

    let config_path = arguments::get_config_override()
        .map(std::path::PathBuf::from)
        .unwrap_or_else(paths::get_config_path);
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    logger::info(LogTag::System, "coinwatch starting up");
    logger::debug(
        LogTag::Config,
        &format!("Using configuration from {}", config_path.display()),
    );

    let store = match TokenStore::new(&paths::get_tokens_db_path()) {
        Ok(store) => store,
        Err(e) => {
            logger::error(LogTag::System, &format!("Failed to open token store: {}", e));
            std::process::exit(1);
        }
    };

    let governor = Arc::new(RateGovernor::new(&config.governor));
    let client = match CoinGeckoClient::new(&config.upstream, governor.clone()) {
        Ok(client) => client,
        Err(e) => {
            logger::error(LogTag::System, &format!("Failed to build API client: {}", e));
            std::process::exit(1);
        }
    };
    let source: Arc<dyn MarketDataSource> = Arc::new(client);

    let tracker = Arc::new(TokenTracker::new(
        store,
        source,
        governor,
        config.cache.staleness_seconds,
        config.upstream.market_page_size,
    ));

    let shutdown = Arc::new(Notify::new());
    {
        let shutdown = shutdown.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            shutdown.notify_waiters();
        }) {
            logger::warning(
                LogTag::System,
                &format!("Failed to install Ctrl-C handler: {}", e),
            );
        }
    }

    let mut monitor_handle = None;
    if config.monitor.enabled {
        let handle = tokio::spawn(monitor::monitor(
            tracker.clone(),
            Duration::from_secs(config.monitor.interval_seconds),
            shutdown.clone(),
        ));
        monitor_handle = Some(handle);
    }

    run_frontend(&config, tracker.clone(), shutdown.clone()).await;

    logger::info(LogTag::System, "Shutting down");
    if let Some(handle) = monitor_handle {
        let _ = handle.await;
    }
}

/// Serve the REST API until shutdown, or just idle when the web layer is
/// disabled or compiled out
#[cfg(feature = "web")]
async fn run_frontend(config: &Config, tracker: Arc<TokenTracker>, shutdown: Arc<Notify>) {
    if !config.web.enabled {
        shutdown.notified().await;
        return;
    }

    let port = arguments::get_port_override().unwrap_or(config.web.port);
    if let Err(e) = coinwatch::web::serve(tracker, &config.web.bind_address, port, shutdown).await {
        logger::error(LogTag::Web, &format!("Web server failed: {}", e));
    }
}

#[cfg(not(feature = "web"))]
async fn run_frontend(_config: &Config, _tracker: Arc<TokenTracker>, shutdown: Arc<Notify>) {
    shutdown.notified().await;
}
