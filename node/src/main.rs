use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use slskrr_search::{SearchCoordinator, SearchError};
use slskrr_slskd::SlskdClient;
use slskrr_token::encode as encode_token;
use slskrr_transfers::{TransferReconciler, TransferRegistry};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod health;
mod version;

use config::{AppConfig, FALLBACK_DOWNLOAD_DIR};
use health::{bind_listener, build_router, HealthState};
use version::{git_commit_hash, SLSKRR_VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("slskrr")
        .version(SLSKRR_VERSION)
        .about("Bridge between slskd and Usenet-style indexer/download clients")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .help("Override the log level")
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .value_parser(["pretty", "json"])
                .help("Select log output format")
                .global(true),
        )
        .arg(
            Arg::new("listen-addr")
                .long("listen-addr")
                .value_name("ADDR")
                .help("Override the health endpoint bind address")
                .global(true),
        )
        .subcommand(
            Command::new("serve")
                .about("Track downloads against slskd and serve the health endpoint"),
        )
        .subcommand(
            Command::new("search")
                .about("Run a single search and print the files found with their tokens")
                .arg(
                    Arg::new("query")
                        .value_name("QUERY")
                        .required(true)
                        .action(ArgAction::Append)
                        .help("Search text"),
                ),
        )
        .subcommand(
            Command::new("status").about("Check the /health endpoint of a running instance"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").map(Path::new);
    let mut config = AppConfig::load(config_path)?;
    apply_overrides(&matches, &mut config);
    config.validate()?;

    init_logging(&config)?;

    match matches.subcommand() {
        Some(("search", sub)) => {
            let query = sub
                .get_many::<String>("query")
                .map(|parts| parts.cloned().collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            run_search(&config, &query).await
        }
        Some(("status", _)) => check_status(&config).await,
        _ => serve(config).await,
    }
}

fn apply_overrides(matches: &clap::ArgMatches, config: &mut AppConfig) {
    if let Some(log_level) = matches.get_one::<String>("log-level") {
        config.log_level = log_level.clone();
    }

    if let Some(log_format) = matches.get_one::<String>("log-format") {
        config.log_format = log_format.clone();
    }

    if let Some(listen_addr) = matches.get_one::<String>("listen-addr") {
        config.listen_addr = listen_addr.clone();
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    info!(
        "Starting slskrr {} (commit {})",
        SLSKRR_VERSION,
        git_commit_hash()
    );
    if let Some(path) = &config.config_path {
        info!("Loaded configuration from {}", path.display());
    }

    let client = Arc::new(SlskdClient::new(&config.slskd_url, &config.slskd_api_key)?);
    let download_dir = resolve_download_dir(&config, &client).await;
    let registry = TransferRegistry::new();

    let shutdown = CancellationToken::new();
    let reconciler = TransferReconciler::new(client.clone(), registry.clone())
        .with_interval(config.sync_interval)
        .spawn(shutdown.child_token());

    let state = Arc::new(HealthState {
        registry,
        download_dir: download_dir.clone(),
        started_at: Instant::now(),
    });
    let listener = bind_listener(&config.listen_addr).await?;

    info!("slskd backend: {}", client.base_url());
    info!("Completed downloads directory: {}", download_dir);
    info!("Health endpoint: http://{}/health", config.listen_addr);

    let signal = shutdown.clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", err);
            }
            info!("Shutting down slskrr");
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Err(err) = reconciler.await {
        warn!("Transfer reconciler ended abnormally: {}", err);
    }

    info!("slskrr stopped");
    Ok(())
}

async fn resolve_download_dir(config: &AppConfig, client: &SlskdClient) -> String {
    if let Some(dir) = &config.download_dir {
        return dir.clone();
    }
    match client.download_dir().await {
        Ok(dir) => {
            info!("Using slskd download directory {}", dir);
            dir
        }
        Err(err) => {
            warn!(
                "Could not read download directory from slskd ({}), using {}",
                err, FALLBACK_DOWNLOAD_DIR
            );
            FALLBACK_DOWNLOAD_DIR.to_string()
        }
    }
}

async fn run_search(config: &AppConfig, query: &str) -> Result<()> {
    if query.trim().is_empty() {
        anyhow::bail!("search query must not be empty");
    }

    let client = Arc::new(SlskdClient::new(&config.slskd_url, &config.slskd_api_key)?);
    let coordinator = SearchCoordinator::new(client);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    info!(
        "Searching slskd for {:?} (timeout {:?})",
        query, config.search_timeout
    );
    let responses = match coordinator
        .search_and_wait(query, config.search_timeout, &cancel)
        .await
    {
        Ok(responses) => responses,
        Err(SearchError::Cancelled) => {
            warn!("Search interrupted");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    for response in &responses {
        for file in &response.files {
            println!(
                "{}\t{}\t{}\t{}",
                response.username,
                file.size,
                file.filename,
                encode_token(&response.username, &file.filename, file.size)
            );
        }
    }
    Ok(())
}

async fn check_status(config: &AppConfig) -> Result<()> {
    let addr = config.listen_addr.replacen("0.0.0.0", "127.0.0.1", 1);
    let url = format!("http://{addr}/health");
    let response = reqwest::Client::new().get(&url).send().await?;
    let status = response.status();
    let body = response.text().await?;
    println!("GET {url} -> {status}");
    println!("{body}");
    if status.is_success() {
        Ok(())
    } else {
        anyhow::bail!("Health check failed with status {status}")
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}
