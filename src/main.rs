//! skycast - current weather by city, resilient to flaky networks
//!
//! Resolves each requested city through the cache-fallback repository and
//! prints the result. Exits with 0 only when every city resolved.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use tracing::{debug, warn};

use skycast::cache::{CacheStore, FileStore};
use skycast::cli::{Cli, RunOptions};
use skycast::config::{Config, API_KEY_ENV};
use skycast::connectivity::{ConnectivityProbe, RouteProbe, StaticProbe};
use skycast::data::CurrentWeather;
use skycast::logging::initialize_logging;
use skycast::output::{render_history, render_outcomes, CityOutcome, OutputFormat};
use skycast::repository::ResilientRepository;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Machine-readable output keeps stderr quiet unless -v was given
    if let Err(e) = initialize_logging(cli.verbose, cli.quiet || cli.json) {
        eprintln!("Warning: logging unavailable: {e}");
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every requested city resolved
async fn run(cli: &Cli) -> Result<bool> {
    let options = RunOptions::from_cli(cli)?;

    let mut config =
        Config::load(options.config_path.as_deref()).context("failed to load configuration")?;
    if let Some(units) = &options.units {
        config.api.units = units.clone();
    }
    if config.api.api_key.is_none() && !options.cities.is_empty() {
        warn!("no API key configured; set {API_KEY_ENV} or api.api_key");
    }

    let mut settings = config.repository_settings();
    if let Some(policy) = options.policy {
        settings.policy = policy;
    }

    let probe: Arc<dyn ConnectivityProbe> = if options.offline {
        Arc::new(StaticProbe::offline())
    } else {
        Arc::new(RouteProbe::new(config.connectivity.probe_addr))
    };
    let repo = ResilientRepository::new(
        CurrentWeather,
        build_cache(&config, options.persist),
        config.fetch_client()?,
        probe,
        settings,
    );
    debug!(?repo, "repository ready");

    if options.clear_cache {
        repo.clear_cache().await.context("failed to clear cache")?;
        report(options.format, "Cache cleared");
    } else if options.clear_history {
        repo.clear_history().await.context("failed to clear history")?;
        report(options.format, "History cleared");
    }

    let outcomes = join_all(options.cities.iter().map(|city| {
        let repo = repo.clone();
        async move {
            CityOutcome {
                requested: city.clone(),
                result: repo.get(city).await,
            }
        }
    }))
    .await;

    if !outcomes.is_empty() {
        print!("{}", render_outcomes(&outcomes, &config.api.units, options.format)?);
    }
    if options.show_history {
        print!("{}", render_history(&repo.recent_history().await, options.format)?);
    }

    Ok(outcomes.iter().all(CityOutcome::is_ok))
}

fn build_cache(config: &Config, persist: bool) -> CacheStore {
    if !persist {
        return CacheStore::in_memory();
    }
    match config.cache_dir() {
        Some(dir) => {
            debug!(dir = %dir.display(), "using file cache");
            CacheStore::new(Arc::new(FileStore::with_dir(dir)))
        }
        None => {
            warn!("no cache directory available; caching in memory for this run");
            CacheStore::in_memory()
        }
    }
}

/// Prints a status line: stdout for text output, stderr for JSON
fn report(format: OutputFormat, message: &str) {
    match format {
        OutputFormat::Text => println!("{message}"),
        OutputFormat::Json => eprintln!("{message}"),
    }
}
