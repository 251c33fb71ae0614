//! Command-line interface parsing for skycast
//!
//! This module handles parsing of CLI arguments using clap and turns them into
//! a validated `RunOptions` for the binary.

use clap::Parser;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::SUPPORTED_UNITS;
use crate::output::OutputFormat;
use crate::repository::FetchPolicy;

/// Error types for CLI argument parsing
#[derive(Debug, Error)]
pub enum CliError {
    /// The specified fetch policy is not recognized
    #[error("Invalid policy: '{0}'. Valid policies: network-first, cache-first")]
    InvalidPolicy(String),

    /// The specified unit system is not recognized
    #[error("Invalid units: '{0}'. Valid units: metric, imperial, standard")]
    InvalidUnits(String),
}

/// Skycast - current weather that keeps working offline
#[derive(Parser, Debug)]
#[command(name = "skycast")]
#[command(about = "Current weather by city, served from cache when the network is not")]
#[command(version)]
pub struct Cli {
    /// Cities to look up
    ///
    /// Examples:
    ///   skycast Paris
    ///   skycast Paris "New York" --json
    ///   skycast --offline Paris      # cache only
    #[arg(value_name = "CITY")]
    pub cities: Vec<String>,

    /// Pretend the network is down and answer from cache only
    #[arg(long)]
    pub offline: bool,

    /// Fetch policy: network-first or cache-first
    #[arg(long, value_name = "POLICY")]
    pub policy: Option<String>,

    /// Unit system: metric, imperial or standard
    #[arg(long, value_name = "UNITS")]
    pub units: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Show recently requested cities
    #[arg(long)]
    pub history: bool,

    /// Clear the recent-cities list
    #[arg(long)]
    pub clear_history: bool,

    /// Remove every cached entry, history included
    #[arg(long)]
    pub clear_cache: bool,

    /// Keep the cache in memory for this run only
    #[arg(long)]
    pub no_persist: bool,

    /// Path to a config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Errors only
    #[arg(short, long)]
    pub quiet: bool,
}

/// Options derived from CLI arguments for a run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    pub cities: Vec<String>,
    pub offline: bool,
    /// Overrides the configured policy
    pub policy: Option<FetchPolicy>,
    /// Overrides the configured unit system
    pub units: Option<String>,
    pub format: OutputFormat,
    pub show_history: bool,
    pub clear_history: bool,
    pub clear_cache: bool,
    pub persist: bool,
    pub config_path: Option<PathBuf>,
}

/// Parses a fetch policy argument.
///
/// # Returns
/// * `Ok(FetchPolicy)` if the string names a policy
/// * `Err(CliError::InvalidPolicy)` otherwise
pub fn parse_policy_arg(s: &str) -> Result<FetchPolicy, CliError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "network-first" | "network" => Ok(FetchPolicy::NetworkFirst),
        "cache-first" | "cache" => Ok(FetchPolicy::CacheFirst),
        _ => Err(CliError::InvalidPolicy(s.to_string())),
    }
}

/// Parses a unit system argument.
pub fn parse_units_arg(s: &str) -> Result<String, CliError> {
    let units = s.trim().to_ascii_lowercase();
    if SUPPORTED_UNITS.contains(&units.as_str()) {
        Ok(units)
    } else {
        Err(CliError::InvalidUnits(s.to_string()))
    }
}

impl RunOptions {
    /// Creates RunOptions from parsed CLI arguments.
    ///
    /// With no cities and no maintenance flag the run shows history.
    pub fn from_cli(cli: &Cli) -> Result<Self, CliError> {
        let policy = cli.policy.as_deref().map(parse_policy_arg).transpose()?;
        let units = cli.units.as_deref().map(parse_units_arg).transpose()?;
        let cities: Vec<String> = cli
            .cities
            .iter()
            .map(|city| city.trim().to_string())
            .filter(|city| !city.is_empty())
            .collect();
        let show_history =
            cli.history || (cities.is_empty() && !cli.clear_history && !cli.clear_cache);

        Ok(RunOptions {
            cities,
            offline: cli.offline,
            policy,
            units,
            format: if cli.json {
                OutputFormat::Json
            } else {
                OutputFormat::Text
            },
            show_history,
            clear_history: cli.clear_history,
            clear_cache: cli.clear_cache,
            persist: !cli.no_persist,
            config_path: cli.config.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_policy_arg_aliases() {
        assert_eq!(parse_policy_arg("network-first").unwrap(), FetchPolicy::NetworkFirst);
        assert_eq!(parse_policy_arg("network").unwrap(), FetchPolicy::NetworkFirst);
        assert_eq!(parse_policy_arg("Cache-First").unwrap(), FetchPolicy::CacheFirst);
        assert_eq!(parse_policy_arg("cache").unwrap(), FetchPolicy::CacheFirst);
    }

    #[test]
    fn test_parse_policy_arg_invalid() {
        let err = parse_policy_arg("sometimes").unwrap_err();
        assert!(err.to_string().contains("Invalid policy"));
        assert!(err.to_string().contains("sometimes"));
    }

    #[test]
    fn test_parse_units_arg() {
        assert_eq!(parse_units_arg("Imperial").unwrap(), "imperial");
        assert!(matches!(parse_units_arg("kelvin"), Err(CliError::InvalidUnits(_))));
    }

    #[test]
    fn test_cli_parse_cities() {
        let cli = Cli::parse_from(["skycast", "Paris", "New York"]);
        assert_eq!(cli.cities, vec!["Paris", "New York"]);
        assert!(!cli.offline);
    }

    #[test]
    fn test_run_options_from_cities() {
        let cli = Cli::parse_from(["skycast", "Paris", "  ", "--json", "--policy", "cache-first"]);
        let options = RunOptions::from_cli(&cli).unwrap();

        assert_eq!(options.cities, vec!["Paris".to_string()]);
        assert_eq!(options.format, OutputFormat::Json);
        assert_eq!(options.policy, Some(FetchPolicy::CacheFirst));
        assert!(!options.show_history);
        assert!(options.persist);
    }

    #[test]
    fn test_run_options_without_cities_shows_history() {
        let cli = Cli::parse_from(["skycast"]);
        let options = RunOptions::from_cli(&cli).unwrap();
        assert!(options.show_history);
        assert!(options.cities.is_empty());
    }

    #[test]
    fn test_run_options_maintenance_only() {
        let cli = Cli::parse_from(["skycast", "--clear-cache", "--no-persist"]);
        let options = RunOptions::from_cli(&cli).unwrap();
        assert!(options.clear_cache);
        assert!(!options.show_history);
        assert!(!options.persist);
    }

    #[test]
    fn test_run_options_invalid_policy() {
        let cli = Cli::parse_from(["skycast", "--policy", "whenever", "Paris"]);
        assert!(RunOptions::from_cli(&cli).is_err());
    }
}
