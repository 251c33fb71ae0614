//! Logging initialization
//!
//! Logs go to stderr so stdout stays clean for the weather report (and for
//! `--json`). `RUST_LOG` takes precedence over the flags.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Default filter directive for the given verbosity flags
pub fn default_directive(verbose: bool, quiet: bool) -> &'static str {
    if verbose {
        "skycast=debug,warn"
    } else if quiet {
        "error"
    } else {
        "warn"
    }
}

/// Installs the global tracing subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already set.
pub fn initialize_logging(verbose: bool, quiet: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false, false), "warn");
        assert_eq!(default_directive(true, false), "skycast=debug,warn");
        assert_eq!(default_directive(false, true), "error");
        // Verbose wins over quiet
        assert_eq!(default_directive(true, true), "skycast=debug,warn");
    }

    #[test]
    fn test_directives_parse() {
        for (verbose, quiet) in [(false, false), (true, false), (false, true)] {
            assert!(EnvFilter::try_new(default_directive(verbose, quiet)).is_ok());
        }
    }
}
