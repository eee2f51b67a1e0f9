//! Logging for grading runs.
//!
//! Library code logs through `tracing` with a `student` field on every
//! per-student event; the batch coordinator adds one line per phase and one
//! `[k/n]` progress line per finished student. The HTTP stack is held at
//! `warn` unless `--verbose` is given, so a large cohort's log stays
//! readable. `RUST_LOG` overrides everything.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Crates whose request-level chatter is muted below `DEBUG`.
const NOISY_CRATES: [&str; 3] = ["hyper", "reqwest", "rustls"];

/// Install the global subscriber; later calls are no-ops. With `json`, each
/// event is one JSON line.
pub fn init_tracing(json: bool, level: Level) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let output = fmt::layer().with_target(false);
    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry.with(output.json()).try_init().ok();
    } else {
        registry.with(output).try_init().ok();
    }
}

/// Filter directives used when `RUST_LOG` is unset.
pub fn default_directives(level: Level) -> String {
    let mut directives = level.as_str().to_lowercase();
    if level < Level::DEBUG {
        for name in NOISY_CRATES {
            directives.push_str(&format!(",{name}=warn"));
        }
    }
    directives
}

/// Default level for the CLI's `--verbose` flag.
pub fn level_for(verbose: bool) -> Level {
    if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_tracing(false, Level::INFO);
        init_tracing(true, Level::DEBUG);
    }

    #[test]
    fn http_stack_is_quiet_unless_verbose() {
        assert_eq!(default_directives(Level::INFO), "info,hyper=warn,reqwest=warn,rustls=warn");
        assert_eq!(default_directives(Level::DEBUG), "debug");
    }

    #[test]
    fn verbose_maps_to_debug() {
        assert_eq!(level_for(true), Level::DEBUG);
        assert_eq!(level_for(false), Level::INFO);
    }
}
