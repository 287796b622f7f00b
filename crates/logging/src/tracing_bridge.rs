//! crates/logging/src/tracing_bridge.rs
//! Bridge between the tracing crate and the relay verbosity levels.
//!
//! A [`VerbosityConfig`] becomes an [`EnvFilter`] with one directive per
//! subsystem target. Events outside the `relay::` targets pass at `warn`.
//!
//! # Usage
//!
//! ```rust,ignore
//! use logging::{VerbosityConfig, init_tracing};
//!
//! init_tracing(&VerbosityConfig::from_verbose_level(2));
//! tracing::info!(target: "relay::copy", "copy finished");
//! ```

use super::config::VerbosityConfig;
use super::levels::Subsystem;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Map a subsystem verbosity level to a tracing level filter.
pub const fn level_filter(level: u8) -> LevelFilter {
    match level {
        0 => LevelFilter::OFF,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Build a filter with one directive per subsystem.
pub fn env_filter(config: &VerbosityConfig) -> EnvFilter {
    let directives = Subsystem::ALL
        .iter()
        .map(|&subsystem| {
            format!(
                "{}={}",
                subsystem.target(),
                level_filter(config.levels.get(subsystem))
            )
        })
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(format!("warn,{directives}"))
}

/// Install a global formatting subscriber filtered by `config`.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_tracing(config: &VerbosityConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(config))
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter(0), LevelFilter::OFF);
        assert_eq!(level_filter(1), LevelFilter::INFO);
        assert_eq!(level_filter(2), LevelFilter::DEBUG);
        assert_eq!(level_filter(3), LevelFilter::TRACE);
        assert_eq!(level_filter(9), LevelFilter::TRACE);
    }

    #[test]
    fn test_env_filter_mentions_every_target() {
        let config = VerbosityConfig::from_verbose_level(1);
        let rendered = env_filter(&config).to_string();
        for subsystem in Subsystem::ALL {
            assert!(rendered.contains(subsystem.target()), "{rendered}");
        }
        assert!(rendered.contains("relay::copy=info"), "{rendered}");
        assert!(rendered.contains("relay::splice=off"), "{rendered}");
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        let config = VerbosityConfig::from_verbose_level(3);
        let first = init_tracing(&config);
        let second = init_tracing(&config);
        assert!(!second || !first);
        crate::trace_copy!("copy trace after init");
        crate::trace_pool!(idle = 1, "pool trace after init");
    }
}
