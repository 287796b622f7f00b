#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! `logging` names the diagnostic subsystems of the relay I/O stack and maps a
//! single verbosity number onto per-subsystem levels. With the `tracing`
//! feature it also provides one macro per subsystem, each bound to a fixed
//! tracing target, and a helper that installs a subscriber filtered by a
//! [`VerbosityConfig`].
//!
//! # Targets
//!
//! | Subsystem | Target |
//! |-----------|--------|
//! | copy | `relay::copy` |
//! | cache | `relay::cache` |
//! | splice | `relay::splice` |
//! | pool | `relay::pool` |
//! | handshake | `relay::handshake` |
//!
//! # Examples
//!
//! ```
//! use logging::{Subsystem, VerbosityConfig};
//!
//! let config = VerbosityConfig::from_verbose_level(2);
//! assert!(config.enabled(Subsystem::Copy, 2));
//! assert_eq!(Subsystem::from_target("relay::splice"), Some(Subsystem::Splice));
//! ```

mod config;
mod levels;
#[cfg(feature = "tracing")]
mod tracing_bridge;
#[cfg(feature = "tracing")]
mod tracing_macros;

pub use config::VerbosityConfig;
pub use levels::{Subsystem, SubsystemLevels};
#[cfg(feature = "tracing")]
pub use tracing_bridge::{env_filter, init_tracing, level_filter};
