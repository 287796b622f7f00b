//! crates/logging/src/config.rs
//! Verbosity configuration built from a single verbose level.

use super::levels::{Subsystem, SubsystemLevels};

/// Per-subsystem verbosity.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VerbosityConfig {
    /// Level per subsystem.
    pub levels: SubsystemLevels,
}

impl VerbosityConfig {
    /// Create a configuration from a verbose level (0-3).
    ///
    /// Level 1 reports copy phases, level 2 adds cache replays and handshakes,
    /// level 3 adds splice chunks and pool churn. Higher values behave like 3.
    pub fn from_verbose_level(level: u8) -> Self {
        let mut config = Self::default();
        let levels = &mut config.levels;

        match level {
            0 => {}
            1 => {
                levels.copy = 1;
            }
            2 => {
                levels.copy = 2;
                levels.cache = 2;
                levels.handshake = 2;
            }
            _ => {
                for subsystem in Subsystem::ALL {
                    levels.set(subsystem, 3);
                }
            }
        }

        config
    }

    /// Returns `true` when `subsystem` is at or above `level`.
    pub const fn enabled(&self, subsystem: Subsystem, level: u8) -> bool {
        self.levels.get(subsystem) >= level
    }

    /// Overrides one subsystem.
    pub fn with(mut self, subsystem: Subsystem, level: u8) -> Self {
        self.levels.set(subsystem, level);
        self
    }
}
