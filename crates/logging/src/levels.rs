//! crates/logging/src/levels.rs
//! Subsystem identifiers and their per-subsystem verbosity levels.

/// Diagnostic subsystems of the relay I/O stack.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Subsystem {
    /// Copy engine phases and totals.
    Copy,
    /// Cache buffer replays.
    Cache,
    /// Splice chunks and fallbacks.
    Splice,
    /// Buffer and pipe pool churn.
    Pool,
    /// Destination handshakes.
    Handshake,
}

impl Subsystem {
    /// Every subsystem, in display order.
    pub const ALL: [Self; 5] = [
        Self::Copy,
        Self::Cache,
        Self::Splice,
        Self::Pool,
        Self::Handshake,
    ];

    /// Tracing target for this subsystem.
    pub const fn target(self) -> &'static str {
        match self {
            Self::Copy => "relay::copy",
            Self::Cache => "relay::cache",
            Self::Splice => "relay::splice",
            Self::Pool => "relay::pool",
            Self::Handshake => "relay::handshake",
        }
    }

    /// Short name used in configuration.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Copy => "copy",
            Self::Cache => "cache",
            Self::Splice => "splice",
            Self::Pool => "pool",
            Self::Handshake => "handshake",
        }
    }

    /// Maps a tracing target back to its subsystem.
    ///
    /// Accepts the full target, nested targets below it, or the short name.
    pub fn from_target(target: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|subsystem| {
            let full = subsystem.target();
            target == subsystem.name()
                || target == full
                || target
                    .strip_prefix(full)
                    .is_some_and(|rest| rest.starts_with("::"))
        })
    }
}

/// Verbosity level for each subsystem. Zero silences a subsystem.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SubsystemLevels {
    /// Copy engine level.
    pub copy: u8,
    /// Cache replay level.
    pub cache: u8,
    /// Splice level.
    pub splice: u8,
    /// Pool level.
    pub pool: u8,
    /// Handshake level.
    pub handshake: u8,
}

impl SubsystemLevels {
    /// Level of one subsystem.
    pub const fn get(&self, subsystem: Subsystem) -> u8 {
        match subsystem {
            Subsystem::Copy => self.copy,
            Subsystem::Cache => self.cache,
            Subsystem::Splice => self.splice,
            Subsystem::Pool => self.pool,
            Subsystem::Handshake => self.handshake,
        }
    }

    /// Sets the level of one subsystem.
    pub fn set(&mut self, subsystem: Subsystem, level: u8) {
        match subsystem {
            Subsystem::Copy => self.copy = level,
            Subsystem::Cache => self.cache = level,
            Subsystem::Splice => self.splice = level,
            Subsystem::Pool => self.pool = level,
            Subsystem::Handshake => self.handshake = level,
        }
    }
}
