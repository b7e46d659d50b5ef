//! Tuning knobs for the log system. Constructed once at process start and
//! threaded in as an immutable value; tests inject deterministic settings.

use crate::utils::TaglogError;

use serde::Deserialize;

use crate::tags::Version;

/// Tuning knobs. All durations are in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Knobs {
    /// Window without a failure-detector heartbeat after which a log server
    /// is considered failed, also bounding recruitment RPCs.
    pub tlog_timeout: f64,

    /// Delay before a coalesced pop is sent to a log server.
    pub pop_delay: f64,

    /// Delay before a coalesced pop is sent to a log router. Routers buffer
    /// only seconds of data, so their pops go out immediately.
    pub router_pop_delay: f64,

    /// Versions a read transaction may lag behind the committed prefix.
    pub max_read_transaction_life_versions: Version,

    /// Versions generated per second of wall clock.
    pub versions_per_second: Version,

    /// Deterministic-simulation mode; widens the known-committed pull-back
    /// to force recovery edge cases.
    pub simulated: bool,
}

impl Default for Knobs {
    fn default() -> Self {
        Knobs {
            tlog_timeout: 0.4,
            pop_delay: 1.0,
            router_pop_delay: 0.0,
            max_read_transaction_life_versions: 5_000_000,
            versions_per_second: 1_000_000,
            simulated: false,
        }
    }
}

impl Knobs {
    /// Parses knobs from an optional TOML override string on top of the
    /// defaults.
    pub fn from_config(config_str: Option<&str>) -> Result<Self, TaglogError> {
        parsed_config!(config_str => Knobs;
                       tlog_timeout, pop_delay, router_pop_delay,
                       max_read_transaction_life_versions,
                       versions_per_second, simulated)
    }

    /// How far below the newest durable version the known-committed version
    /// may be pulled back when computing recovery results.
    pub fn known_committed_bound(&self) -> Version {
        if self.simulated {
            10 * self.versions_per_second
        } else {
            self.max_read_transaction_life_versions
        }
    }
}
