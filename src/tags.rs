//! Log-space primitive types: versions, tags, unique identifiers.

use std::fmt;

use get_size::GetSize;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// Monotonically increasing commit version assigned by the master.
pub type Version = u64;

/// Recovery-count epoch number of a log generation.
pub type LogEpoch = u64;

/// 128-bit unique identifier for processes, recruitments, and debug scopes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
    Deserialize, GetSize, Default,
)]
pub struct Uid(pub u64, pub u64);

impl Uid {
    /// Draws a fresh random identifier.
    pub fn random() -> Self {
        let mut rng = thread_rng();
        Uid(rng.gen(), rng.gen())
    }

    /// The all-zero placeholder identifier.
    pub fn nil() -> Self {
        Uid(0, 0)
    }

    /// True for the all-zero placeholder.
    pub fn is_nil(&self) -> bool {
        self.0 == 0 && self.1 == 0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.0, self.1)
    }
}

/// Which class of consumers a tag's channel serves. Routing decisions key on
/// this; `Special` and `Upgraded` act as wildcards when matching a tag
/// against a replica set's locality.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, GetSize,
)]
pub enum TagLocality {
    Primary,
    Satellite,
    RemoteLog,
    LogRouter,
    TxnSystem,
    Special,
    Upgraded,
    Invalid,
}

impl fmt::Display for TagLocality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TagLocality::Primary => "primary",
            TagLocality::Satellite => "satellite",
            TagLocality::RemoteLog => "remote",
            TagLocality::LogRouter => "router",
            TagLocality::TxnSystem => "txs",
            TagLocality::Special => "special",
            TagLocality::Upgraded => "upgraded",
            TagLocality::Invalid => "invalid",
        };
        write!(f, "{}", name)
    }
}

/// A logical mutation channel: (locality, shard id). Every mutation carries
/// one or more tags; each tag routes to a fixed subset of servers per set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, GetSize,
)]
pub struct Tag {
    pub locality: TagLocality,
    pub id: u32,
}

impl Tag {
    /// The system-transaction tag; peeks past the end of all generations
    /// return empty for it instead of failing.
    pub const TXS: Tag = Tag {
        locality: TagLocality::TxnSystem,
        id: 1,
    };

    pub fn new(locality: TagLocality, id: u32) -> Self {
        Tag { locality, id }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.locality, self.id)
    }
}
