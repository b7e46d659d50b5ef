//! Persisted core state, the in-memory log-system configuration exchanged
//! with recruits, and the database configuration the controller recruits
//! against. Core state round-trips through MessagePack for the coordinated
//! store.

use crate::interface::{OptionalInterface, StoreType};
use crate::logset::BestPolicy;
use crate::policy::{LocalityData, ReplicationPolicy};
use crate::tags::{TagLocality, Uid, Version};
use crate::utils::TaglogError;

use rmp_serde::decode::from_slice as decode_from_slice;
use rmp_serde::encode::to_vec as encode_to_vec;

use serde::{Deserialize, Serialize};

/// Which log-system implementation the persisted state describes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default,
)]
pub enum LogSystemType {
    /// Brand-new database, no log servers yet.
    #[default]
    Empty,
    /// The tag-partitioned log system.
    TagPartitioned,
}

/// Persisted form of one replica set: server ids plus every attribute needed
/// to rebuild the set (and lock it) after a total loss of the in-memory view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CoreTLogSet {
    pub tlogs: Vec<Uid>,
    pub tlog_localities: Vec<LocalityData>,
    pub tlog_write_anti_quorum: usize,
    pub tlog_replication_factor: usize,
    pub tlog_policy: Option<ReplicationPolicy>,
    pub is_local: bool,
    pub has_best_policy: Option<BestPolicy>,
    pub locality: Option<TagLocality>,
    pub start_version: Version,
}

/// Persisted form of one prior generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OldTLogCoreData {
    pub tlogs: Vec<CoreTLogSet>,
    pub log_router_tags: usize,
    pub epoch_end: Version,
}

/// The coordinated core state: everything needed to recover the database
/// after any subset of processes fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DBCoreState {
    pub log_system_type: LogSystemType,
    pub log_router_tags: usize,
    pub tlogs: Vec<CoreTLogSet>,
    pub old_tlog_data: Vec<OldTLogCoreData>,
}

impl DBCoreState {
    /// Serializes to the coordinated store's byte format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TaglogError> {
        Ok(encode_to_vec(self)?)
    }

    /// Deserializes from the coordinated store's byte format.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TaglogError> {
        Ok(decode_from_slice(bytes)?)
    }
}

/// In-memory configuration of one replica set, carrying live handles. This
/// is the form handed to recruits (`recover_from`) and rebuilt into a log
/// system by `from_log_system_config`.
#[derive(Debug, Clone, Default)]
pub struct TLogSetConfig {
    pub tlogs: Vec<OptionalInterface>,
    pub log_routers: Vec<OptionalInterface>,
    pub tlog_write_anti_quorum: usize,
    pub tlog_replication_factor: usize,
    pub tlog_policy: Option<ReplicationPolicy>,
    pub tlog_localities: Vec<LocalityData>,
    pub is_local: bool,
    pub has_best_policy: Option<BestPolicy>,
    pub locality: Option<TagLocality>,
    pub start_version: Version,
}

/// In-memory configuration of one prior generation.
#[derive(Debug, Clone, Default)]
pub struct OldTLogConfig {
    pub tlogs: Vec<TLogSetConfig>,
    pub log_router_tags: usize,
    pub epoch_end: Version,
}

/// In-memory configuration of a whole log system (current plus history).
#[derive(Debug, Clone, Default)]
pub struct LogSystemConfig {
    pub log_system_type: LogSystemType,
    pub expected_log_sets: usize,
    pub log_router_tags: usize,
    pub recruitment_id: Uid,
    pub stopped: bool,
    pub tlogs: Vec<TLogSetConfig>,
    pub old_tlogs: Vec<OldTLogConfig>,
}

/// Satellite parameters of one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionInfo {
    pub dc_id: String,
    pub satellite_tlog_replication_factor: usize,
    pub satellite_tlog_write_anti_quorum: usize,
    pub satellite_tlog_policy: ReplicationPolicy,
}

/// The slice of the database configuration the log system recruits against.
#[derive(Debug, Clone)]
pub struct DatabaseConfiguration {
    pub tlog_replication_factor: usize,
    pub tlog_write_anti_quorum: usize,
    pub tlog_policy: ReplicationPolicy,
    pub tlog_data_store_type: StoreType,
    pub remote_tlog_replication_factor: usize,
    pub remote_tlog_policy: ReplicationPolicy,
    pub regions: Vec<RegionInfo>,
}

impl DatabaseConfiguration {
    /// The region entry for a datacenter, if one is configured.
    pub fn region(&self, dc_id: &str) -> Option<&RegionInfo> {
        self.regions.iter().find(|r| r.dc_id == dc_id)
    }
}
