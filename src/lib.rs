//! Public interface to the Taglog core library: the tag-partitioned
//! replicated log subsystem of a distributed transactional database. It
//! provides an ordered, durable stream of mutations sharded by tag,
//! replicated across a configurable set of log servers per region, and
//! recoverable into a new epoch consistent with the durable prefix of the
//! prior one.

#![allow(clippy::uninlined_format_args)]

#[macro_use]
mod utils;

mod tags;
mod knobs;
mod policy;
mod interface;
mod logset;
mod cursor;
mod corestate;
mod logsys;

#[cfg(test)]
mod testutil;

pub use utils::{
    ActorCollection, AsyncVar, AsyncVarWatch, Bitmap, Outcome, TaglogError,
    TaskGuard, Trigger,
};

pub use tags::{LogEpoch, Tag, TagLocality, Uid, Version};

pub use knobs::Knobs;

pub use policy::{
    validate_all_combinations, LocalityData, LocalityGroup,
    ReplicationPolicy, LOC_DCID, LOC_MACHINEID, LOC_ZONEID,
};

pub use interface::{
    InitializeLogRouterRequest, InitializeTLogRequest, LogServerApi,
    LogServerHandle, OptionalInterface, RecruitFromConfigurationReply,
    RecruitRemoteFromConfigurationReply, StoreType, TLogClient,
    TLogCommitRequest, TLogConfirmRunningRequest, TLogLockResult,
    TLogPopRequest, TLogRecoveryFinishedRequest, TLogRejoinRequest,
    WorkerApi, WorkerClient,
};

pub use logset::{BestPolicy, LogSet};

pub use cursor::{
    MergedPeekCursor, MultiCursor, PeekCursor, ServerPeekCursor,
    SetPeekCursor,
};

pub use corestate::{
    CoreTLogSet, DBCoreState, DatabaseConfiguration, LogSystemConfig,
    LogSystemType, OldTLogConfig, OldTLogCoreData, RegionInfo,
    TLogSetConfig,
};

pub use logsys::{
    LogLockInfo, LogPushData, LogSystem, OldLogData,
    TagPartitionedLogSystem,
};
