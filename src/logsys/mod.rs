//! The tag-partitioned log system: the in-process object representing the
//! current generation of log servers to the rest of the database. Submodules
//! implement one concern each (push, peek, pop, locking, epoch recovery, new
//! epoch bring-up, liveness monitoring); this module holds the shared state
//! and the projections to and from persisted configuration.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::corestate::{
    CoreTLogSet, DBCoreState, LogSystemConfig, LogSystemType, OldTLogConfig,
    TLogSetConfig,
};
use crate::cursor::PeekCursor;
use crate::interface::OptionalInterface;
use crate::knobs::Knobs;
use crate::logset::{BestPolicy, LogSet};
use crate::policy::{LocalityData, ReplicationPolicy};
use crate::tags::{Tag, TagLocality, Uid, Version};
use crate::utils::{
    ActorCollection, AsyncVar, Outcome, TaglogError, TaskGuard, Trigger,
};

use async_trait::async_trait;

use futures::future;

use rand::prelude::*;

mod locking;
mod monitor;
mod newepoch;
mod peek;
mod pop;
mod push;
mod recovery;

pub use locking::LogLockInfo;
pub use push::LogPushData;

/// Result cell of a background recovery stage.
pub(crate) type RecoveryOutcome = Outcome<Result<(), TaglogError>>;

/// Snapshot of a previous generation: its replica sets, its router shard
/// count, and the version at which it ended.
#[derive(Debug, Clone)]
pub struct OldLogData {
    pub tlogs: Vec<Arc<LogSet>>,
    pub log_router_tags: usize,
    pub epoch_end: Version,
}

/// The current epoch's log system. Created either from persisted core state
/// (representing a frozen prior epoch) or by `new_epoch` as the live
/// successor; replaced wholesale when the controller installs a newer one.
pub struct TagPartitionedLogSystem {
    pub(crate) dbgid: Uid,
    pub(crate) locality: LocalityData,
    pub(crate) knobs: Arc<Knobs>,

    pub(crate) log_system_type: LogSystemType,
    pub(crate) expected_log_sets: usize,
    pub(crate) tlogs: RwLock<Vec<Arc<LogSet>>>,
    pub(crate) log_router_tags: usize,
    pub(crate) recruitment_id: Mutex<Uid>,
    pub(crate) stopped: bool,

    pub(crate) epoch_end_version: Option<Version>,
    pub(crate) known_committed_version: Version,
    pub(crate) old_log_data: RwLock<Vec<OldLogData>>,
    pub(crate) lock_results: Vec<LogLockInfo>,

    /// For each currently running pop task, (server id, tag) -> the furthest
    /// requested (pop-to version, known committed at that request).
    pub(crate) outstanding_pops:
        Mutex<HashMap<(Uid, Tag), (Version, Version)>>,

    pub(crate) recovery_complete: Mutex<Option<RecoveryOutcome>>,
    pub(crate) remote_recovery: Mutex<Option<RecoveryOutcome>>,
    pub(crate) remote_recovery_complete: Mutex<Option<RecoveryOutcome>>,
    pub(crate) rejoins: Mutex<Option<Arc<TaskGuard>>>,

    pub(crate) recovery_complete_written_to_core_state: AtomicBool,
    pub(crate) remote_logs_written_to_core_state: AtomicBool,
    pub(crate) has_remote_servers: AtomicBool,

    pub(crate) log_system_config_changed: Trigger,
    pub(crate) actors: ActorCollection,
    self_ref: Mutex<Weak<TagPartitionedLogSystem>>,
}

impl TagPartitionedLogSystem {
    /// A blank system with no sets, no history, and nothing recovered.
    pub(crate) fn new(
        dbgid: Uid,
        locality: LocalityData,
        knobs: Arc<Knobs>,
    ) -> Self {
        TagPartitionedLogSystem {
            dbgid,
            locality,
            knobs,
            log_system_type: LogSystemType::Empty,
            expected_log_sets: 0,
            tlogs: RwLock::new(vec![]),
            log_router_tags: 0,
            recruitment_id: Mutex::new(Uid::nil()),
            stopped: false,
            epoch_end_version: None,
            known_committed_version: 0,
            old_log_data: RwLock::new(vec![]),
            lock_results: vec![],
            outstanding_pops: Mutex::new(HashMap::new()),
            recovery_complete: Mutex::new(None),
            remote_recovery: Mutex::new(None),
            remote_recovery_complete: Mutex::new(None),
            rejoins: Mutex::new(None),
            recovery_complete_written_to_core_state: AtomicBool::new(false),
            remote_logs_written_to_core_state: AtomicBool::new(false),
            has_remote_servers: AtomicBool::new(false),
            log_system_config_changed: Trigger::new(),
            actors: ActorCollection::new(),
            self_ref: Mutex::new(Weak::new()),
        }
    }

    /// Finalizes construction, wiring the weak back pointer that pop and
    /// monitor tasks upgrade into strong references.
    pub(crate) fn into_arc(self) -> Arc<Self> {
        let arc = Arc::new(self);
        *arc.self_ref.lock().unwrap() = Arc::downgrade(&arc);
        arc
    }

    pub(crate) fn arc_self(&self) -> Arc<Self> {
        self.self_ref
            .lock()
            .unwrap()
            .upgrade()
            .expect("log system used after teardown")
    }

    pub fn get_debug_id(&self) -> Uid {
        self.dbgid
    }

    pub fn describe(&self) -> String {
        let mut result = String::new();
        for (i, set) in self.tlogs.read().unwrap().iter().enumerate() {
            result = format!("{}: {} ", i, set.log_server_string());
        }
        result
    }

    /// Stops listening to rejoin requests from the prior epoch's servers.
    pub fn stop_rejoins(&self) {
        *self.rejoins.lock().unwrap() = None;
    }

    pub fn known_committed_version(&self) -> Version {
        self.known_committed_version
    }

    /// One past the last version of the recovered epoch.
    pub fn get_end(&self) -> Version {
        self.epoch_end_version
            .expect("epoch end version requested before recovery computed it")
            + 1
    }

    /// Upper bound for peek cursors: the epoch end once known, else open.
    pub fn get_peek_end(&self) -> Version {
        if self.epoch_end_version.is_some() {
            self.get_end()
        } else {
            Version::MAX
        }
    }

    /// Concatenates each local set's tag-to-server mapping, offsetting by the
    /// cumulative prior-set server count, so a batch is serialized by
    /// location exactly once.
    pub fn get_push_locations(&self, tags: &[Tag]) -> Vec<usize> {
        let mut locations = vec![];
        let mut location_offset = 0;
        for set in self.tlogs.read().unwrap().iter() {
            if set.is_local && set.server_count() > 0 {
                set.get_push_locations(tags, location_offset, &mut locations);
                location_offset += set.server_count();
            }
        }
        locations
    }

    pub fn has_remote_logs(&self) -> bool {
        self.log_router_tags > 0
    }

    pub fn get_random_router_tag(&self) -> Tag {
        let shard = thread_rng().gen_range(0..self.log_router_tags as u32);
        Tag::new(TagLocality::LogRouter, shard)
    }

    /// Rebuilds a log system from an in-memory configuration. With
    /// `exclude_remote`, non-local sets are left out of the current view.
    pub fn from_log_system_config(
        dbgid: Uid,
        locality: LocalityData,
        knobs: Arc<Knobs>,
        conf: &LogSystemConfig,
        exclude_remote: bool,
    ) -> Arc<Self> {
        assert!(
            conf.log_system_type == LogSystemType::TagPartitioned
                || (conf.log_system_type == LogSystemType::Empty
                    && conf.tlogs.is_empty())
        );
        let mut sys = Self::new(dbgid, locality, knobs);
        sys.expected_log_sets = conf.expected_log_sets;
        sys.log_router_tags = conf.log_router_tags;
        *sys.recruitment_id.get_mut().unwrap() = conf.recruitment_id;
        sys.stopped = conf.stopped;

        let mut tlogs = vec![];
        for set_conf in &conf.tlogs {
            if !exclude_remote || set_conf.is_local {
                tlogs.push(logset_from_config(set_conf));
            }
        }
        sys.tlogs = RwLock::new(tlogs);

        let mut old_log_data = vec![];
        for old_conf in &conf.old_tlogs {
            old_log_data.push(OldLogData {
                tlogs: old_conf
                    .tlogs
                    .iter()
                    .map(logset_from_config)
                    .collect(),
                log_router_tags: old_conf.log_router_tags,
                epoch_end: old_conf.epoch_end,
            });
        }
        sys.old_log_data = RwLock::new(old_log_data);

        sys.log_system_type = conf.log_system_type;
        sys.into_arc()
    }

    /// Rebuilds a still-recovering predecessor: the newest old generation is
    /// promoted into the current position and the system is marked stopped.
    pub fn from_old_log_system_config(
        dbgid: Uid,
        locality: LocalityData,
        knobs: Arc<Knobs>,
        conf: &LogSystemConfig,
    ) -> Arc<Self> {
        assert!(
            conf.log_system_type == LogSystemType::TagPartitioned
                || (conf.log_system_type == LogSystemType::Empty
                    && conf.tlogs.is_empty())
        );
        let mut sys = Self::new(dbgid, locality, knobs);

        if let Some(newest) = conf.old_tlogs.first() {
            sys.tlogs = RwLock::new(
                newest.tlogs.iter().map(logset_from_config).collect(),
            );
            sys.log_router_tags = newest.log_router_tags;

            let mut old_log_data = vec![];
            for old_conf in &conf.old_tlogs[1..] {
                old_log_data.push(OldLogData {
                    tlogs: old_conf
                        .tlogs
                        .iter()
                        .map(logset_from_config)
                        .collect(),
                    log_router_tags: old_conf.log_router_tags,
                    epoch_end: old_conf.epoch_end,
                });
            }
            sys.old_log_data = RwLock::new(old_log_data);
        }
        sys.log_system_type = conf.log_system_type;
        sys.stopped = true;
        sys.into_arc()
    }

    /// Projects the system into the form handed to recruits and rebuilt by
    /// `from_log_system_config`.
    pub fn get_log_system_config(&self) -> LogSystemConfig {
        let mut conf = LogSystemConfig {
            log_system_type: self.log_system_type,
            expected_log_sets: self.expected_log_sets,
            log_router_tags: self.log_router_tags,
            recruitment_id: *self.recruitment_id.lock().unwrap(),
            stopped: self.stopped,
            tlogs: vec![],
            old_tlogs: vec![],
        };
        for set in self.tlogs.read().unwrap().iter() {
            if set.is_local
                || self.remote_logs_written_to_core_state.load(Ordering::SeqCst)
            {
                conf.tlogs.push(config_from_logset(set.as_ref()));
            }
        }

        if !self
            .recovery_complete_written_to_core_state
            .load(Ordering::SeqCst)
        {
            for old in self.old_log_data.read().unwrap().iter() {
                conf.old_tlogs.push(OldTLogConfig {
                    tlogs: old
                        .tlogs
                        .iter()
                        .map(|s| config_from_logset(s.as_ref()))
                        .collect(),
                    log_router_tags: old.log_router_tags,
                    epoch_end: old.epoch_end,
                });
            }
        }
        conf
    }

    /// Emits the persisted core state. Old generations are omitted once both
    /// local and remote recovery have completed (durability moved past them).
    pub fn to_core_state(&self) -> Result<DBCoreState, TaglogError> {
        let recovery_complete = self.recovery_complete.lock().unwrap().clone();
        let remote_recovery_complete =
            self.remote_recovery_complete.lock().unwrap().clone();
        for outcome in [&recovery_complete, &remote_recovery_complete]
            .into_iter()
            .filter_map(|o| o.as_ref())
        {
            if let Some(Err(e)) = outcome.peek() {
                return Err(e);
            }
        }

        let mut new_state = DBCoreState {
            log_system_type: self.log_system_type,
            log_router_tags: self.log_router_tags,
            tlogs: vec![],
            old_tlog_data: vec![],
        };
        for set in self.tlogs.read().unwrap().iter() {
            if set.server_count() > 0 {
                new_state.tlogs.push(core_set_from_logset(set.as_ref()));
            }
        }

        let both_recovered = recovery_complete
            .as_ref()
            .map(|o| o.is_ready())
            .unwrap_or(false)
            && remote_recovery_complete
                .as_ref()
                .map(|o| o.is_ready())
                .unwrap_or(false);
        if !both_recovered {
            for old in self.old_log_data.read().unwrap().iter() {
                let mut old_core = crate::corestate::OldTLogCoreData {
                    tlogs: vec![],
                    log_router_tags: old.log_router_tags,
                    epoch_end: old.epoch_end,
                };
                for set in &old.tlogs {
                    if set.server_count() > 0 {
                        old_core.tlogs.push(core_set_from_logset(set.as_ref()));
                    }
                }
                new_state.old_tlog_data.push(old_core);
            }
        }
        Ok(new_state)
    }

    /// Acknowledges that the given core state reached the coordinated store.
    pub fn core_state_written(&self, new_state: &DBCoreState) {
        if new_state.old_tlog_data.is_empty() {
            self.recovery_complete_written_to_core_state
                .store(true, Ordering::SeqCst);
        }
        for set in &new_state.tlogs {
            if !set.is_local {
                pf_debug!(self.dbgid; "remote logs written to core state");
                self.remote_logs_written_to_core_state
                    .store(true, Ordering::SeqCst);
                break;
            }
        }
    }

    /// Wakes when a recovery transition should prompt a core-state rewrite.
    pub async fn on_core_state_changed(&self) {
        let recovery_complete = self.recovery_complete.lock().unwrap().clone();
        let remote_recovery = self.remote_recovery.lock().unwrap().clone();
        let remote_recovery_complete =
            self.remote_recovery_complete.lock().unwrap().clone();
        let rc = recovery_complete
            .expect("on_core_state_changed before recovery wiring");
        let rr = remote_recovery
            .expect("on_core_state_changed before recovery wiring");

        if rc.is_ready() && rr.is_ready() {
            if let Some(rrc) = remote_recovery_complete {
                if !rrc.is_ready() {
                    let _ = rrc.wait().await;
                    return;
                }
            }
            future::pending::<()>().await;
        } else if rr.is_ready() {
            let _ = rc.wait().await;
        } else if rc.is_ready() {
            let _ = rr.wait().await;
        } else {
            tokio::select! {
                _ = rc.wait() => {}
                _ = rr.wait() => {}
            }
        }
    }

    /// The (id, reachable) projection of current and still-relevant old log
    /// servers, published for client routing.
    pub fn logs_value(&self) -> (Vec<(Uid, bool)>, Vec<(Uid, bool)>) {
        let mut logs = vec![];
        let mut old_logs = vec![];
        for set in self.tlogs.read().unwrap().iter() {
            if set.is_local
                || self.remote_logs_written_to_core_state.load(Ordering::SeqCst)
            {
                for handle in &set.log_servers {
                    let v = handle.get();
                    logs.push((v.id(), v.is_present()));
                }
            }
        }
        if !self
            .recovery_complete_written_to_core_state
            .load(Ordering::SeqCst)
        {
            for old in self.old_log_data.read().unwrap().iter() {
                for set in &old.tlogs {
                    for handle in &set.log_servers {
                        let v = handle.get();
                        old_logs.push((v.id(), v.is_present()));
                    }
                }
            }
        }
        (logs, old_logs)
    }

    /// Wakes when any handle or the published configuration transitions.
    pub async fn on_log_system_config_change(&self) {
        let mut handles = vec![];
        for set in self.tlogs.read().unwrap().iter() {
            handles.extend(set.log_servers.iter().cloned());
        }
        for old in self.old_log_data.read().unwrap().iter() {
            for set in &old.tlogs {
                handles.extend(set.log_servers.iter().cloned());
            }
        }
        let remote_recovery = self.remote_recovery.lock().unwrap().clone();
        let watch_remote = match (&remote_recovery, self.has_remote_servers.load(Ordering::SeqCst)) {
            (Some(rr), true) => !rr.is_ready(),
            _ => false,
        };

        tokio::select! {
            _ = self.log_system_config_changed.on_trigger() => {}
            _ = async {
                let waits: Vec<_> = handles
                    .iter()
                    .map(|h| Box::pin(h.on_change()) as futures::future::BoxFuture<'_, ()>)
                    .collect();
                crate::utils::wait_for_any(waits).await;
            } => {}
            _ = async {
                match (&remote_recovery, watch_remote) {
                    (Some(rr), true) => { let _ = rr.wait().await; }
                    _ => future::pending().await,
                }
            } => {}
        }
    }
}

/// Rebuilds a replica set from its in-memory configuration.
pub(crate) fn logset_from_config(conf: &TLogSetConfig) -> Arc<LogSet> {
    Arc::new(LogSet {
        log_servers: conf
            .tlogs
            .iter()
            .map(|oi| AsyncVar::new(oi.clone()))
            .collect(),
        log_routers: RwLock::new(
            conf.log_routers
                .iter()
                .map(|oi| AsyncVar::new(oi.clone()))
                .collect(),
        ),
        replication_factor: conf.tlog_replication_factor,
        anti_quorum: conf.tlog_write_anti_quorum,
        policy: conf
            .tlog_policy
            .clone()
            .unwrap_or(ReplicationPolicy::One),
        localities: conf.tlog_localities.clone(),
        is_local: conf.is_local,
        has_best_policy: conf.has_best_policy.unwrap_or(BestPolicy::None),
        locality: conf.locality.unwrap_or(TagLocality::Invalid),
        start_version: conf.start_version,
    })
}

/// Projects a replica set into its in-memory configuration.
pub(crate) fn config_from_logset(set: &LogSet) -> TLogSetConfig {
    TLogSetConfig {
        tlogs: set.log_servers.iter().map(|h| h.get()).collect(),
        log_routers: set.routers().iter().map(|h| h.get()).collect(),
        tlog_write_anti_quorum: set.anti_quorum,
        tlog_replication_factor: set.replication_factor,
        tlog_policy: Some(set.policy.clone()),
        tlog_localities: set.localities.clone(),
        is_local: set.is_local,
        has_best_policy: Some(set.has_best_policy),
        locality: Some(set.locality),
        start_version: set.start_version,
    }
}

/// Projects a replica set into its persisted form.
pub(crate) fn core_set_from_logset(set: &LogSet) -> CoreTLogSet {
    let localities = if set.localities.len() == set.log_servers.len() {
        set.localities.clone()
    } else {
        set.log_servers
            .iter()
            .map(|h| {
                h.get()
                    .interf()
                    .map(|c| c.locality())
                    .unwrap_or_default()
            })
            .collect()
    };
    CoreTLogSet {
        tlogs: set.log_servers.iter().map(|h| h.get().id()).collect(),
        tlog_localities: localities,
        tlog_write_anti_quorum: set.anti_quorum,
        tlog_replication_factor: set.replication_factor,
        tlog_policy: Some(set.policy.clone()),
        is_local: set.is_local,
        has_best_policy: Some(set.has_best_policy),
        locality: Some(set.locality),
        start_version: set.start_version,
    }
}

/// Rebuilds a replica set from its persisted form (handles are id-only until
/// servers rejoin).
pub(crate) fn logset_from_core(core: &CoreTLogSet) -> Arc<LogSet> {
    Arc::new(LogSet {
        log_servers: core
            .tlogs
            .iter()
            .map(|id| AsyncVar::new(OptionalInterface::id_only(*id)))
            .collect(),
        log_routers: RwLock::new(vec![]),
        replication_factor: core.tlog_replication_factor,
        anti_quorum: core.tlog_write_anti_quorum,
        policy: core
            .tlog_policy
            .clone()
            .unwrap_or(ReplicationPolicy::One),
        localities: core.tlog_localities.clone(),
        is_local: core.is_local,
        has_best_policy: core.has_best_policy.unwrap_or(BestPolicy::None),
        locality: core.locality.unwrap_or(TagLocality::Invalid),
        start_version: core.start_version,
    })
}

/// Capability surface of a log system, consumed by commit proxies, storage,
/// and the cluster controller.
#[async_trait]
pub trait LogSystem: Send + Sync {
    fn get_debug_id(&self) -> Uid;

    fn describe(&self) -> String;

    fn stop_rejoins(&self);

    async fn push(
        &self,
        prev_version: Version,
        version: Version,
        known_committed_version: Version,
        data: &LogPushData,
        debug_id: Option<Uid>,
    ) -> Result<(), TaglogError>;

    fn peek(
        &self,
        dbgid: Uid,
        begin: Version,
        tag: Tag,
        parallel_get_more: bool,
    ) -> PeekCursor;

    fn peek_tags(
        &self,
        dbgid: Uid,
        begin: Version,
        tags: &[Tag],
        parallel_get_more: bool,
    ) -> PeekCursor;

    fn peek_single(
        &self,
        dbgid: Uid,
        begin: Version,
        tag: Tag,
        history: Vec<(Version, Tag)>,
    ) -> Result<PeekCursor, TaglogError>;

    fn peek_log_router(
        &self,
        dbgid: Uid,
        begin: Version,
        tag: Tag,
    ) -> PeekCursor;

    fn pop(
        &self,
        up_to: Version,
        tag: Tag,
        known_committed_version: Version,
        pop_locality: TagLocality,
    );

    async fn confirm_epoch_live(
        &self,
        debug_id: Option<Uid>,
    ) -> Result<(), TaglogError>;

    async fn end_epoch(&self) -> Result<(), TaglogError>;

    fn get_log_system_config(&self) -> LogSystemConfig;

    fn logs_value(&self) -> (Vec<(Uid, bool)>, Vec<(Uid, bool)>);

    fn to_core_state(&self) -> Result<DBCoreState, TaglogError>;

    fn core_state_written(&self, new_state: &DBCoreState);

    async fn on_core_state_changed(&self);

    async fn on_error(&self) -> TaglogError;

    async fn on_log_system_config_change(&self);

    fn get_end(&self) -> Version;

    fn get_peek_end(&self) -> Version;

    fn get_push_locations(&self, tags: &[Tag]) -> Vec<usize>;

    fn has_remote_logs(&self) -> bool;

    fn get_random_router_tag(&self) -> Tag;
}

#[async_trait]
impl LogSystem for TagPartitionedLogSystem {
    fn get_debug_id(&self) -> Uid {
        TagPartitionedLogSystem::get_debug_id(self)
    }

    fn describe(&self) -> String {
        TagPartitionedLogSystem::describe(self)
    }

    fn stop_rejoins(&self) {
        TagPartitionedLogSystem::stop_rejoins(self)
    }

    async fn push(
        &self,
        prev_version: Version,
        version: Version,
        known_committed_version: Version,
        data: &LogPushData,
        debug_id: Option<Uid>,
    ) -> Result<(), TaglogError> {
        TagPartitionedLogSystem::push(
            self,
            prev_version,
            version,
            known_committed_version,
            data,
            debug_id,
        )
        .await
    }

    fn peek(
        &self,
        dbgid: Uid,
        begin: Version,
        tag: Tag,
        parallel_get_more: bool,
    ) -> PeekCursor {
        TagPartitionedLogSystem::peek(self, dbgid, begin, tag, parallel_get_more)
    }

    fn peek_tags(
        &self,
        dbgid: Uid,
        begin: Version,
        tags: &[Tag],
        parallel_get_more: bool,
    ) -> PeekCursor {
        TagPartitionedLogSystem::peek_tags(
            self,
            dbgid,
            begin,
            tags,
            parallel_get_more,
        )
    }

    fn peek_single(
        &self,
        dbgid: Uid,
        begin: Version,
        tag: Tag,
        history: Vec<(Version, Tag)>,
    ) -> Result<PeekCursor, TaglogError> {
        TagPartitionedLogSystem::peek_single(self, dbgid, begin, tag, history)
    }

    fn peek_log_router(
        &self,
        dbgid: Uid,
        begin: Version,
        tag: Tag,
    ) -> PeekCursor {
        TagPartitionedLogSystem::peek_log_router(self, dbgid, begin, tag)
    }

    fn pop(
        &self,
        up_to: Version,
        tag: Tag,
        known_committed_version: Version,
        pop_locality: TagLocality,
    ) {
        TagPartitionedLogSystem::pop(
            self,
            up_to,
            tag,
            known_committed_version,
            pop_locality,
        )
    }

    async fn confirm_epoch_live(
        &self,
        debug_id: Option<Uid>,
    ) -> Result<(), TaglogError> {
        TagPartitionedLogSystem::confirm_epoch_live(self, debug_id).await
    }

    async fn end_epoch(&self) -> Result<(), TaglogError> {
        TagPartitionedLogSystem::end_epoch(self).await
    }

    fn get_log_system_config(&self) -> LogSystemConfig {
        TagPartitionedLogSystem::get_log_system_config(self)
    }

    fn logs_value(&self) -> (Vec<(Uid, bool)>, Vec<(Uid, bool)>) {
        TagPartitionedLogSystem::logs_value(self)
    }

    fn to_core_state(&self) -> Result<DBCoreState, TaglogError> {
        TagPartitionedLogSystem::to_core_state(self)
    }

    fn core_state_written(&self, new_state: &DBCoreState) {
        TagPartitionedLogSystem::core_state_written(self, new_state)
    }

    async fn on_core_state_changed(&self) {
        TagPartitionedLogSystem::on_core_state_changed(self).await
    }

    async fn on_error(&self) -> TaglogError {
        TagPartitionedLogSystem::on_error(self).await
    }

    async fn on_log_system_config_change(&self) {
        TagPartitionedLogSystem::on_log_system_config_change(self).await
    }

    fn get_end(&self) -> Version {
        TagPartitionedLogSystem::get_end(self)
    }

    fn get_peek_end(&self) -> Version {
        TagPartitionedLogSystem::get_peek_end(self)
    }

    fn get_push_locations(&self, tags: &[Tag]) -> Vec<usize> {
        TagPartitionedLogSystem::get_push_locations(self, tags)
    }

    fn has_remote_logs(&self) -> bool {
        TagPartitionedLogSystem::has_remote_logs(self)
    }

    fn get_random_router_tag(&self) -> Tag {
        TagPartitionedLogSystem::get_random_router_tag(self)
    }
}

#[cfg(test)]
mod logsys_tests {
    use super::*;
    use crate::policy::LOC_ZONEID;

    fn test_config() -> LogSystemConfig {
        let set = TLogSetConfig {
            tlogs: vec![
                OptionalInterface::id_only(Uid(1, 1)),
                OptionalInterface::id_only(Uid(2, 2)),
                OptionalInterface::id_only(Uid(3, 3)),
            ],
            log_routers: vec![],
            tlog_write_anti_quorum: 0,
            tlog_replication_factor: 3,
            tlog_policy: Some(ReplicationPolicy::across(3, LOC_ZONEID)),
            tlog_localities: vec![
                LocalityData::new().with(LOC_ZONEID, "z1"),
                LocalityData::new().with(LOC_ZONEID, "z2"),
                LocalityData::new().with(LOC_ZONEID, "z3"),
            ],
            is_local: true,
            has_best_policy: Some(BestPolicy::Id),
            locality: Some(TagLocality::Primary),
            start_version: 101,
        };
        let old_set = TLogSetConfig {
            tlogs: vec![OptionalInterface::id_only(Uid(9, 9))],
            tlog_replication_factor: 1,
            is_local: true,
            has_best_policy: Some(BestPolicy::Id),
            locality: Some(TagLocality::Primary),
            ..Default::default()
        };
        LogSystemConfig {
            log_system_type: LogSystemType::TagPartitioned,
            expected_log_sets: 1,
            log_router_tags: 2,
            recruitment_id: Uid(7, 7),
            stopped: false,
            tlogs: vec![set],
            old_tlogs: vec![OldTLogConfig {
                tlogs: vec![old_set],
                log_router_tags: 0,
                epoch_end: 101,
            }],
        }
    }

    fn assert_config_eq(a: &LogSystemConfig, b: &LogSystemConfig) {
        assert_eq!(a.log_system_type, b.log_system_type);
        assert_eq!(a.expected_log_sets, b.expected_log_sets);
        assert_eq!(a.log_router_tags, b.log_router_tags);
        assert_eq!(a.recruitment_id, b.recruitment_id);
        assert_eq!(a.stopped, b.stopped);
        assert_eq!(a.tlogs.len(), b.tlogs.len());
        for (x, y) in a.tlogs.iter().zip(b.tlogs.iter()) {
            assert_eq!(
                x.tlogs.iter().map(|o| o.id()).collect::<Vec<_>>(),
                y.tlogs.iter().map(|o| o.id()).collect::<Vec<_>>()
            );
            assert_eq!(x.tlog_replication_factor, y.tlog_replication_factor);
            assert_eq!(x.tlog_write_anti_quorum, y.tlog_write_anti_quorum);
            assert_eq!(x.tlog_policy, y.tlog_policy);
            assert_eq!(x.tlog_localities, y.tlog_localities);
            assert_eq!(x.is_local, y.is_local);
            assert_eq!(x.has_best_policy, y.has_best_policy);
            assert_eq!(x.locality, y.locality);
            assert_eq!(x.start_version, y.start_version);
        }
        assert_eq!(a.old_tlogs.len(), b.old_tlogs.len());
        for (x, y) in a.old_tlogs.iter().zip(b.old_tlogs.iter()) {
            assert_eq!(x.log_router_tags, y.log_router_tags);
            assert_eq!(x.epoch_end, y.epoch_end);
            assert_eq!(x.tlogs.len(), y.tlogs.len());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn config_round_trip() {
        let conf = test_config();
        let sys = TagPartitionedLogSystem::from_log_system_config(
            Uid::random(),
            LocalityData::new(),
            Arc::new(Knobs::default()),
            &conf,
            false,
        );
        let back = sys.get_log_system_config();
        assert_config_eq(&conf, &back);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn old_config_promotes_newest_generation() {
        let conf = test_config();
        let sys = TagPartitionedLogSystem::from_old_log_system_config(
            Uid::random(),
            LocalityData::new(),
            Arc::new(Knobs::default()),
            &conf,
        );
        assert!(sys.stopped);
        let tlogs = sys.tlogs.read().unwrap();
        assert_eq!(tlogs.len(), 1);
        assert_eq!(tlogs[0].log_servers[0].get().id(), Uid(9, 9));
        assert_eq!(sys.log_router_tags, 0);
        assert!(sys.old_log_data.read().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn core_state_projection() {
        let conf = test_config();
        let sys = TagPartitionedLogSystem::from_log_system_config(
            Uid::random(),
            LocalityData::new(),
            Arc::new(Knobs::default()),
            &conf,
            false,
        );
        let core = sys.to_core_state().unwrap();
        assert_eq!(core.log_system_type, LogSystemType::TagPartitioned);
        assert_eq!(core.tlogs.len(), 1);
        assert_eq!(
            core.tlogs[0].tlogs,
            vec![Uid(1, 1), Uid(2, 2), Uid(3, 3)]
        );
        // recovery futures are not wired, so history must be preserved
        assert_eq!(core.old_tlog_data.len(), 1);
        assert_eq!(core.old_tlog_data[0].epoch_end, 101);

        // persisted bytes round-trip
        let bytes = core.to_bytes().unwrap();
        assert_eq!(DBCoreState::from_bytes(&bytes).unwrap(), core);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn core_state_written_flags() {
        let conf = test_config();
        let sys = TagPartitionedLogSystem::from_log_system_config(
            Uid::random(),
            LocalityData::new(),
            Arc::new(Knobs::default()),
            &conf,
            false,
        );
        let mut core = sys.to_core_state().unwrap();
        sys.core_state_written(&core);
        assert!(!sys
            .recovery_complete_written_to_core_state
            .load(Ordering::SeqCst));

        core.old_tlog_data.clear();
        core.tlogs[0].is_local = false;
        sys.core_state_written(&core);
        assert!(sys
            .recovery_complete_written_to_core_state
            .load(Ordering::SeqCst));
        assert!(sys
            .remote_logs_written_to_core_state
            .load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn push_locations_across_sets() {
        let mut conf = test_config();
        // a second local set of two servers, no best policy
        conf.tlogs.push(TLogSetConfig {
            tlogs: vec![
                OptionalInterface::id_only(Uid(21, 0)),
                OptionalInterface::id_only(Uid(22, 0)),
            ],
            tlog_replication_factor: 2,
            is_local: true,
            has_best_policy: Some(BestPolicy::None),
            locality: Some(TagLocality::Invalid),
            ..Default::default()
        });
        let sys = TagPartitionedLogSystem::from_log_system_config(
            Uid::random(),
            LocalityData::new(),
            Arc::new(Knobs::default()),
            &conf,
            false,
        );
        let locations =
            sys.get_push_locations(&[Tag::new(TagLocality::Primary, 1)]);
        // the triple-replicated first set covers all three of its servers;
        // the second set (offset 3) covers both of its own
        assert_eq!(locations, vec![0, 1, 2, 3, 4]);
    }
}
