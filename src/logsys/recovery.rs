//! Epoch recovery: lock a co-quorum of the prior epoch's servers, compute
//! the maximum safely-durable version across the replication policies, and
//! publish a stopped log system rooted there. Never returns normally; the
//! published system may be replaced by an earlier-rooted one if late replies
//! shrink the durable prefix.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};

use crate::corestate::DBCoreState;
use crate::interface::{
    wait_failure_tracker, LogServerHandle, OptionalInterface,
    TLogRejoinRequest,
};
use crate::knobs::Knobs;
use crate::logset::LogSet;
use crate::policy::LocalityData;
use crate::tags::{TagLocality, Uid, Version};
use crate::utils::{
    wait_for_any, AsyncVar, TaglogError, TaskGuard,
};

use futures::future::{self, BoxFuture};

use tokio::sync::mpsc;
use tokio::sync::oneshot;

use super::{
    logset_from_core, LogLockInfo, OldLogData, TagPartitionedLogSystem,
};

/// Keeps one server's failure flag current: tracks heartbeats while an
/// interface is known, marks failed while it is absent, and restarts on
/// every handle change.
pub(crate) async fn monitor_log(
    log_server: LogServerHandle,
    failed: AsyncVar<bool>,
    window_secs: f64,
) {
    let mut watch = log_server.watch();
    loop {
        let value = watch.current();
        match value.interf() {
            Some(client) => {
                let api = client.api().clone();
                tokio::select! {
                    _ = wait_failure_tracker(api, failed.clone(), window_secs) => {}
                    _ = watch.changed() => {}
                }
            }
            None => {
                failed.set(true);
                watch.changed().await;
            }
        }
    }
}

/// Listens for rejoin requests from the servers being recovered from,
/// updating the matching handle in place. A recognized server is answered
/// `false` ("keep going"); an unknown one `true` ("stand down"). When the
/// tracker is torn down, everyone still waiting is told to stand down.
pub(crate) async fn track_rejoins(
    dbgid: Uid,
    log_servers: Vec<LogServerHandle>,
    mut rejoin_requests: mpsc::UnboundedReceiver<TLogRejoinRequest>,
) {
    let mut last_reply: HashMap<Uid, oneshot::Sender<bool>> = HashMap::new();

    while let Some(req) = rejoin_requests.recv().await {
        let id = req.interf.id();
        match log_servers.iter().position(|h| h.get().id() == id) {
            Some(pos) => {
                pf_info!(dbgid; "log server {} rejoined", id);
                let current = log_servers[pos].get();
                let address_changed = match current.interf() {
                    Some(cur) => !cur.same_endpoint(&req.interf),
                    None => true,
                };
                if address_changed {
                    log_servers[pos]
                        .set(OptionalInterface::present(req.interf.clone()));
                }
                if let Some(prev) = last_reply.remove(&id) {
                    let _ = prev.send(false);
                }
                last_reply.insert(id, req.reply);
            }
            None => {
                pf_info!(dbgid; "unknown log server {} attempted rejoin", id);
                let _ = req.reply.send(true);
            }
        }
    }

    for (_, reply) in last_reply {
        let _ = reply.send(true);
    }
}

impl TagPartitionedLogSystem {
    /// Stops a co-quorum of the prior epoch's servers so no further versions
    /// can commit, and publishes a frozen log system representing it. Runs
    /// until torn down.
    pub async fn recover_and_end_epoch(
        out_log_system: AsyncVar<Option<Arc<TagPartitionedLogSystem>>>,
        dbgid: Uid,
        prev_state: DBCoreState,
        rejoin_requests: mpsc::UnboundedReceiver<TLogRejoinRequest>,
        locality: LocalityData,
        knobs: Arc<Knobs>,
    ) -> Result<(), TaglogError> {
        if prev_state.tlogs.is_empty() {
            // brand new database
            let mut sys =
                TagPartitionedLogSystem::new(dbgid, locality, knobs);
            sys.log_system_type = prev_state.log_system_type;
            sys.epoch_end_version = Some(0);
            sys.known_committed_version = 0;
            sys.stopped = true;
            out_log_system.set(Some(sys.into_arc()));
            future::pending::<()>().await;
            unreachable!();
        }

        pf_info!(dbgid; "recovering from a pre-existing configuration");

        let mut all_log_servers = vec![];
        let mut log_servers: Vec<Arc<LogSet>> = vec![];
        let mut log_failed: Vec<Vec<AsyncVar<bool>>> = vec![];
        let mut failure_trackers: Vec<TaskGuard> = vec![];
        for core_set in &prev_state.tlogs {
            let log_set = logset_from_core(core_set);
            let mut failed_flags = vec![];
            for handle in &log_set.log_servers {
                let failed = AsyncVar::new(false);
                all_log_servers.push(handle.clone());
                failure_trackers.push(TaskGuard::spawn(monitor_log(
                    handle.clone(),
                    failed.clone(),
                    knobs.tlog_timeout,
                )));
                failed_flags.push(failed);
            }
            log_failed.push(failed_flags);
            log_servers.push(log_set);
        }

        let mut old_log_data = vec![];
        for old in &prev_state.old_tlog_data {
            let tlogs: Vec<Arc<LogSet>> =
                old.tlogs.iter().map(logset_from_core).collect();
            for set in &tlogs {
                for handle in &set.log_servers {
                    all_log_servers.push(handle.clone());
                }
            }
            old_log_data.push(OldLogData {
                tlogs,
                log_router_tags: old.log_router_tags,
                epoch_end: old.epoch_end,
            });
        }

        let rejoins = Arc::new(TaskGuard::spawn(track_rejoins(
            dbgid,
            all_log_servers.clone(),
            rejoin_requests,
        )));

        let mut lock_results: Vec<LogLockInfo> = vec![];
        let mut locked_localities: HashSet<TagLocality> = HashSet::new();
        let mut found_special = false;
        for set in &log_servers {
            if set.locality == TagLocality::Special
                || set.locality == TagLocality::Upgraded
            {
                found_special = true;
            }
            locked_localities.insert(set.locality);
            lock_results.push(LogLockInfo::lock_set(
                dbgid,
                set,
                Version::MAX,
                true,
            ));
        }

        // A Special/Upgraded locality covers all localities, so no extra
        // generations need locking for version information. Otherwise lock
        // one old set per locality the current generation does not carry.
        'old_generations: for old in &old_log_data {
            if found_special {
                break;
            }
            for set in &old.tlogs {
                if set.locality == TagLocality::Special
                    || set.locality == TagLocality::Upgraded
                {
                    found_special = true;
                    break 'old_generations;
                }
                if !locked_localities.contains(&set.locality) {
                    pf_debug!(dbgid; "locking extra locality {} in an old generation",
                              set.locality);
                    locked_localities.insert(set.locality);
                    lock_results.push(LogLockInfo::lock_set(
                        dbgid,
                        set,
                        old.epoch_end,
                        false,
                    ));
                }
            }
        }

        let mut last_end: Option<Version> = None;
        let mut known_committed_version: Version = 0;
        loop {
            let mut min_end = Version::MAX;
            let mut max_end = 0;
            // subscribe before computing so a reply or flag settling during
            // the computation still wakes the loop
            let mut waits: Vec<BoxFuture<'_, ()>> = vec![];
            for (idx, set) in log_servers.iter().enumerate() {
                if !set.is_local {
                    continue;
                }
                waits.push(Self::get_durable_version_changed(
                    &lock_results[idx],
                    &log_failed[idx],
                ));
                let versions = Self::get_durable_version(
                    dbgid,
                    &lock_results[idx],
                    &log_failed[idx],
                    last_end,
                    &knobs,
                );
                if let Some((kcv, end)) = versions {
                    known_committed_version = known_committed_version.max(kcv);
                    max_end = max_end.max(end);
                    min_end = min_end.min(end);
                }
            }

            if max_end > 0 && last_end.map(|l| max_end < l).unwrap_or(true) {
                if last_end.is_some() {
                    pf_info!(dbgid; "restarting recovery at an earlier end version {}",
                             min_end);
                }
                last_end = Some(min_end);

                let mut sys = TagPartitionedLogSystem::new(
                    dbgid,
                    locality.clone(),
                    knobs.clone(),
                );
                sys.log_system_type = prev_state.log_system_type;
                sys.tlogs = RwLock::new(log_servers.clone());
                sys.log_router_tags = prev_state.log_router_tags;
                sys.old_log_data = RwLock::new(old_log_data.clone());
                sys.lock_results = lock_results.clone();
                sys.epoch_end_version = Some(min_end);
                sys.known_committed_version = known_committed_version;
                sys.remote_logs_written_to_core_state
                    .store(true, Ordering::SeqCst);
                sys.stopped = true;
                *sys.rejoins.get_mut().unwrap() = Some(rejoins.clone());

                pf_info!(dbgid; "recovered prior epoch: end {} known committed {}",
                         min_end, known_committed_version);
                out_log_system.set(Some(sys.into_arc()));
            }

            wait_for_any(waits).await;
        }
    }
}

#[cfg(test)]
mod recovery_tests {
    use super::*;
    use crate::corestate::{CoreTLogSet, LogSystemType};
    use crate::interface::TLogClient;
    use crate::policy::{ReplicationPolicy, LOC_ZONEID};
    use crate::testutil::MockTLog;
    use std::time::Duration;
    use tokio::time;

    fn prev_state_of_three() -> DBCoreState {
        DBCoreState {
            log_system_type: LogSystemType::TagPartitioned,
            log_router_tags: 0,
            tlogs: vec![CoreTLogSet {
                tlogs: vec![Uid(1, 0), Uid(2, 0), Uid(3, 0)],
                tlog_localities: vec![
                    LocalityData::new().with(LOC_ZONEID, "z1"),
                    LocalityData::new().with(LOC_ZONEID, "z2"),
                    LocalityData::new().with(LOC_ZONEID, "z3"),
                ],
                tlog_write_anti_quorum: 0,
                tlog_replication_factor: 3,
                tlog_policy: Some(ReplicationPolicy::across(3, LOC_ZONEID)),
                is_local: true,
                has_best_policy: Some(crate::logset::BestPolicy::Id),
                locality: Some(TagLocality::Primary),
                start_version: 1,
            }],
            old_tlog_data: vec![],
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn brand_new_database() {
        let out = AsyncVar::new(None);
        let (_tx, rx) = mpsc::unbounded_channel();
        let _recovery = TaskGuard::spawn({
            let out = out.clone();
            async move {
                let _ = TagPartitionedLogSystem::recover_and_end_epoch(
                    out,
                    Uid::nil(),
                    DBCoreState::default(),
                    rx,
                    LocalityData::new(),
                    Arc::new(Knobs::default()),
                )
                .await;
            }
        });

        let mut published = out.watch();
        let sys = loop {
            if let Some(sys) = published.current() {
                break sys;
            }
            published.changed().await;
        };
        assert!(sys.stopped);
        assert_eq!(sys.epoch_end_version, Some(0));
        assert_eq!(sys.known_committed_version, 0);
        assert!(sys.tlogs.read().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn recovers_single_set_after_rejoins() {
        let out = AsyncVar::new(None);
        let (rejoin_tx, rejoin_rx) = mpsc::unbounded_channel();
        let _recovery = TaskGuard::spawn({
            let out = out.clone();
            async move {
                let _ = TagPartitionedLogSystem::recover_and_end_epoch(
                    out,
                    Uid::nil(),
                    prev_state_of_three(),
                    rejoin_rx,
                    LocalityData::new(),
                    Arc::new(Knobs::default()),
                )
                .await;
            }
        });

        // nothing can be published until the servers come back
        time::sleep(Duration::from_millis(50)).await;
        assert!(out.get().is_none());

        // the survivors rejoin with their lock replies scripted
        let ends = [(100u64, 99u64), (100, 99), (102, 100)];
        let mut acks = vec![];
        for (i, (end, kcv)) in ends.iter().enumerate() {
            let mock = MockTLog::with_lock(
                Uid(i as u64 + 1, 0),
                &format!("z{}", i + 1),
                *end,
                *kcv,
            );
            let (ack_tx, ack_rx) = oneshot::channel();
            rejoin_tx
                .send(TLogRejoinRequest {
                    interf: mock.client(),
                    reply: ack_tx,
                })
                .unwrap();
            acks.push(ack_rx);
        }

        let mut published = out.watch();
        let sys = time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(sys) = published.current() {
                    break sys;
                }
                published.changed().await;
            }
        })
        .await
        .expect("recovery must publish a stopped system");

        assert!(sys.stopped);
        // smallest committed end wins; known committed follows the replies
        assert_eq!(sys.epoch_end_version, Some(100));
        assert_eq!(sys.known_committed_version, 100);
        assert_eq!(sys.lock_results.len(), 1);
        assert!(sys.lock_results[0].is_current);
        assert_eq!(sys.get_end(), 101);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unknown_rejoin_stands_down() {
        let handles = vec![AsyncVar::new(OptionalInterface::id_only(Uid(
            1, 0,
        )))];
        let (tx, rx) = mpsc::unbounded_channel();
        let _tracker =
            TaskGuard::spawn(track_rejoins(Uid::nil(), handles.clone(), rx));

        let stranger = MockTLog::new(Uid(42, 42), "zx");
        let (ack_tx, ack_rx) = oneshot::channel();
        tx.send(TLogRejoinRequest {
            interf: stranger.client(),
            reply: ack_tx,
        })
        .unwrap();
        assert!(ack_rx.await.unwrap(), "stranger must be told to stand down");

        // a known server gets recognized and its handle filled in
        let known = MockTLog::new(Uid(1, 0), "z1");
        let client: TLogClient = known.client();
        let (ack_tx, _ack_rx) = oneshot::channel();
        tx.send(TLogRejoinRequest {
            interf: client,
            reply: ack_tx,
        })
        .unwrap();
        time::sleep(Duration::from_millis(50)).await;
        assert!(handles[0].get().is_present());
    }
}
