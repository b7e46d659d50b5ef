//! New-epoch bring-up: recruit the primary (and satellite) replica sets of
//! the successor epoch, derive their start versions from the old epoch's
//! durable-version results, recruit log routers on old generations when the
//! primary must replay from before the old known-committed version, and
//! bring up the remote region asynchronously.

use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};

use crate::corestate::{DatabaseConfiguration, LogSystemType};
use crate::interface::{
    reply_unless_failed_for, transform_errors, InitializeLogRouterRequest,
    InitializeTLogRequest, OptionalInterface,
    RecruitFromConfigurationReply, RecruitRemoteFromConfigurationReply,
    TLogClient, TLogRecoveryFinishedRequest, WorkerClient,
};
use crate::logset::{BestPolicy, LogSet};
use crate::policy::{LocalityData, ReplicationPolicy};
use crate::tags::{LogEpoch, Tag, TagLocality, Uid, Version};
use crate::utils::{AsyncVar, Outcome, TaglogError};

use futures::future;

use super::{OldLogData, RecoveryOutcome, TagPartitionedLogSystem};

type RecruitReply = Outcome<Result<TLogClient, TaglogError>>;

fn dummy_handles(count: usize) -> Vec<crate::interface::LogServerHandle> {
    (0..count)
        .map(|_| AsyncVar::new(OptionalInterface::id_only(Uid::nil())))
        .collect()
}

/// Fires one recruitment RPC inside the failure window.
fn recruit_log_router(
    worker: WorkerClient,
    req: InitializeLogRouterRequest,
    window_secs: f64,
) -> RecruitReply {
    Outcome::spawn(async move {
        transform_errors(
            reply_unless_failed_for(worker.init_log_router(req), window_secs),
            TaglogError::MasterRecoveryFailed,
        )
        .await
    })
}

fn recruit_tlog(
    worker: WorkerClient,
    req: InitializeTLogRequest,
    window_secs: f64,
) -> RecruitReply {
    Outcome::spawn(async move {
        transform_errors(
            reply_unless_failed_for(worker.init_tlog(req), window_secs),
            TaglogError::MasterRecoveryFailed,
        )
        .await
    })
}

/// The recovery-finished acknowledgment of one freshly recruited server.
fn recovery_finished(client: &TLogClient, window_secs: f64) -> RecoveryOutcome {
    let api = client.api().clone();
    Outcome::spawn(async move {
        transform_errors(
            reply_unless_failed_for(
                api.recovery_finished(TLogRecoveryFinishedRequest),
                window_secs,
            ),
            TaglogError::MasterRecoveryFailed,
        )
        .await
    })
}

async fn wait_all_recruited(
    replies: &[RecruitReply],
) -> Result<(), TaglogError> {
    for r in replies {
        r.wait().await?;
    }
    Ok(())
}

/// `waitForAll(replies) || recruitment`: a recruitment failure preempts the
/// wait for initialization replies.
async fn race_with_recruitment(
    replies: &[RecruitReply],
    recruitment: &Option<RecoveryOutcome>,
) -> Result<(), TaglogError> {
    match recruitment {
        Some(r) => tokio::select! {
            res = wait_all_recruited(replies) => res,
            res = r.wait() => res,
        },
        None => wait_all_recruited(replies).await,
    }
}

impl TagPartitionedLogSystem {
    /// Builds the provisional successor epoch from recruited workers. Call
    /// only on a stopped system; the result becomes authoritative once the
    /// caller updates the coordinated core state.
    #[allow(clippy::too_many_arguments)]
    pub async fn new_epoch(
        self: &Arc<Self>,
        recr: RecruitFromConfigurationReply,
        remote_workers: Option<Outcome<RecruitRemoteFromConfigurationReply>>,
        configuration: DatabaseConfiguration,
        recovery_count: LogEpoch,
        primary_locality: TagLocality,
        remote_locality: TagLocality,
        all_tags: Vec<Tag>,
    ) -> Result<Arc<TagPartitionedLogSystem>, TaglogError> {
        let old_log_system = self.clone();
        let dbgid = old_log_system.dbgid;
        let knobs = old_log_system.knobs.clone();
        let window = knobs.tlog_timeout;

        // a fresh recruitment id, stamped onto the old system so that its
        // in-flight pushes are refused by the recruits
        let recruitment_id = Uid::random();
        *old_log_system.recruitment_id.lock().unwrap() = recruitment_id;

        let mut sys = TagPartitionedLogSystem::new(
            dbgid,
            old_log_system.locality.clone(),
            knobs.clone(),
        );
        sys.log_system_type = LogSystemType::TagPartitioned;
        sys.expected_log_sets = 1;
        *sys.recruitment_id.get_mut().unwrap() = recruitment_id;

        let region = configuration.region(&recr.dc_id).cloned();
        let has_satellite = region
            .as_ref()
            .map(|r| r.satellite_tlog_replication_factor > 0)
            .unwrap_or(false);
        if has_satellite {
            sys.expected_log_sets += 1;
        }

        if configuration.remote_tlog_replication_factor > 0 {
            sys.log_router_tags = recr.tlogs.len();
            sys.expected_log_sets += 1;
        } else {
            sys.log_router_tags = 0;
        }

        // the old epoch becomes the newest old generation
        let old_kcv = old_log_system.known_committed_version;
        {
            let old_tlogs = old_log_system.tlogs.read().unwrap().clone();
            let mut seeded = vec![];
            if !old_tlogs.is_empty() {
                seeded.push(OldLogData {
                    tlogs: old_tlogs,
                    log_router_tags: old_log_system.log_router_tags,
                    epoch_end: old_kcv + 1,
                });
            }
            seeded.extend(
                old_log_system.old_log_data.read().unwrap().iter().cloned(),
            );
            sys.old_log_data = RwLock::new(seeded);
        }

        // The new primary must replay from a version no higher than any
        // surviving commit of its locality. A current, local lock result
        // means the locality did not move and no refinement is needed.
        let mut primary_start = old_kcv + 1;
        for lock in &old_log_system.lock_results {
            if lock.log_set.locality == primary_locality {
                if !(lock.is_current && lock.log_set.is_local) {
                    loop {
                        let changed =
                            Self::get_durable_version_changed(lock, &[]);
                        if let Some((kcv, _end)) = Self::get_durable_version(
                            dbgid, lock, &[], None, &knobs,
                        ) {
                            primary_start = primary_start
                                .min(kcv + 1)
                                .min(lock.epoch_end);
                            break;
                        }
                        changed.await;
                    }
                }
                break;
            }
        }
        pf_info!(dbgid; "new epoch start version {} (old epoch ends {})",
                 primary_start, old_kcv + 1);

        let localities: Vec<LocalityData> =
            recr.tlogs.iter().map(|w| w.locality()).collect();
        let primary_set = Arc::new(LogSet {
            log_servers: dummy_handles(recr.tlogs.len()),
            log_routers: RwLock::new(vec![]),
            replication_factor: configuration.tlog_replication_factor,
            anti_quorum: configuration.tlog_write_anti_quorum,
            policy: configuration.tlog_policy.clone(),
            localities: localities.clone(),
            is_local: true,
            has_best_policy: BestPolicy::Id,
            locality: primary_locality,
            start_version: primary_start,
        });
        sys.tlogs.get_mut().unwrap().push(primary_set.clone());

        let satellite_set = if has_satellite {
            let r = region.as_ref().unwrap();
            let set = Arc::new(LogSet {
                log_servers: dummy_handles(recr.satellite_tlogs.len()),
                log_routers: RwLock::new(vec![]),
                replication_factor: r.satellite_tlog_replication_factor,
                anti_quorum: r.satellite_tlog_write_anti_quorum,
                policy: r.satellite_tlog_policy.clone(),
                localities: recr
                    .satellite_tlogs
                    .iter()
                    .map(|w| w.locality())
                    .collect(),
                is_local: true,
                has_best_policy: BestPolicy::None,
                locality: TagLocality::Invalid,
                start_version: old_kcv + 1,
            });
            sys.tlogs.get_mut().unwrap().push(set.clone());
            Some(set)
        } else {
            None
        };

        let sys = sys.into_arc();

        // recruit log routers on old epochs when the primary replays from
        // before the old commit point
        let old_router_recruitment: Option<RecoveryOutcome> =
            if primary_start < old_kcv + 1 {
                let old = old_log_system.clone();
                let workers = recr.old_log_routers.clone();
                let tlog_localities = localities.clone();
                let tlog_policy = configuration.tlog_policy.clone();
                Some(Outcome::spawn(recruit_old_log_routers(
                    old,
                    workers,
                    recovery_count,
                    primary_locality,
                    primary_start,
                    tlog_localities,
                    tlog_policy,
                    BestPolicy::Id,
                    false,
                )))
            } else {
                old_log_system.log_system_config_changed.trigger();
                None
            };

        // primary recruitment: recover-tags follow the push locations, plus
        // the old epoch's router tags at their own locations
        let mut recover_tags: Vec<Vec<Tag>> = vec![vec![]; recr.tlogs.len()];
        for i in 0..old_log_system.log_router_tags {
            let tag = Tag::new(TagLocality::LogRouter, i as u32);
            if let Some(loc) = primary_set.best_location_for(tag) {
                recover_tags[loc].push(tag);
            }
        }
        for &tag in &all_tags {
            let mut locations = vec![];
            primary_set.get_push_locations(&[tag], 0, &mut locations);
            for loc in locations {
                recover_tags[loc].push(tag);
            }
        }

        let recover_from = old_log_system.get_log_system_config();
        let recover_at = old_log_system
            .epoch_end_version
            .expect("new epoch requires a recovered predecessor");

        let initialization_replies: Vec<RecruitReply> = recr
            .tlogs
            .iter()
            .enumerate()
            .map(|(i, worker)| {
                recruit_tlog(
                    worker.clone(),
                    InitializeTLogRequest {
                        recruitment_id,
                        store_type: configuration.tlog_data_store_type,
                        recover_from: recover_from.clone(),
                        recover_at,
                        known_committed_version: old_kcv,
                        epoch: recovery_count,
                        locality: primary_locality,
                        remote_tag: Tag::new(TagLocality::RemoteLog, i as u32),
                        is_primary: true,
                        all_tags: all_tags.clone(),
                        start_version: primary_start,
                        log_router_tags: sys.log_router_tags,
                        recover_tags: recover_tags[i].clone(),
                    },
                    window,
                )
            })
            .collect();

        let mut recovery_complete_entries: Vec<RecoveryOutcome> = vec![];

        if let Some(satellite_set) = &satellite_set {
            let mut satellite_tags: Vec<Vec<Tag>> =
                vec![vec![]; recr.satellite_tlogs.len()];
            for &tag in &all_tags {
                let mut locations = vec![];
                satellite_set.get_push_locations(&[tag], 0, &mut locations);
                for loc in locations {
                    satellite_tags[loc].push(tag);
                }
            }
            let satellite_replies: Vec<RecruitReply> = recr
                .satellite_tlogs
                .iter()
                .enumerate()
                .map(|(i, worker)| {
                    recruit_tlog(
                        worker.clone(),
                        InitializeTLogRequest {
                            recruitment_id,
                            store_type: configuration.tlog_data_store_type,
                            recover_from: recover_from.clone(),
                            recover_at,
                            known_committed_version: old_kcv,
                            epoch: recovery_count,
                            locality: TagLocality::Invalid,
                            remote_tag: Tag::new(TagLocality::Invalid, 0),
                            is_primary: true,
                            all_tags: all_tags.clone(),
                            start_version: old_kcv + 1,
                            log_router_tags: sys.log_router_tags,
                            recover_tags: satellite_tags[i].clone(),
                        },
                        window,
                    )
                })
                .collect();

            race_with_recruitment(&satellite_replies, &old_router_recruitment)
                .await?;

            for (i, reply) in satellite_replies.iter().enumerate() {
                let client = reply.wait().await?;
                satellite_set.log_servers[i]
                    .set(OptionalInterface::present(client.clone()));
                recovery_complete_entries
                    .push(recovery_finished(&client, window));
            }
        }

        race_with_recruitment(&initialization_replies, &old_router_recruitment)
            .await?;

        for (i, reply) in initialization_replies.iter().enumerate() {
            let client = reply.wait().await?;
            primary_set.log_servers[i]
                .set(OptionalInterface::present(client.clone()));
            recovery_complete_entries.push(recovery_finished(&client, window));
        }

        let recovery_complete: RecoveryOutcome =
            Outcome::spawn(async move {
                for entry in &recovery_complete_entries {
                    entry.wait().await?;
                }
                Ok(())
            });
        *sys.recovery_complete.lock().unwrap() =
            Some(recovery_complete.clone());

        if configuration.remote_tlog_replication_factor > 0 {
            let remote_workers = remote_workers.ok_or_else(|| {
                TaglogError::Msg(
                    "remote logs configured but no remote workers supplied"
                        .into(),
                )
            })?;
            sys.has_remote_servers.store(true, Ordering::SeqCst);
            let remote_recovery = Outcome::spawn(new_remote_epoch(
                sys.clone(),
                old_log_system.clone(),
                remote_workers,
                configuration.clone(),
                recovery_count,
                remote_locality,
                all_tags.clone(),
            ));
            *sys.remote_recovery.lock().unwrap() = Some(remote_recovery);
        } else {
            sys.has_remote_servers.store(false, Ordering::SeqCst);
            *sys.remote_recovery.lock().unwrap() =
                Some(recovery_complete.clone());
            *sys.remote_recovery_complete.lock().unwrap() =
                Some(recovery_complete);
        }

        Ok(sys)
    }
}

/// Brings up the remote region: a non-local replica set fed by log routers,
/// its start version lowered to the remote locality's durable version when
/// the old epoch carried one.
async fn new_remote_epoch(
    sys: Arc<TagPartitionedLogSystem>,
    old_log_system: Arc<TagPartitionedLogSystem>,
    remote_workers: Outcome<RecruitRemoteFromConfigurationReply>,
    configuration: DatabaseConfiguration,
    recovery_count: LogEpoch,
    remote_locality: TagLocality,
    all_tags: Vec<Tag>,
) -> Result<(), TaglogError> {
    pf_info!(sys.dbgid; "remote log recruitment waiting for workers");
    let remote_workers = remote_workers.wait().await;
    let knobs = sys.knobs.clone();
    let window = knobs.tlog_timeout;

    let mut start_version = old_log_system.known_committed_version + 1;
    for lock in &old_log_system.lock_results {
        if lock.log_set.locality == remote_locality {
            loop {
                let changed =
                    TagPartitionedLogSystem::get_durable_version_changed(
                        lock,
                        &[],
                    );
                if let Some((kcv, _end)) =
                    TagPartitionedLogSystem::get_durable_version(
                        sys.dbgid, lock, &[], None, &knobs,
                    )
                {
                    start_version =
                        start_version.min(kcv + 1).min(lock.epoch_end);
                    break;
                }
                changed.await;
            }
            break;
        }
    }

    let localities: Vec<LocalityData> = remote_workers
        .remote_tlogs
        .iter()
        .map(|w| w.locality())
        .collect();

    let old_router_recruitment: Option<RecoveryOutcome> =
        if start_version < old_log_system.known_committed_version + 1 {
            Some(Outcome::spawn(recruit_old_log_routers(
                sys.clone(),
                remote_workers.log_routers.clone(),
                recovery_count,
                remote_locality,
                start_version,
                localities.clone(),
                configuration.remote_tlog_policy.clone(),
                BestPolicy::Id,
                true,
            )))
        } else {
            None
        };

    let primary_start = sys
        .tlogs
        .read()
        .unwrap()
        .first()
        .map(|s| s.start_version)
        .unwrap_or(0);
    let router_replies: Vec<RecruitReply> = (0..sys.log_router_tags)
        .map(|i| {
            recruit_log_router(
                remote_workers.log_routers[i % remote_workers.log_routers.len()]
                    .clone(),
                InitializeLogRouterRequest {
                    recovery_count,
                    router_tag: Tag::new(TagLocality::LogRouter, i as u32),
                    start_version: primary_start.max(start_version),
                    tlog_localities: localities.clone(),
                    tlog_policy: configuration.remote_tlog_policy.clone(),
                    has_best_policy: BestPolicy::Id,
                    locality: remote_locality,
                },
                window,
            )
        })
        .collect();

    let recover_from = old_log_system.get_log_system_config();
    let recover_at = old_log_system
        .epoch_end_version
        .expect("remote epoch requires a recovered predecessor");
    let remote_replies: Vec<RecruitReply> = remote_workers
        .remote_tlogs
        .iter()
        .enumerate()
        .map(|(i, worker)| {
            recruit_tlog(
                worker.clone(),
                InitializeTLogRequest {
                    recruitment_id: *sys.recruitment_id.lock().unwrap(),
                    store_type: configuration.tlog_data_store_type,
                    recover_from: recover_from.clone(),
                    recover_at,
                    known_committed_version: old_log_system
                        .known_committed_version,
                    epoch: recovery_count,
                    locality: remote_locality,
                    remote_tag: Tag::new(TagLocality::RemoteLog, i as u32),
                    is_primary: false,
                    all_tags: all_tags.clone(),
                    start_version,
                    log_router_tags: 0,
                    recover_tags: vec![],
                },
                window,
            )
        })
        .collect();

    pf_info!(sys.dbgid; "remote log recruitment initializing {} servers from {}",
             remote_replies.len(), start_version);
    wait_all_recruited(&remote_replies).await?;
    wait_all_recruited(&router_replies).await?;
    if let Some(recruitment) = &old_router_recruitment {
        recruitment.wait().await?;
    }

    let mut log_routers = vec![];
    for reply in &router_replies {
        let client = reply.wait().await?;
        log_routers.push(AsyncVar::new(OptionalInterface::present(client)));
    }
    let mut log_servers = vec![];
    let mut recovery_complete_entries = vec![];
    for reply in &remote_replies {
        let client = reply.wait().await?;
        recovery_complete_entries.push(recovery_finished(&client, window));
        log_servers.push(AsyncVar::new(OptionalInterface::present(client)));
    }

    let remote_set = Arc::new(LogSet {
        log_servers,
        log_routers: RwLock::new(log_routers),
        replication_factor: configuration.remote_tlog_replication_factor,
        anti_quorum: 0,
        policy: configuration.remote_tlog_policy.clone(),
        localities,
        is_local: false,
        has_best_policy: BestPolicy::Id,
        locality: remote_locality,
        start_version,
    });

    *sys.remote_recovery_complete.lock().unwrap() =
        Some(Outcome::spawn(async move {
            for entry in &recovery_complete_entries {
                entry.wait().await?;
            }
            Ok(())
        }));
    sys.tlogs.write().unwrap().push(remote_set);
    pf_info!(sys.dbgid; "remote log recruitment completing recovery");
    Ok(())
}

/// Recruits log routers on old epochs of `locality` so the new epoch can
/// replay tagged mutations that survived only on a remote-side generation.
/// The request-issuance walk and the reply-installation walk are
/// independent, each maintaining its own `last_start`.
#[allow(clippy::too_many_arguments)]
async fn recruit_old_log_routers(
    sys: Arc<TagPartitionedLogSystem>,
    workers: Vec<WorkerClient>,
    recovery_count: LogEpoch,
    locality: TagLocality,
    start_version: Version,
    tlog_localities: Vec<LocalityData>,
    tlog_policy: ReplicationPolicy,
    has_best_policy: BestPolicy,
    for_remote: bool,
) -> Result<(), TaglogError> {
    let knobs = sys.knobs.clone();
    let window = knobs.tlog_timeout;
    let mut replies_per_set: Vec<Vec<RecruitReply>> = vec![];
    let mut next_router = 0;
    let mut last_start = Version::MAX;

    let make_request = |tag_index: usize, start: Version| {
        InitializeLogRouterRequest {
            recovery_count,
            router_tag: Tag::new(TagLocality::LogRouter, tag_index as u32),
            start_version: start,
            tlog_localities: tlog_localities.clone(),
            tlog_policy: tlog_policy.clone(),
            has_best_policy,
            locality,
        }
    };

    if !for_remote {
        let mut max_start = 0;
        for set in sys.tlogs.read().unwrap().iter() {
            if set.is_local {
                max_start = max_start.max(set.start_version);
            }
        }
        last_start = start_version.max(max_start);
        if sys.log_router_tags == 0 {
            sys.log_system_config_changed.trigger();
            return Ok(());
        }

        {
            let mut tlogs = sys.tlogs.write().unwrap();
            let mut found = false;
            for set in tlogs.iter() {
                if set.locality == locality {
                    found = true;
                }
                set.log_routers.write().unwrap().clear();
            }
            if !found {
                pf_info!(sys.dbgid; "adding locality {} for old router recruitment at {}",
                         locality, last_start);
                tlogs.push(Arc::new(LogSet::stub(locality, last_start)));
            }
        }

        let tlogs = sys.tlogs.read().unwrap().clone();
        for set in tlogs.iter() {
            if set.locality == locality {
                let mut set_replies = vec![];
                for i in 0..sys.log_router_tags {
                    set_replies.push(recruit_log_router(
                        workers[next_router].clone(),
                        make_request(i, last_start),
                        window,
                    ));
                    next_router = (next_router + 1) % workers.len();
                }
                replies_per_set.push(set_replies);
            }
        }
    }

    {
        let generation_count = sys.old_log_data.read().unwrap().len();
        for gen_idx in 0..generation_count {
            let (gen_router_tags, max_start) = {
                let old_data = sys.old_log_data.read().unwrap();
                let old = &old_data[gen_idx];
                let mut max_start = 0;
                for set in &old.tlogs {
                    if set.is_local {
                        max_start = max_start.max(set.start_version);
                    }
                }
                (old.log_router_tags, max_start)
            };
            if gen_router_tags == 0 || max_start >= last_start {
                break;
            }
            last_start = start_version.max(max_start);

            {
                let mut old_data = sys.old_log_data.write().unwrap();
                let old = &mut old_data[gen_idx];
                let mut found = false;
                for set in &old.tlogs {
                    if set.locality == locality {
                        found = true;
                    }
                    set.log_routers.write().unwrap().clear();
                }
                if !found {
                    pf_info!(sys.dbgid; "adding locality {} to generation {} at {}",
                             locality, gen_idx, last_start);
                    old.tlogs.push(Arc::new(LogSet::stub(
                        locality, last_start,
                    )));
                }
            }

            let sets = sys.old_log_data.read().unwrap()[gen_idx]
                .tlogs
                .clone();
            for set in &sets {
                if set.locality == locality {
                    let mut set_replies = vec![];
                    for i in 0..gen_router_tags {
                        set_replies.push(recruit_log_router(
                            workers[next_router].clone(),
                            make_request(i, last_start),
                            window,
                        ));
                        next_router = (next_router + 1) % workers.len();
                    }
                    replies_per_set.push(set_replies);
                }
            }
        }
    }

    for set_replies in &replies_per_set {
        wait_all_recruited(set_replies).await?;
    }

    // installation walk
    let mut next_replies = 0;
    let mut last_start = Version::MAX;
    let mut failed_routers: Vec<TLogClient> = vec![];

    if !for_remote {
        let mut max_start = 0;
        let tlogs = sys.tlogs.read().unwrap().clone();
        for set in tlogs.iter() {
            if set.is_local {
                max_start = max_start.max(set.start_version);
            }
        }
        last_start = start_version.max(max_start);
        for set in tlogs.iter() {
            if set.locality == locality {
                for reply in &replies_per_set[next_replies] {
                    let client = reply.wait().await?;
                    set.log_routers.write().unwrap().push(AsyncVar::new(
                        OptionalInterface::present(client.clone()),
                    ));
                    failed_routers.push(client);
                }
                next_replies += 1;
            }
        }
    }

    {
        let old_data = sys.old_log_data.read().unwrap().clone();
        for old in old_data.iter() {
            let mut max_start = 0;
            for set in &old.tlogs {
                if set.is_local {
                    max_start = max_start.max(set.start_version);
                }
            }
            if old.log_router_tags == 0 || max_start >= last_start {
                break;
            }
            last_start = start_version.max(max_start);
            for set in &old.tlogs {
                if set.locality == locality {
                    for reply in &replies_per_set[next_replies] {
                        let client = reply.wait().await?;
                        set.log_routers.write().unwrap().push(AsyncVar::new(
                            OptionalInterface::present(client.clone()),
                        ));
                        if !for_remote {
                            failed_routers.push(client);
                        }
                    }
                    next_replies += 1;
                }
            }
        }
    }

    if !for_remote {
        sys.log_system_config_changed.trigger();
        if failed_routers.is_empty() {
            future::pending::<()>().await;
        }
        let waits: Vec<futures::future::BoxFuture<'_, ()>> = failed_routers
            .iter()
            .map(|client| {
                Box::pin(crate::interface::wait_failure_client(
                    client.api().clone(),
                    window,
                )) as futures::future::BoxFuture<'_, ()>
            })
            .collect();
        crate::utils::wait_for_any(waits).await;
        return Err(TaglogError::MasterLogFailed);
    }
    Ok(())
}
