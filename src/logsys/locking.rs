//! Locking a prior epoch's servers and computing the maximum safely-durable
//! version under replication and anti-quorum policies.

use std::sync::Arc;

use crate::interface::{
    LogServerHandle, TLogConfirmRunningRequest, TLogLockResult,
};
use crate::knobs::Knobs;
use crate::logset::LogSet;
use crate::policy::{validate_all_combinations, LocalityGroup};
use crate::tags::{Uid, Version};
use crate::utils::{
    quorum, wait_for_any, AsyncVar, Bitmap, Outcome, TaglogError,
};

use futures::future::{self, BoxFuture};

use super::TagPartitionedLogSystem;

/// Per-set locking state captured at epoch end: the set, one lock-reply cell
/// per server (aligned with `log_servers`), the version the set's epoch ends
/// at, and whether the set belongs to the current generation.
#[derive(Debug, Clone)]
pub struct LogLockInfo {
    pub epoch_end: Version,
    pub is_current: bool,
    pub log_set: Arc<LogSet>,
    pub replies: Vec<Outcome<TLogLockResult>>,
}

impl LogLockInfo {
    /// Issues a lock to every server of the set, capturing reply cells.
    pub(crate) fn lock_set(
        dbgid: Uid,
        log_set: &Arc<LogSet>,
        epoch_end: Version,
        is_current: bool,
    ) -> Self {
        let replies = log_set
            .log_servers
            .iter()
            .map(|h| Outcome::spawn(lock_tlog(dbgid, h.clone())))
            .collect();
        LogLockInfo {
            epoch_end,
            is_current,
            log_set: log_set.clone(),
            replies,
        }
    }
}

/// Locks one log server, retrying across address changes. A vanished peer
/// never completes here; other servers may carry the quorum.
pub(crate) async fn lock_tlog(
    my_id: Uid,
    tlog: LogServerHandle,
) -> TLogLockResult {
    pf_debug!(my_id; "locking log server {}", tlog.get().id());
    let mut watch = tlog.watch();
    loop {
        let value = watch.current();
        match value.interf() {
            Some(client) => {
                let api = client.api().clone();
                let reply = tokio::select! {
                    res = api.lock() => Some(res),
                    _ = watch.changed() => None,
                };
                match reply {
                    Some(Ok(data)) => {
                        pf_debug!(my_id; "locked log server {} at end {}",
                                  value.id(), data.end);
                        return data;
                    }
                    // the reply promise broke; wait for a rejoin
                    Some(Err(_)) => watch.changed().await,
                    None => {}
                }
            }
            None => watch.changed().await,
        }
    }
}

impl TagPartitionedLogSystem {
    /// Computes (known committed, end) for one locked set, or `None` while
    /// too few replies are in. With `last_end` set, only reports a result
    /// that would move the epoch end strictly downward.
    pub(crate) fn get_durable_version(
        dbgid: Uid,
        lock_info: &LogLockInfo,
        failed: &[AsyncVar<bool>],
        last_end: Option<Version>,
        knobs: &Knobs,
    ) -> Option<(Version, Version)> {
        let log_set = &lock_info.log_set;
        let n = log_set.server_count();
        // To ensure consistent recovery, the number of servers NOT in the
        // write quorum plus the number NOT in the read quorum must be
        // strictly less than the replication factor; otherwise a replica set
        // could exist consisting entirely of servers that are out of date
        // (excluded by the anti-quorum) or unavailable (excluded by the read
        // quorum). With N tlogs, W the anti-quorum, and F the replication
        // factor: W + (N - R) < F, optimally R = N + 1 - F + W.
        assert!(
            log_set.replication_factor >= 1
                && log_set.replication_factor <= n
        );
        assert!(log_set.anti_quorum < n);
        assert_eq!(n, lock_info.replies.len());
        let required_count =
            n + 1 + log_set.anti_quorum - log_set.replication_factor;
        assert!(required_count > 0 && required_count <= n);

        let mut results: Vec<TLogLockResult> = vec![];
        let mut available_items = vec![];
        let mut unresponsive = LocalityGroup::new();
        let mut server_state = String::new();
        for t in 0..n {
            let flagged_failed =
                failed.get(t).map(|f| f.get()).unwrap_or(false);
            match lock_info.replies[t].peek() {
                Some(reply) if !flagged_failed => {
                    results.push(reply);
                    available_items.push(log_set.localities[t].clone());
                    server_state.push('a');
                }
                _ => {
                    unresponsive.add(log_set.localities[t].clone());
                    server_state.push('f');
                }
            }
        }

        // not enough replies to clear the anti-quorum
        let mut too_many_failures = results.len() <= log_set.anti_quorum;

        // the failed servers alone could have carried a committed write
        too_many_failures = too_many_failures
            || (unresponsive.size() >= log_set.replication_factor
                && unresponsive.validate(&log_set.policy));

        // failed servers plus any anti-quorum-sized group of laggards could
        // have carried one
        if !too_many_failures
            && log_set.anti_quorum > 0
            && !validate_all_combinations(
                &log_set.policy,
                &unresponsive,
                &available_items,
                log_set.anti_quorum,
                false,
            )
        {
            pf_warn!(dbgid; "bad failure/laggard combination: required {} present {} state {}",
                     required_count, results.len(), server_state);
            too_many_failures = true;
        }

        if !too_many_failures {
            results.sort_by_key(|r| r.end);
            let absent = n - results.len();
            let new_safe_range_begin =
                log_set.anti_quorum.min(results.len() - 1);
            let safe_range_end =
                log_set.replication_factor as i64 - absent as i64;

            let moves_down = match last_end {
                None => true,
                Some(last) => {
                    safe_range_end > 0
                        && ((safe_range_end - 1) as usize) < results.len()
                        && results[(safe_range_end - 1) as usize].end < last
                }
            };
            if moves_down {
                let end = results[new_safe_range_begin].end;
                let mut known_committed_version =
                    end.saturating_sub(knobs.known_committed_bound());
                for r in &results {
                    known_committed_version =
                        known_committed_version.max(r.known_committed_version);
                }
                pf_debug!(dbgid; "durable version: required {} present {} state {} end {} kcv {}",
                          required_count, results.len(), server_state, end,
                          known_committed_version);
                return Some((known_committed_version, end));
            }
        }
        pf_debug!(dbgid; "durable version waiting: required {} present {} state {}",
                  required_count, results.len(), server_state);
        None
    }

    /// A future that settles when anything relevant to the durable-version
    /// computation of this set changes: a pending reply settles, or a
    /// settled server's handle or failure flag flips. Subscriptions are
    /// taken when this is *called*, so changes racing with a computation
    /// made just before are never missed.
    pub(crate) fn get_durable_version_changed<'a>(
        lock_info: &'a LogLockInfo,
        failed: &'a [AsyncVar<bool>],
    ) -> BoxFuture<'a, ()> {
        let mut pending_replies = vec![];
        let mut handle_watches = vec![];
        let mut flag_watches = vec![];
        for j in 0..lock_info.log_set.server_count() {
            let reply = &lock_info.replies[j];
            if !reply.is_ready() {
                pending_replies.push(reply);
            } else {
                handle_watches
                    .push(lock_info.log_set.log_servers[j].watch());
                if let Some(f) = failed.get(j) {
                    flag_watches.push(f.watch());
                }
            }
        }
        Box::pin(async move {
            let mut changes: Vec<BoxFuture<'_, ()>> = vec![];
            for reply in pending_replies {
                changes.push(Box::pin(async move {
                    let _ = reply.wait().await;
                }));
            }
            for watch in handle_watches.iter_mut() {
                changes.push(Box::pin(watch.changed()));
            }
            for watch in flag_watches.iter_mut() {
                changes.push(Box::pin(watch.changed()));
            }
            debug_assert!(!changes.is_empty());
            wait_for_any(changes).await;
        })
    }

    /// Completes once every local set has a policy-satisfying cohort of
    /// servers acknowledging they still accept commits for this epoch.
    pub async fn confirm_epoch_live(
        &self,
        debug_id: Option<Uid>,
    ) -> Result<(), TaglogError> {
        let sets: Vec<Arc<LogSet>> = self
            .tlogs
            .read()
            .unwrap()
            .iter()
            .filter(|s| s.is_local && s.server_count() > 0)
            .cloned()
            .collect();
        let checks = sets
            .iter()
            .map(|s| confirm_epoch_live_internal(s.clone(), debug_id));
        future::try_join_all(checks).await?;
        Ok(())
    }

    /// Locks every server in every current set; used by master takeover.
    pub async fn end_epoch(&self) -> Result<(), TaglogError> {
        let handles: Vec<LogServerHandle> = self
            .tlogs
            .read()
            .unwrap()
            .iter()
            .flat_map(|s| s.log_servers.iter().cloned())
            .collect();
        let dbgid = self.dbgid;
        future::join_all(handles.into_iter().map(|h| lock_tlog(dbgid, h)))
            .await;
        Ok(())
    }
}

/// One set's liveness confirmation: fires confirm-running at every present
/// server, then waits until the acknowledged cohort satisfies the policy. A
/// stopped server means the epoch has ended, so the future parks forever.
async fn confirm_epoch_live_internal(
    log_set: Arc<LogSet>,
    debug_id: Option<Uid>,
) -> Result<(), TaglogError> {
    let mut alive: Vec<Option<Outcome<Result<(), TaglogError>>>> = vec![];
    let mut num_present: usize = 0;
    for handle in &log_set.log_servers {
        let value = handle.get();
        match value.interf() {
            Some(client) => {
                num_present += 1;
                let api = client.api().clone();
                alive.push(Some(Outcome::spawn(async move {
                    api.confirm_running(TLogConfirmRunningRequest {
                        debug_id,
                    })
                    .await
                })));
            }
            None => alive.push(None),
        }
    }

    // settle barrier: wait for a plain count quorum of acknowledgments
    // before consulting the policy; absent servers never settle and never
    // count against it
    let needed = log_set
        .replication_factor
        .min(num_present.saturating_sub(log_set.anti_quorum));
    let barrier: Vec<BoxFuture<'_, Result<(), TaglogError>>> = alive
        .iter()
        .map(|cell| match cell {
            Some(cell) => {
                Box::pin(cell.wait())
                    as BoxFuture<'_, Result<(), TaglogError>>
            }
            None => Box::pin(future::pending::<Result<(), TaglogError>>())
                as BoxFuture<'_, Result<(), TaglogError>>,
        })
        .collect();
    quorum(barrier, needed).await?;

    let mut responded = Bitmap::new(log_set.server_count(), false);
    let mut locked = LocalityGroup::new();
    loop {
        let mut saw_stopped = false;
        let mut last_error = None;
        let mut waiting = vec![];
        for (i, cell) in alive.iter().enumerate() {
            let Some(cell) = cell else { continue };
            match cell.peek() {
                Some(Ok(())) => {
                    if !responded.get(i)? {
                        locked.add(log_set.localities[i].clone());
                        responded.set(i, true)?;
                    }
                }
                Some(Err(TaglogError::LogServerStopped)) => {
                    saw_stopped = true;
                }
                Some(Err(e)) => last_error = Some(e),
                None => waiting.push(cell.clone()),
            }
        }

        // We intentionally skip considering anti-quorums here, as the cost
        // of doing so is prohibitive.
        if locked.validate(&log_set.policy) {
            return Ok(());
        }
        if saw_stopped {
            // all commits must go to all servers; if any is stopped, the
            // epoch has ended
            future::pending::<()>().await;
        }
        if waiting.is_empty() {
            // every reply is in and the cohort still cannot validate
            return Err(last_error.unwrap_or(TaglogError::MasterLogFailed));
        }
        let waits: Vec<BoxFuture<'_, ()>> = waiting
            .iter()
            .map(|c| {
                Box::pin(async move {
                    let _ = c.wait().await;
                }) as BoxFuture<'_, ()>
            })
            .collect();
        wait_for_any(waits).await;
    }
}
