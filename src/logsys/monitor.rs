//! Liveness monitor: composes per-server failure watches over every present
//! handle (absent handles are watched for reappearance instead), folds in
//! remote-recovery progress and background-task errors, and turns any
//! failure into the fatal signal the cluster controller recovers on.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::interface::{wait_failure_client, LogServerApi, LogServerHandle};
use crate::utils::{wait_for_any, TaglogError};

use futures::future::BoxFuture;

use super::TagPartitionedLogSystem;

impl TagPartitionedLogSystem {
    /// Never completes normally; resolves with the fatal error once the
    /// subsystem stops working. The watch set is rebuilt whenever a handle
    /// appears or disappears.
    pub async fn on_error(&self) -> TaglogError {
        loop {
            let mut watched_apis: Vec<Arc<dyn LogServerApi>> = vec![];
            let mut absent_handles: Vec<LogServerHandle> = vec![];

            let mut classify = |handle: &LogServerHandle| {
                match handle.get().interf() {
                    Some(client) => watched_apis.push(client.api().clone()),
                    None => absent_handles.push(handle.clone()),
                }
            };
            for set in self.tlogs.read().unwrap().iter() {
                for handle in &set.log_servers {
                    classify(handle);
                }
                for handle in set.routers() {
                    classify(&handle);
                }
            }
            for old in self.old_log_data.read().unwrap().iter() {
                for set in &old.tlogs {
                    for handle in set.routers() {
                        classify(&handle);
                    }
                }
            }

            let remote_recovery = self.remote_recovery.lock().unwrap().clone();
            let mut watch_remote = false;
            if self.has_remote_servers.load(Ordering::SeqCst) {
                if let Some(rr) = &remote_recovery {
                    match rr.peek() {
                        Some(Err(e)) => return e,
                        Some(Ok(())) => {}
                        None => watch_remote = true,
                    }
                }
            }

            let window = self.knobs.tlog_timeout;
            let any_change = async {
                let mut waits: Vec<BoxFuture<'_, ()>> = absent_handles
                    .iter()
                    .map(|h| Box::pin(h.on_change()) as BoxFuture<'_, ()>)
                    .collect();
                if watch_remote {
                    if let Some(rr) = &remote_recovery {
                        waits.push(Box::pin(async move {
                            let _ = rr.wait().await;
                        }));
                    }
                }
                wait_for_any(waits).await;
            };
            let any_failure = async {
                let waits: Vec<BoxFuture<'_, ()>> = watched_apis
                    .iter()
                    .map(|api| {
                        Box::pin(wait_failure_client(api.clone(), window))
                            as BoxFuture<'_, ()>
                    })
                    .collect();
                wait_for_any(waits).await;
            };

            tokio::select! {
                _ = any_change => {} // rebuild the watch set
                _ = any_failure => return TaglogError::MasterLogFailed,
                e = self.actors.first_error() => return e,
            }
        }
    }
}

#[cfg(test)]
mod monitor_tests {
    use super::*;
    use crate::knobs::Knobs;
    use crate::logset::{BestPolicy, LogSet};
    use crate::policy::{LocalityData, ReplicationPolicy, LOC_ZONEID};
    use crate::tags::{TagLocality, Uid};
    use crate::testutil::MockTLog;
    use std::sync::RwLock;
    use std::time::Duration;
    use tokio::time;

    fn watched_system(
        mocks: &[std::sync::Arc<MockTLog>],
    ) -> Arc<TagPartitionedLogSystem> {
        let mut sys = TagPartitionedLogSystem::new(
            Uid::random(),
            LocalityData::new(),
            Arc::new(Knobs {
                tlog_timeout: 0.05,
                ..Knobs::default()
            }),
        );
        sys.tlogs = RwLock::new(vec![Arc::new(LogSet {
            log_servers: mocks.iter().map(|m| m.handle()).collect(),
            log_routers: RwLock::new(vec![]),
            replication_factor: mocks.len(),
            anti_quorum: 0,
            policy: ReplicationPolicy::across(mocks.len(), LOC_ZONEID),
            localities: (0..mocks.len())
                .map(|i| {
                    LocalityData::new().with(LOC_ZONEID, &format!("z{}", i))
                })
                .collect(),
            is_local: true,
            has_best_policy: BestPolicy::Id,
            locality: TagLocality::Primary,
            start_version: 1,
        })]);
        sys.into_arc()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn healthy_servers_keep_it_pending() {
        let mocks: Vec<_> = (0..2)
            .map(|i| MockTLog::new(Uid(i, 0), &format!("z{}", i)))
            .collect();
        let sys = watched_system(&mocks);
        let res =
            time::timeout(Duration::from_millis(200), sys.on_error()).await;
        assert!(res.is_err(), "no failure should surface while healthy");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_server_is_fatal() {
        let mocks: Vec<_> = (0..2)
            .map(|i| MockTLog::new(Uid(i, 0), &format!("z{}", i)))
            .collect();
        let sys = watched_system(&mocks);
        let monitor = {
            let sys = sys.clone();
            tokio::spawn(async move { sys.on_error().await })
        };
        time::sleep(Duration::from_millis(30)).await;
        mocks[1]
            .alive
            .store(false, std::sync::atomic::Ordering::SeqCst);
        let err = time::timeout(Duration::from_secs(5), monitor)
            .await
            .expect("failure must surface")
            .unwrap();
        assert_eq!(err, TaglogError::MasterLogFailed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn background_task_errors_surface() {
        let mocks: Vec<_> = (0..2)
            .map(|i| MockTLog::new(Uid(i, 0), &format!("z{}", i)))
            .collect();
        let sys = watched_system(&mocks);
        sys.actors.add(async {
            time::sleep(Duration::from_millis(20)).await;
            Err(TaglogError::MasterRecoveryFailed)
        });
        let err = time::timeout(Duration::from_secs(5), sys.on_error())
            .await
            .expect("actor error must surface");
        assert_eq!(err, TaglogError::MasterRecoveryFailed);
    }
}
