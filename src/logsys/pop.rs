//! Pop coalescing: bounds log-server storage by lazily propagating per-tag
//! pop points, with at most one outstanding pop task per (server, tag) and
//! monotone advancement of the requested version.

use std::sync::Arc;
use std::time::Duration;

use crate::interface::{LogServerHandle, TLogPopRequest};
use crate::tags::{Tag, TagLocality, Version};
use crate::utils::TaglogError;

use tokio::time;

use super::TagPartitionedLogSystem;

impl TagPartitionedLogSystem {
    /// Advances the pop point of `tag` to `up_to` on every relevant server.
    /// Fire-and-forget, idempotent, and monotone: an outstanding request is
    /// upgraded in place rather than duplicated.
    pub fn pop(
        &self,
        up_to: Version,
        tag: Tag,
        known_committed_version: Version,
        pop_locality: TagLocality,
    ) {
        if up_to == 0 {
            return;
        }
        if tag.locality == TagLocality::RemoteLog {
            self.pop_log_router(up_to, tag, known_committed_version, pop_locality);
            return;
        }
        debug_assert!(pop_locality == TagLocality::Invalid);
        for set in self.tlogs.read().unwrap().iter() {
            for handle in &set.log_servers {
                self.queue_pop(
                    handle.clone(),
                    tag,
                    up_to,
                    known_committed_version,
                    self.knobs.pop_delay,
                );
            }
        }
    }

    /// Pops the log routers of every generation whose set carries
    /// `pop_locality`. Routers hold only seconds of data, so their pops are
    /// not delayed.
    fn pop_log_router(
        &self,
        up_to: Version,
        tag: Tag,
        known_committed_version: Version,
        pop_locality: TagLocality,
    ) {
        for set in self.tlogs.read().unwrap().iter() {
            if set.locality == pop_locality {
                for router in set.routers() {
                    self.queue_pop(
                        router,
                        tag,
                        up_to,
                        known_committed_version,
                        self.knobs.router_pop_delay,
                    );
                }
            }
        }

        for old in self.old_log_data.read().unwrap().iter() {
            for set in &old.tlogs {
                if set.locality == pop_locality {
                    for router in set.routers() {
                        self.queue_pop(
                            router,
                            tag,
                            up_to,
                            known_committed_version,
                            self.knobs.router_pop_delay,
                        );
                    }
                }
            }
        }
    }

    /// Installs or upgrades the outstanding pop for (server, tag), spawning
    /// the sender task only when none is running.
    fn queue_pop(
        &self,
        log: LogServerHandle,
        tag: Tag,
        up_to: Version,
        known_committed_version: Version,
        delay_secs: f64,
    ) {
        let key = (log.get().id(), tag);
        let prev = {
            let mut pops = self.outstanding_pops.lock().unwrap();
            let prev = pops.get(&key).map(|p| p.0).unwrap_or(0);
            if prev < up_to {
                pops.insert(key, (up_to, known_committed_version));
            }
            prev
        };
        if prev == 0 {
            let sys = self.arc_self();
            self.actors
                .add(pop_from_log(sys, log, tag, delay_secs));
        }
    }
}

/// One running pop task: sleep, read the latest requested pop point, send it,
/// and exit once nothing newer is pending. On failure the entry is left in
/// place so no further pops target this server from this log system.
async fn pop_from_log(
    sys: Arc<TagPartitionedLogSystem>,
    log: LogServerHandle,
    tag: Tag,
    delay_secs: f64,
) -> Result<(), TaglogError> {
    let mut last: Version = 0;
    loop {
        time::sleep(Duration::from_secs_f64(delay_secs)).await;

        let key = (log.get().id(), tag);
        let to = sys
            .outstanding_pops
            .lock()
            .unwrap()
            .get(&key)
            .copied()
            .unwrap_or((0, 0));

        if to.0 <= last {
            sys.outstanding_pops.lock().unwrap().remove(&key);
            return Ok(());
        }

        let value = log.get();
        let client = match value.interf() {
            Some(client) => client.clone(),
            None => return Ok(()),
        };
        match client
            .api()
            .pop(TLogPopRequest {
                up_to: to.0,
                known_committed_version: to.1,
                tag,
            })
            .await
        {
            Ok(()) => {
                last = to.0;
            }
            Err(TaglogError::Cancelled) => return Err(TaglogError::Cancelled),
            Err(TaglogError::BrokenPromise) => {
                pf_info!(sys.dbgid; "pop lost log server {}", value.id());
                return Ok(());
            }
            Err(e) => {
                pf_error!(sys.dbgid; "pop error on log server {}: {}",
                          value.id(), e);
                return Ok(());
            }
        }
    }
}
