//! Push path: replicate a commit batch to all local replica sets, each set
//! acknowledging at its write quorum.

use std::future::Future;

use crate::tags::{Uid, Version};
use crate::utils::{quorum, TaglogError};

use crate::interface::TLogCommitRequest;

use bytes::Bytes;

use futures::future::{self, BoxFuture, FutureExt, Shared};

use super::TagPartitionedLogSystem;

/// A commit batch serialized once per push location (see
/// `get_push_locations`).
#[derive(Debug, Clone, Default)]
pub struct LogPushData {
    messages: Vec<Bytes>,
}

impl LogPushData {
    /// An empty batch sized for the given number of push locations.
    pub fn new(locations: usize) -> Self {
        LogPushData {
            messages: vec![Bytes::new(); locations],
        }
    }

    /// Installs the serialized slice for one location.
    pub fn set_message(&mut self, location: usize, bytes: Bytes) {
        if location >= self.messages.len() {
            self.messages.resize(location + 1, Bytes::new());
        }
        self.messages[location] = bytes;
    }

    /// The slice destined for one location (empty if none was set).
    pub fn messages_for(&self, location: usize) -> Bytes {
        self.messages.get(location).cloned().unwrap_or_default()
    }
}

/// Maps commit failures at the call site: a vanished peer is fatal to the
/// epoch, a stopped server or cancellation stays silent, anything else is
/// logged before rethrowing.
async fn report_tlog_commit_errors<F>(
    commit_reply: F,
    debug_id: Uid,
) -> Result<(), TaglogError>
where
    F: Future<Output = Result<(), TaglogError>>,
{
    match commit_reply.await {
        Ok(()) => Ok(()),
        Err(TaglogError::BrokenPromise) => Err(TaglogError::MasterLogFailed),
        Err(e @ TaglogError::LogServerStopped)
        | Err(e @ TaglogError::Cancelled) => Err(e),
        Err(e) => {
            pf_error!(debug_id; "log server commit request error: {}", e);
            Err(e)
        }
    }
}

type SharedCommit = Shared<BoxFuture<'static, Result<(), TaglogError>>>;

impl TagPartitionedLogSystem {
    /// Replicates one version batch to every local set concurrently,
    /// completing once each set has `N - A` acknowledgments. The same commit
    /// futures feed the background collection so unhandled failures surface
    /// in `on_error`.
    pub async fn push(
        &self,
        prev_version: Version,
        version: Version,
        known_committed_version: Version,
        data: &LogPushData,
        debug_id: Option<Uid>,
    ) -> Result<(), TaglogError> {
        let mut quorum_results = vec![];
        let mut location = 0;
        for set in self.tlogs.read().unwrap().iter() {
            if !set.is_local || set.server_count() == 0 {
                continue;
            }
            let mut commit_results: Vec<SharedCommit> = vec![];
            for handle in &set.log_servers {
                let req = TLogCommitRequest {
                    prev_version,
                    version,
                    known_committed_version,
                    messages: data.messages_for(location),
                    debug_id,
                };
                let value = handle.get();
                let dbgid = self.get_debug_id();
                let commit_message: SharedCommit = async move {
                    let reply = async {
                        match value.interf() {
                            Some(client) => {
                                client.api().commit(req).await
                            }
                            // the peer is gone; treated exactly like a
                            // broken reply promise
                            None => Err(TaglogError::BrokenPromise),
                        }
                    };
                    report_tlog_commit_errors(reply, dbgid).await
                }
                .boxed()
                .shared();
                self.actors.add(commit_message.clone());
                commit_results.push(commit_message);
                location += 1;
            }
            let write_quorum = commit_results.len() - set.anti_quorum;
            quorum_results.push(quorum(commit_results, write_quorum));
        }

        future::try_join_all(quorum_results).await?;
        Ok(())
    }
}
