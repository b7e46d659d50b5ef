//! Interfaces to log servers, log routers, and recruitable workers, plus the
//! wire message shapes exchanged with them. The RPC transport itself lives
//! outside this crate; these traits are the seam it plugs into. A handle to a
//! server is an observable cell whose value changes when the server rejoins
//! under a new address, so every holder sees updates coherently.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::policy::{LocalityData, ReplicationPolicy};
use crate::tags::{LogEpoch, Tag, TagLocality, Uid, Version};
use crate::utils::{AsyncVar, TaglogError};

use async_trait::async_trait;

use bytes::Bytes;

use get_size::GetSize;

use serde::{Deserialize, Serialize};

use tokio::sync::oneshot;
use tokio::time;

use std::future::Future;

/// Result of locking a log server at epoch end: `end` is one past the last
/// version the server will ever accept in the prior epoch.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, GetSize,
)]
pub struct TLogLockResult {
    pub end: Version,
    pub known_committed_version: Version,
}

/// Commit of one version batch to one log server. `messages` is the slice of
/// the batch serialized for this server's push location.
#[derive(Debug, Clone)]
pub struct TLogCommitRequest {
    pub prev_version: Version,
    pub version: Version,
    pub known_committed_version: Version,
    pub messages: Bytes,
    pub debug_id: Option<Uid>,
}

impl GetSize for TLogCommitRequest {
    fn get_heap_size(&self) -> usize {
        self.messages.len()
    }
}

/// Lazy storage-bound advance of a tag's pop point on one server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, GetSize,
)]
pub struct TLogPopRequest {
    pub up_to: Version,
    pub known_committed_version: Version,
    pub tag: Tag,
}

/// Liveness probe answered only while the server still accepts commits for
/// the current epoch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, GetSize)]
pub struct TLogConfirmRunningRequest {
    pub debug_id: Option<Uid>,
}

/// Acknowledged once the server has caught up with its recovered prefix.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, GetSize)]
pub struct TLogRecoveryFinishedRequest;

/// On-disk store kind a recruited log server should use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, GetSize,
)]
pub enum StoreType {
    Ssd,
    Memory,
}

/// Recruitment request turning a worker into a log server of the new epoch.
#[derive(Debug, Clone)]
pub struct InitializeTLogRequest {
    pub recruitment_id: Uid,
    pub store_type: StoreType,
    pub recover_from: crate::corestate::LogSystemConfig,
    pub recover_at: Version,
    pub known_committed_version: Version,
    pub epoch: LogEpoch,
    pub locality: TagLocality,
    pub remote_tag: Tag,
    pub is_primary: bool,
    pub all_tags: Vec<Tag>,
    pub start_version: Version,
    pub log_router_tags: usize,
    pub recover_tags: Vec<Tag>,
}

/// Recruitment request turning a worker into a log router.
#[derive(Debug, Clone)]
pub struct InitializeLogRouterRequest {
    pub recovery_count: LogEpoch,
    pub router_tag: Tag,
    pub start_version: Version,
    pub tlog_localities: Vec<LocalityData>,
    pub tlog_policy: ReplicationPolicy,
    pub has_best_policy: crate::logset::BestPolicy,
    pub locality: TagLocality,
}

/// A surviving log server announcing its (possibly new) interface. The reply
/// tells it whether to stand down (`true`) or that it is recognized
/// (`false`).
#[derive(Debug)]
pub struct TLogRejoinRequest {
    pub interf: TLogClient,
    pub reply: oneshot::Sender<bool>,
}

/// The RPC surface of one log server (or log router). Implemented by the
/// transport layer in production and by mocks in tests.
#[async_trait]
pub trait LogServerApi: Send + Sync {
    fn id(&self) -> Uid;

    fn locality(&self) -> LocalityData;

    async fn commit(&self, req: TLogCommitRequest) -> Result<(), TaglogError>;

    async fn lock(&self) -> Result<TLogLockResult, TaglogError>;

    async fn pop(&self, req: TLogPopRequest) -> Result<(), TaglogError>;

    async fn confirm_running(
        &self,
        req: TLogConfirmRunningRequest,
    ) -> Result<(), TaglogError>;

    async fn recovery_finished(
        &self,
        req: TLogRecoveryFinishedRequest,
    ) -> Result<(), TaglogError>;

    /// One failure-detector heartbeat round: `Ok` means the server answered
    /// (still alive); an error means the peer is gone.
    async fn wait_failure(&self) -> Result<(), TaglogError>;
}

/// A connected log-server endpoint.
#[derive(Clone)]
pub struct TLogClient {
    api: Arc<dyn LogServerApi>,
}

impl TLogClient {
    pub fn new(api: Arc<dyn LogServerApi>) -> Self {
        TLogClient { api }
    }

    pub fn id(&self) -> Uid {
        self.api.id()
    }

    pub fn locality(&self) -> LocalityData {
        self.api.locality()
    }

    pub fn api(&self) -> &Arc<dyn LogServerApi> {
        &self.api
    }

    /// True if both clients speak to the same endpoint instance.
    pub fn same_endpoint(&self, other: &TLogClient) -> bool {
        Arc::ptr_eq(&self.api, &other.api)
    }
}

impl fmt::Debug for TLogClient {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TLogClient({})", self.id())
    }
}

/// A log-server handle value: the id is always known, the connected client
/// only while the server is reachable under a known address.
#[derive(Debug, Clone)]
pub struct OptionalInterface {
    id: Uid,
    interf: Option<TLogClient>,
}

impl OptionalInterface {
    pub fn present(client: TLogClient) -> Self {
        OptionalInterface {
            id: client.id(),
            interf: Some(client),
        }
    }

    pub fn id_only(id: Uid) -> Self {
        OptionalInterface { id, interf: None }
    }

    pub fn id(&self) -> Uid {
        self.id
    }

    pub fn interf(&self) -> Option<&TLogClient> {
        self.interf.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.interf.is_some()
    }
}

/// Observable handle to a log server; rejoins swap the value in place.
pub type LogServerHandle = AsyncVar<OptionalInterface>;

/// The RPC surface of a recruitable stateless worker.
#[async_trait]
pub trait WorkerApi: Send + Sync {
    fn locality(&self) -> LocalityData;

    async fn init_tlog(
        &self,
        req: InitializeTLogRequest,
    ) -> Result<TLogClient, TaglogError>;

    async fn init_log_router(
        &self,
        req: InitializeLogRouterRequest,
    ) -> Result<TLogClient, TaglogError>;
}

/// Shared worker endpoint handle.
pub type WorkerClient = Arc<dyn WorkerApi>;

/// Workers recruited in the primary region for a new epoch.
#[derive(Clone)]
pub struct RecruitFromConfigurationReply {
    pub tlogs: Vec<WorkerClient>,
    pub satellite_tlogs: Vec<WorkerClient>,
    pub old_log_routers: Vec<WorkerClient>,
    pub dc_id: String,
}

/// Workers recruited in the remote region.
#[derive(Clone)]
pub struct RecruitRemoteFromConfigurationReply {
    pub remote_tlogs: Vec<WorkerClient>,
    pub log_routers: Vec<WorkerClient>,
}

/// Bounds an RPC reply by the failure window; silence becomes `Timeout`.
pub async fn reply_unless_failed_for<T, F>(
    fut: F,
    window_secs: f64,
) -> Result<T, TaglogError>
where
    F: Future<Output = Result<T, TaglogError>>,
{
    match time::timeout(Duration::from_secs_f64(window_secs), fut).await {
        Ok(res) => res,
        Err(_) => Err(TaglogError::Timeout),
    }
}

/// Replaces every error except cancellation with the given one.
pub async fn transform_errors<T, F>(
    fut: F,
    err: TaglogError,
) -> Result<T, TaglogError>
where
    F: Future<Output = Result<T, TaglogError>>,
{
    match fut.await {
        Ok(v) => Ok(v),
        Err(TaglogError::Cancelled) => Err(TaglogError::Cancelled),
        Err(_) => Err(err),
    }
}

/// Completes once the server is considered failed: a heartbeat error, or a
/// full window of silence.
pub async fn wait_failure_client(api: Arc<dyn LogServerApi>, window_secs: f64) {
    let window = Duration::from_secs_f64(window_secs);
    loop {
        match time::timeout(window, api.wait_failure()).await {
            Ok(Ok(())) => continue, // heartbeat: still alive
            Ok(Err(_)) | Err(_) => return,
        }
    }
}

/// Never returns; maintains a failure flag for the server, flipping it back
/// to false if heartbeats resume.
pub async fn wait_failure_tracker(
    api: Arc<dyn LogServerApi>,
    failed: AsyncVar<bool>,
    window_secs: f64,
) {
    let window = Duration::from_secs_f64(window_secs);
    loop {
        match time::timeout(window, api.wait_failure()).await {
            Ok(Ok(())) => {
                if failed.get() {
                    failed.set(false);
                }
            }
            Ok(Err(_)) | Err(_) => {
                if !failed.get() {
                    failed.set(true);
                }
                // re-probe after a full window in case the server comes back
                time::sleep(window).await;
            }
        }
    }
}
