//! Mock log servers and workers shared by the async test modules.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::interface::{
    InitializeLogRouterRequest, InitializeTLogRequest, LogServerApi,
    LogServerHandle, OptionalInterface, TLogClient, TLogCommitRequest,
    TLogConfirmRunningRequest, TLogLockResult, TLogPopRequest,
    TLogRecoveryFinishedRequest, WorkerApi,
};
use crate::policy::{LocalityData, LOC_ZONEID};
use crate::tags::Uid;
use crate::utils::{AsyncVar, TaglogError};

use async_trait::async_trait;

use futures::future;

use tokio::time;

/// A scripted log server. Fields are plain mutexes so tests can adjust
/// behavior mid-flight and inspect what was recorded.
pub(crate) struct MockTLog {
    id: Uid,
    locality: LocalityData,
    /// `None` makes lock requests hang forever (an unreachable server).
    pub lock_result: Mutex<Option<Result<TLogLockResult, TaglogError>>>,
    pub commit_result: Mutex<Result<(), TaglogError>>,
    pub confirm_result: Mutex<Result<(), TaglogError>>,
    pub commits: Mutex<Vec<TLogCommitRequest>>,
    pub pops: Mutex<Vec<TLogPopRequest>>,
    pub confirms: AtomicUsize,
    pub recovery_finishes: AtomicUsize,
    pub alive: AtomicBool,
}

impl MockTLog {
    pub fn new(id: Uid, zone: &str) -> Arc<Self> {
        Arc::new(MockTLog {
            id,
            locality: LocalityData::new().with(LOC_ZONEID, zone),
            lock_result: Mutex::new(None),
            commit_result: Mutex::new(Ok(())),
            confirm_result: Mutex::new(Ok(())),
            commits: Mutex::new(vec![]),
            pops: Mutex::new(vec![]),
            confirms: AtomicUsize::new(0),
            recovery_finishes: AtomicUsize::new(0),
            alive: AtomicBool::new(true),
        })
    }

    /// A server whose lock reply is preloaded.
    pub fn with_lock(id: Uid, zone: &str, end: u64, kcv: u64) -> Arc<Self> {
        let t = Self::new(id, zone);
        *t.lock_result.lock().unwrap() = Some(Ok(TLogLockResult {
            end,
            known_committed_version: kcv,
        }));
        t
    }

    pub fn client(self: &Arc<Self>) -> TLogClient {
        TLogClient::new(self.clone() as Arc<dyn LogServerApi>)
    }

    pub fn handle(self: &Arc<Self>) -> LogServerHandle {
        AsyncVar::new(OptionalInterface::present(self.client()))
    }

    pub fn popped(&self) -> Vec<TLogPopRequest> {
        self.pops.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogServerApi for MockTLog {
    fn id(&self) -> Uid {
        self.id
    }

    fn locality(&self) -> LocalityData {
        self.locality.clone()
    }

    async fn commit(&self, req: TLogCommitRequest) -> Result<(), TaglogError> {
        self.commits.lock().unwrap().push(req);
        self.commit_result.lock().unwrap().clone()
    }

    async fn lock(&self) -> Result<TLogLockResult, TaglogError> {
        let scripted = self.lock_result.lock().unwrap().clone();
        match scripted {
            Some(res) => res,
            None => future::pending().await,
        }
    }

    async fn pop(&self, req: TLogPopRequest) -> Result<(), TaglogError> {
        self.pops.lock().unwrap().push(req);
        Ok(())
    }

    async fn confirm_running(
        &self,
        _req: TLogConfirmRunningRequest,
    ) -> Result<(), TaglogError> {
        self.confirms.fetch_add(1, Ordering::SeqCst);
        self.confirm_result.lock().unwrap().clone()
    }

    async fn recovery_finished(
        &self,
        _req: TLogRecoveryFinishedRequest,
    ) -> Result<(), TaglogError> {
        self.recovery_finishes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn wait_failure(&self) -> Result<(), TaglogError> {
        if self.alive.load(Ordering::SeqCst) {
            time::sleep(Duration::from_millis(10)).await;
            Ok(())
        } else {
            Err(TaglogError::BrokenPromise)
        }
    }
}

/// A recruitable worker that spins up mock log servers on demand.
pub(crate) struct MockWorker {
    locality: LocalityData,
    pub tlog_requests: Mutex<Vec<InitializeTLogRequest>>,
    pub router_requests: Mutex<Vec<InitializeLogRouterRequest>>,
    pub spawned: Mutex<Vec<Arc<MockTLog>>>,
}

impl MockWorker {
    pub fn new(zone: &str) -> Arc<Self> {
        Arc::new(MockWorker {
            locality: LocalityData::new().with(LOC_ZONEID, zone),
            tlog_requests: Mutex::new(vec![]),
            router_requests: Mutex::new(vec![]),
            spawned: Mutex::new(vec![]),
        })
    }

    fn spawn_tlog(&self) -> TLogClient {
        let zone = self.locality.get(LOC_ZONEID).unwrap_or("z?");
        let tlog = MockTLog::new(Uid::random(), zone);
        let client = tlog.client();
        self.spawned.lock().unwrap().push(tlog);
        client
    }
}

#[async_trait]
impl WorkerApi for MockWorker {
    fn locality(&self) -> LocalityData {
        self.locality.clone()
    }

    async fn init_tlog(
        &self,
        req: InitializeTLogRequest,
    ) -> Result<TLogClient, TaglogError> {
        self.tlog_requests.lock().unwrap().push(req);
        Ok(self.spawn_tlog())
    }

    async fn init_log_router(
        &self,
        req: InitializeLogRouterRequest,
    ) -> Result<TLogClient, TaglogError> {
        self.router_requests.lock().unwrap().push(req);
        Ok(self.spawn_tlog())
    }
}
