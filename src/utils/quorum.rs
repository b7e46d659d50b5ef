//! Future combinators for quorum waits over homogeneous reply sets.

use std::future::Future;

use crate::utils::TaglogError;

use futures::future::{self, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};

/// Completes `Ok(())` once `count` of the futures have succeeded; completes
/// with the latest error once so many have failed that `count` successes are
/// no longer possible. `count == 0` succeeds immediately.
pub async fn quorum<F>(futs: Vec<F>, count: usize) -> Result<(), TaglogError>
where
    F: Future<Output = Result<(), TaglogError>> + Send,
{
    if count == 0 {
        return Ok(());
    }
    let total = futs.len();
    if count > total {
        return Err(TaglogError::Msg(format!(
            "quorum of {} impossible among {} futures",
            count, total
        )));
    }

    let mut pending: FuturesUnordered<F> = futs.into_iter().collect();
    let mut successes = 0;
    let mut failures = 0;
    while let Some(res) = pending.next().await {
        match res {
            Ok(()) => {
                successes += 1;
                if successes >= count {
                    return Ok(());
                }
            }
            Err(e) => {
                failures += 1;
                if failures > total - count {
                    return Err(e);
                }
            }
        }
    }
    unreachable!("quorum bookkeeping exhausted futures without deciding");
}

/// Completes when any of the futures completes. An empty list never
/// completes (callers watching for changes treat "nothing to watch" as
/// "nothing will change").
pub async fn wait_for_any(futs: Vec<BoxFuture<'_, ()>>) {
    if futs.is_empty() {
        future::pending::<()>().await;
    } else {
        future::select_all(futs).await;
    }
}

#[cfg(test)]
mod quorum_tests {
    use super::*;
    use futures::FutureExt;
    use tokio::time::{self, Duration};

    async fn ok_after(ms: u64) -> Result<(), TaglogError> {
        time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }

    async fn err_after(ms: u64) -> Result<(), TaglogError> {
        time::sleep(Duration::from_millis(ms)).await;
        Err(TaglogError::BrokenPromise)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn quorum_reached() -> Result<(), TaglogError> {
        // third future would err at 50ms, but two successes land first
        quorum(
            vec![ok_after(5).boxed(), ok_after(10).boxed(), err_after(50).boxed()],
            2,
        )
        .await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn quorum_impossible() {
        let res = quorum(
            vec![ok_after(5).boxed(), err_after(10).boxed(), err_after(15).boxed()],
            3,
        )
        .await;
        assert_eq!(res, Err(TaglogError::BrokenPromise));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn quorum_zero_trivial() -> Result<(), TaglogError> {
        quorum(Vec::<BoxFuture<'static, Result<(), TaglogError>>>::new(), 0)
            .await
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn any_of_mixed() {
        let fast = async {
            time::sleep(Duration::from_millis(5)).await;
        };
        let slow = async {
            time::sleep(Duration::from_secs(30)).await;
        };
        time::timeout(
            Duration::from_secs(5),
            wait_for_any(vec![fast.boxed(), slow.boxed()]),
        )
        .await
        .expect("should complete with the fast future");
    }
}
