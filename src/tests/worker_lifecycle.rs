// Drives a single refresh worker against scripted issuers and stores on a
// paused clock: retrying fetches, absorbed persist failures, cancellation at
// each suspension point.

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Duration as ChronoDuration;
    use tokio_util::sync::CancellationToken;

    use crate::scheduler::worker::{RefreshWorker, WorkerState};
    use crate::store::{MemoryTokenStore, TokenStore};
    use crate::tests::common::{
        armed_after, cancelled, credential, pc, policy, FailingStore, ScriptedProvider, StalledStore,
    };

    const TEN_HOURS: Duration = Duration::from_secs(10 * 3600);

    fn armed_delay(state: &WorkerState) -> Duration {
        match state {
            WorkerState::Armed { delay } => *delay,
            other => panic!("expected Armed, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_fetch_until_success_then_rearms_from_new_expiry() {
        let provider = Arc::new(ScriptedProvider::failing(3, ChronoDuration::hours(40)));
        let store = Arc::new(MemoryTokenStore::new());
        let worker = RefreshWorker::spawn(
            credential("alice", pc()),
            None,
            Duration::ZERO,
            provider.clone(),
            store.clone(),
            policy(30 * 60),
            CancellationToken::new(),
        );
        let mut rx = worker.subscribe();

        let status = armed_after(&mut rx, 1).await;

        assert_eq!(provider.calls(), 4);
        assert_eq!(status.completed_cycles, 1);
        assert_eq!(status.last_session_id.as_deref(), Some("alice-4"));
        let delay = armed_delay(&status.state);
        assert!(delay <= TEN_HOURS && delay > TEN_HOURS - Duration::from_secs(60), "{:?}", delay);

        let stored = store.get_tokens(&["alice".to_owned()]).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].session_id, "alice-4");

        worker.shutdown().await;
        assert_eq!(rx.borrow().state, WorkerState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_issuer_times_out_and_is_retried() {
        let provider = Arc::new(ScriptedProvider::hanging(1, ChronoDuration::hours(40)));
        let worker = RefreshWorker::spawn(
            credential("alice", pc()),
            None,
            Duration::ZERO,
            provider.clone(),
            Arc::new(MemoryTokenStore::new()),
            policy(30 * 60),
            CancellationToken::new(),
        );
        let mut rx = worker.subscribe();

        let status = armed_after(&mut rx, 1).await;

        assert_eq!(provider.calls(), 2);
        assert_eq!(status.last_session_id.as_deref(), Some("alice-2"));
        worker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failing_store_still_rearms_from_fetched_token() {
        let provider = Arc::new(ScriptedProvider::new(ChronoDuration::hours(40)));
        let store = Arc::new(FailingStore::default());
        let worker = RefreshWorker::spawn(
            credential("alice", pc()),
            Some("old-session".to_owned()),
            Duration::ZERO,
            provider.clone(),
            store.clone(),
            policy(30 * 60),
            CancellationToken::new(),
        );
        let mut rx = worker.subscribe();

        let status = armed_after(&mut rx, 1).await;

        // one write plus five retries
        assert_eq!(store.writes(), 6);
        assert_eq!(status.last_session_id.as_deref(), Some("alice-1"));
        let delay = armed_delay(&status.state);
        assert!(delay > TEN_HOURS - Duration::from_secs(60));
        worker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_fetch_stops_without_rearming() {
        let provider = Arc::new(ScriptedProvider::hanging(1, ChronoDuration::hours(40)));
        let worker = RefreshWorker::spawn(
            credential("alice", pc()),
            None,
            Duration::ZERO,
            provider.clone(),
            Arc::new(MemoryTokenStore::new()),
            policy(30 * 60),
            CancellationToken::new(),
        );
        let mut rx = worker.subscribe();

        rx.wait_for(|status| matches!(status.state, WorkerState::Fetching { .. }))
            .await
            .unwrap();
        worker.cancel();
        let status = cancelled(&mut rx).await;

        assert_eq!(status.completed_cycles, 0);
        assert!(status.last_session_id.is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_persist_stops_without_rearming() {
        let provider = Arc::new(ScriptedProvider::new(ChronoDuration::hours(40)));
        let worker = RefreshWorker::spawn(
            credential("alice", pc()),
            None,
            Duration::ZERO,
            provider.clone(),
            Arc::new(StalledStore),
            policy(30 * 60),
            CancellationToken::new(),
        );
        let mut rx = worker.subscribe();

        rx.wait_for(|status| status.state == WorkerState::Persisting)
            .await
            .unwrap();
        worker.cancel();
        let status = cancelled(&mut rx).await;

        assert_eq!(status.completed_cycles, 0);
        assert!(status.last_session_id.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn parent_cancellation_reaches_worker() {
        let parent = CancellationToken::new();
        let provider = Arc::new(ScriptedProvider::new(ChronoDuration::hours(40)));
        let worker = RefreshWorker::spawn(
            credential("alice", pc()),
            None,
            Duration::from_secs(3600),
            provider.clone(),
            Arc::new(MemoryTokenStore::new()),
            policy(30 * 60),
            parent.child_token(),
        );
        let mut rx = worker.subscribe();

        parent.cancel();
        cancelled(&mut rx).await;
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_handle_cancels_worker() {
        let provider = Arc::new(ScriptedProvider::new(ChronoDuration::hours(40)));
        let worker = RefreshWorker::spawn(
            credential("alice", pc()),
            None,
            Duration::from_secs(3600),
            provider.clone(),
            Arc::new(MemoryTokenStore::new()),
            policy(30 * 60),
            CancellationToken::new(),
        );
        let mut rx = worker.subscribe();

        drop(worker);
        cancelled(&mut rx).await;
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn seeded_worker_takes_over_until_first_refresh() {
        let provider = Arc::new(ScriptedProvider::new(ChronoDuration::hours(40)));
        let worker = RefreshWorker::spawn(
            credential("alice", pc()),
            Some("seed".to_owned()),
            Duration::from_secs(3600),
            provider.clone(),
            Arc::new(MemoryTokenStore::new()),
            policy(30 * 60),
            CancellationToken::new(),
        );
        let mut rx = worker.subscribe();

        let initial = worker.status();
        assert_eq!(initial.last_session_id.as_deref(), Some("seed"));
        assert_eq!(initial.state, WorkerState::Armed { delay: Duration::from_secs(3600) });

        let status = armed_after(&mut rx, 1).await;
        assert_eq!(status.last_session_id.as_deref(), Some("alice-1"));
        assert_eq!(provider.calls(), 1);
        worker.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn token_shorter_than_margin_rearms_after_floor() {
        // one hour of validity against a thirty hour margin
        let provider = Arc::new(ScriptedProvider::new(ChronoDuration::hours(1)));
        let worker = RefreshWorker::spawn(
            credential("alice", pc()),
            None,
            Duration::ZERO,
            provider.clone(),
            Arc::new(MemoryTokenStore::new()),
            policy(30 * 60),
            CancellationToken::new(),
        );
        let mut rx = worker.subscribe();

        let status = armed_after(&mut rx, 1).await;
        assert_eq!(armed_delay(&status.state), Duration::from_secs(60));
        assert_eq!(provider.calls(), 1);

        // the floor elapses on the paused clock, then the next refresh runs
        let status = armed_after(&mut rx, 2).await;
        assert_eq!(armed_delay(&status.state), Duration::from_secs(60));
        assert_eq!(provider.calls(), 2);
        worker.shutdown().await;
    }
}
