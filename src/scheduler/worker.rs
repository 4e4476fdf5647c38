//! Per-credential refresh worker.
//!
//! A dedicated task that sleeps until its token is due, fetches a replacement
//! (retrying forever), persists it (retrying a bounded number of times) and
//! rearms from the new expiry. States:
//!
//! `Armed -> Fetching -> Persisting -> Armed`, with `Cancelled` reachable from
//! any state. A worker never runs two cycles at once. A token that already
//! lives inside the margin is refreshed again after `preemption.min_delay`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::catalog::Credential;
use crate::config::settings::{PreemptionConfig, SettingsConfig};
use crate::error::IssuerError;
use crate::helpers::time::{delay_before_expiry, get_instant, humanize, now};
use crate::observability::metrics::{get_metrics, Metrics};
use crate::provider::TokenProvider;
use crate::resilience::retry::{LinearBackoff, RetryError, RetrySettings};
use crate::scheduler::plan::preemption_margin;
use crate::store::{Token, TokenStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Armed { delay: Duration },
    Fetching { attempt: u32 },
    Persisting,
    Cancelled,
}

/// Snapshot published on every transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub last_session_id: Option<String>,
    pub completed_cycles: u64,
}

/// Timing and retry policy shared by all workers
#[derive(Debug, Clone)]
pub struct WorkerPolicy {
    pub preemption: PreemptionConfig,
    pub fetch_timeout: Duration,
    pub fetch_backoff: LinearBackoff,
    pub persist: RetrySettings,
}

impl WorkerPolicy {
    pub fn from_settings(settings: &SettingsConfig) -> Self {
        let fetch = &settings.fetch;
        let persist = &settings.persist;
        Self {
            preemption: settings.preemption.clone(),
            fetch_timeout: Duration::from_secs(fetch.timeout_seconds),
            fetch_backoff: LinearBackoff {
                step: Duration::from_secs(fetch.backoff_step_seconds),
                max: Duration::from_secs(fetch.backoff_max_seconds),
            },
            persist: RetrySettings {
                attempts: persist.retries + 1,
                base_delay_ms: persist.base_delay_ms,
                max_delay_ms: persist.max_delay_ms,
            },
        }
    }

    fn margin(&self) -> Duration {
        preemption_margin(&self.preemption, &mut rand::rng())
    }
}

/// Handle to a running worker. Dropping it cancels the worker.
pub struct RefreshWorker {
    credential: Credential,
    status: watch::Receiver<WorkerStatus>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl RefreshWorker {
    /// Spawn a worker whose first refresh fires after `delay`.
    /// `last_session_id` is the stored token it takes over, if any.
    pub fn spawn<P, S>(
        credential: Credential,
        last_session_id: Option<String>,
        delay: Duration,
        provider: Arc<P>,
        store: Arc<S>,
        policy: Arc<WorkerPolicy>,
        cancel: CancellationToken,
    ) -> Self
    where
        P: TokenProvider,
        S: TokenStore,
    {
        let (tx, rx) = watch::channel(WorkerStatus {
            state: WorkerState::Armed { delay },
            last_session_id,
            completed_cycles: 0,
        });
        let span = info_span!("refresh_worker", credential = %credential);
        let task = WorkerTask {
            credential: credential.clone(),
            provider,
            store,
            policy,
            cancel: cancel.clone(),
            status: tx,
        };
        let handle = tokio::spawn(task.run(delay).instrument(span));

        Self {
            credential,
            status: rx,
            cancel,
            handle: Some(handle),
        }
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn status(&self) -> WorkerStatus {
        self.status.borrow().clone()
    }

    /// Receiver for observing transitions
    pub fn subscribe(&self) -> watch::Receiver<WorkerStatus> {
        self.status.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(err) = handle.await {
                if err.is_panic() {
                    error!("refresh worker for {} panicked", self.credential);
                }
            }
        }
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct WorkerTask<P, S> {
    credential: Credential,
    provider: Arc<P>,
    store: Arc<S>,
    policy: Arc<WorkerPolicy>,
    cancel: CancellationToken,
    status: watch::Sender<WorkerStatus>,
}

impl<P: TokenProvider, S: TokenStore> WorkerTask<P, S> {
    async fn run(self, first_delay: Duration) {
        let metrics = get_metrics().await;
        let mut delay = first_delay;

        loop {
            self.set_state(WorkerState::Armed { delay });
            debug!("next refresh in {}", humanize(delay));
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }

            info!(
                "{} token refresh started (replacing {})",
                self.credential,
                self.status.borrow().last_session_id.as_deref().unwrap_or("none")
            );
            let Some(token) = self.fetch(metrics).await else { break };

            self.set_state(WorkerState::Persisting);
            if !self.persist(&token, metrics).await {
                break;
            }

            let now = now();
            let margin = self.policy.margin();
            delay = delay_before_expiry(token.expiry, now, margin);
            if token.remaining(now) <= margin {
                delay = self.policy.preemption.min_delay();
                warn!(
                    "token {} lives {} which is inside the {} preemption margin; refreshing again in {}",
                    token.session_id,
                    humanize(token.remaining(now)),
                    humanize(margin),
                    humanize(delay)
                );
            }
            metrics
                .token_expiry_unix
                .with_label_values(&[self.credential.id.as_str(), self.credential.service.name.as_str()])
                .set(token.expiry.timestamp());
            self.status.send_modify(|status| {
                status.last_session_id = Some(token.session_id.to_owned());
                status.completed_cycles += 1;
            });
            info!("{} token refresh date changed. Next reset in {}", self.credential, humanize(delay));
        }

        self.set_state(WorkerState::Cancelled);
        info!("{} refresh worker stopped", self.credential);
    }

    /// Fetch until success; None once cancelled
    async fn fetch(&self, metrics: &Metrics) -> Option<Token> {
        let service = self.credential.service.name.as_str();
        let timeout = self.policy.fetch_timeout;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            self.set_state(WorkerState::Fetching { attempt });
            metrics.issuer_fetch_requests.with_label_values(&[service]).inc();
            let start = get_instant();

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                result = tokio::time::timeout(timeout, self.provider.fetch(&self.credential, self.cancel.child_token())) => {
                    result.unwrap_or(Err(IssuerError::Timeout(timeout)))
                }
            };
            metrics
                .issuer_fetch_duration
                .with_label_values(&[service])
                .observe(start.elapsed().as_secs_f64());

            match result {
                Ok(token) => {
                    info!(
                        "New token acquired for {} (session id {}, expiry {})",
                        self.credential,
                        token.session_id,
                        token.expiry.to_rfc3339()
                    );
                    return Some(token);
                }
                Err(IssuerError::Cancelled) if self.cancel.is_cancelled() => return None,
                Err(e) => {
                    metrics
                        .issuer_fetch_failures
                        .with_label_values(&[service, e.reason()])
                        .inc();
                    let wait = self.policy.fetch_backoff.delay(attempt);
                    warn!(
                        "Token fetch for {} failed (waiting {} seconds): {}",
                        self.credential,
                        wait.as_secs(),
                        e
                    );
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return None,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
            }
        }
    }

    /// Persist with bounded retries. Exhaustion is logged and absorbed;
    /// returns false only when cancelled.
    async fn persist(&self, token: &Token, metrics: &Metrics) -> bool {
        let store = &self.store;
        let result = self
            .policy
            .persist
            .run_with_retry(&self.cancel, || async move {
                store.add_token(token).await.inspect_err(|e| {
                    metrics.store_persist_failures.with_label_values(&[e.reason()]).inc();
                })
            })
            .await;

        match result {
            Ok(()) => true,
            Err(RetryError::Cancelled) => false,
            Err(RetryError::Exhausted { attempts, last }) => {
                error!(
                    "Writing token {} to storage failed after {} attempts: {}",
                    token.session_id, attempts, last
                );
                true
            }
        }
    }

    fn set_state(&self, state: WorkerState) {
        self.status.send_modify(|status| status.state = state);
    }
}
