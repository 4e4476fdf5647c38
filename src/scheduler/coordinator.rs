use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::config::types::ServiceConfig;
use crate::helpers::time::{humanize, now};
use crate::observability::metrics::get_metrics;
use crate::provider::TokenProvider;
use crate::scheduler::plan::plan;
use crate::scheduler::worker::{RefreshWorker, WorkerPolicy};
use crate::store::TokenStore;

/// Owns the refresh workers: reconciles stored tokens with the configured
/// credentials at start, and tears every worker down at stop.
pub struct SchedulerCoordinator<P, S> {
    config: ServiceConfig,
    provider: Arc<P>,
    store: Arc<S>,
    policy: Arc<WorkerPolicy>,
    shutdown: CancellationToken,
    workers: Vec<RefreshWorker>,
    started: bool,
}

impl<P: TokenProvider, S: TokenStore> SchedulerCoordinator<P, S> {
    pub fn new(config: ServiceConfig, provider: Arc<P>, store: Arc<S>) -> Self {
        let policy = Arc::new(WorkerPolicy::from_settings(&config.settings));
        Self {
            config,
            provider,
            store,
            policy,
            shutdown: CancellationToken::new(),
            workers: Vec::new(),
            started: false,
        }
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            bail!("scheduler is already started");
        }
        let metrics = get_metrics().await;

        let services = catalog::known_services(&self.config.services);
        let credentials = catalog::expand(&self.config.accounts, &services)?;
        let owner_ids: Vec<String> = credentials
            .iter()
            .map(|credential| credential.id.to_owned())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let tokens = self
            .store
            .get_tokens(&owner_ids)
            .await
            .context("loading stored tokens")?;
        info!(
            "Discovered {} credentials and {} stored tokens",
            credentials.len(),
            tokens.len()
        );

        let schedule = {
            let settings = &self.config.settings;
            plan(
                &credentials,
                tokens,
                now(),
                &settings.preemption,
                &settings.stagger,
                &mut rand::rng(),
            )
        };

        for token in &schedule.orphaned {
            warn!(
                "stored token {} (owner {}, app id {}) matches no configured credential",
                token.session_id, token.owner_id, token.app_id
            );
            metrics.orphaned_tokens.inc();
        }
        for token in &schedule.discarded {
            debug!("older duplicate token {} of {} ignored", token.session_id, token.owner_id);
        }

        // a fresh token for the next cycle
        self.shutdown = CancellationToken::new();
        for entry in schedule.entries {
            info!("{} refresh scheduled in {}", entry.credential, humanize(entry.delay));
            let worker = RefreshWorker::spawn(
                entry.credential,
                entry.seed.map(|token| token.session_id),
                entry.delay,
                self.provider.clone(),
                self.store.clone(),
                self.policy.clone(),
                self.shutdown.child_token(),
            );
            self.workers.push(worker);
        }

        metrics.scheduled_workers.set(self.workers.len() as i64);
        self.started = true;
        Ok(())
    }

    /// Cancel every worker and wait for them to finish. No-op when not running.
    pub async fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.shutdown.cancel();
        let workers = std::mem::take(&mut self.workers);
        info!("stopping {} refresh workers", workers.len());
        for worker in workers {
            worker.shutdown().await;
        }
        get_metrics().await.scheduled_workers.set(0);
        self.started = false;
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn workers(&self) -> &[RefreshWorker] {
        &self.workers
    }
}

impl<P, S> Drop for SchedulerCoordinator<P, S> {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
