// tests/common/mod.rs
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::catalog::{Credential, Service};
use crate::config::settings::PreemptionConfig;
use crate::error::{IssuerError, StoreError};
use crate::provider::TokenProvider;
use crate::resilience::retry::{LinearBackoff, RetrySettings};
use crate::scheduler::worker::{WorkerPolicy, WorkerState, WorkerStatus};
use crate::store::{Token, TokenStore};

pub fn pc() -> Service {
    Service::new("pc", "app-pc")
}

pub fn psn() -> Service {
    Service::new("psn", "app-psn")
}

pub fn credential(id: &str, service: Service) -> Credential {
    Credential::new(id, "pw", service)
}

pub fn token_for(credential: &Credential, session_id: &str, lifetime: chrono::Duration) -> Token {
    Token {
        session_id: session_id.to_owned(),
        app_id: credential.service.app_id.to_owned(),
        owner_id: credential.id.to_owned(),
        value: format!("ticket-{}", session_id),
        expiry: Utc::now() + lifetime,
    }
}

/// Worker policy with a fixed margin and the default fetch/persist timings
pub fn policy(margin_minutes: u64) -> Arc<WorkerPolicy> {
    Arc::new(WorkerPolicy {
        preemption: PreemptionConfig {
            base_minutes: margin_minutes,
            jitter_minutes: 0,
            min_delay_seconds: 60,
        },
        fetch_timeout: Duration::from_secs(15),
        fetch_backoff: LinearBackoff {
            step: Duration::from_secs(5),
            max: Duration::from_secs(60),
        },
        persist: RetrySettings {
            attempts: 6,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        },
    })
}

/// Wait until the worker has finished `cycles` refreshes and is armed again
pub async fn armed_after(rx: &mut watch::Receiver<WorkerStatus>, cycles: u64) -> WorkerStatus {
    rx.wait_for(|status| {
        status.completed_cycles >= cycles && matches!(status.state, WorkerState::Armed { .. })
    })
    .await
    .expect("worker stopped before rearming")
    .clone()
}

pub async fn cancelled(rx: &mut watch::Receiver<WorkerStatus>) -> WorkerStatus {
    rx.wait_for(|status| status.state == WorkerState::Cancelled)
        .await
        .expect("worker status closed without publishing Cancelled")
        .clone()
}

/// Provider that plays back a script, then issues fresh tokens.
///
/// The first `hang_first` calls never answer on their own; they only return
/// once cancelled.
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Result<(), IssuerError>>>,
    hang_first: u32,
    lifetime: chrono::Duration,
    calls: AtomicU32,
    issued_for: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new(lifetime: chrono::Duration) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            hang_first: 0,
            lifetime,
            calls: AtomicU32::new(0),
            issued_for: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `n` calls
    pub fn failing(n: usize, lifetime: chrono::Duration) -> Self {
        let provider = Self::new(lifetime);
        provider
            .script
            .lock()
            .unwrap()
            .extend((0..n).map(|i| Err(IssuerError::Other(format!("issuer down #{}", i + 1)))));
        provider
    }

    pub fn hanging(n: u32, lifetime: chrono::Duration) -> Self {
        Self {
            hang_first: n,
            ..Self::new(lifetime)
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Credential ids that received a fresh token, in issue order
    pub fn issued_for(&self) -> Vec<String> {
        self.issued_for.lock().unwrap().clone()
    }
}

impl TokenProvider for ScriptedProvider {
    async fn fetch(&self, credential: &Credential, cancel: CancellationToken) -> Result<Token, IssuerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.hang_first {
            cancel.cancelled().await;
            return Err(IssuerError::Cancelled);
        }
        let scripted = self.script.lock().unwrap().pop_front();
        if let Some(Err(e)) = scripted {
            return Err(e);
        }
        self.issued_for.lock().unwrap().push(credential.id.to_owned());
        Ok(token_for(credential, &format!("{}-{}", credential.id, call), self.lifetime))
    }
}

/// Store whose writes always fail
#[derive(Default)]
pub struct FailingStore {
    writes: AtomicU32,
}

impl FailingStore {
    pub fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl TokenStore for FailingStore {
    async fn add_token(&self, _token: &Token) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Other("store unavailable".into()))
    }

    async fn get_tokens(&self, _owner_ids: &[String]) -> Result<Vec<Token>, StoreError> {
        Ok(vec![])
    }

    async fn remove_token(&self, _session_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store whose writes never complete
#[derive(Default)]
pub struct StalledStore;

impl TokenStore for StalledStore {
    async fn add_token(&self, _token: &Token) -> Result<(), StoreError> {
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn get_tokens(&self, _owner_ids: &[String]) -> Result<Vec<Token>, StoreError> {
        Ok(vec![])
    }

    async fn remove_token(&self, _session_id: &str) -> Result<(), StoreError> {
        Ok(())
    }
}
