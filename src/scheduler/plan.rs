//! Startup reconciliation and staggering.
//!
//! Pure functions: given the configured credentials, the stored tokens and
//! the current time, decide which workers to start and when each fires first.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rand::Rng;

use crate::catalog::Credential;
use crate::config::settings::{PreemptionConfig, StaggerConfig};
use crate::helpers::time::delay_before_expiry;
use crate::store::Token;

/// One worker to spawn
#[derive(Debug, Clone)]
pub struct PlannedWorker {
    pub credential: Credential,
    /// stored token the worker takes over, if any
    pub seed: Option<Token>,
    pub delay: Duration,
}

#[derive(Debug, Default)]
pub struct SchedulePlan {
    pub entries: Vec<PlannedWorker>,
    /// tokens with no matching credential, left to expire in the store
    pub orphaned: Vec<Token>,
    /// older duplicates of a (owner, app id) pair
    pub discarded: Vec<Token>,
}

/// Preemption margin with its random spread, sampled per call
pub fn preemption_margin<R: Rng>(config: &PreemptionConfig, rng: &mut R) -> Duration {
    let jitter_secs = config.jitter().as_secs();
    config
        .base()
        .saturating_add(Duration::from_secs(rng.random_range(0..=jitter_secs)))
}

/// Keep the latest-expiring token per (owner_id, app_id).
/// Returns (kept, discarded); kept follows first appearance order.
pub fn deduplicate(tokens: Vec<Token>) -> (Vec<Token>, Vec<Token>) {
    let mut latest: IndexMap<(String, String), Token> = IndexMap::new();
    let mut discarded = Vec::new();

    for token in tokens {
        let key = (token.owner_id.to_owned(), token.app_id.to_owned());
        match latest.get_mut(&key) {
            Some(current) if token.expiry > current.expiry => {
                discarded.push(std::mem::replace(current, token));
            }
            Some(_) => discarded.push(token),
            None => {
                latest.insert(key, token);
            }
        }
    }

    (latest.into_values().collect(), discarded)
}

/// Build the startup schedule.
///
/// Credentials holding a stored token fire at `expiry - margin`. The rest are
/// grouped by service and spaced `stagger.step` apart plus jitter; the first of
/// a group fires immediately only when no seeded worker exists for that service.
pub fn plan<R: Rng>(
    credentials: &[Credential],
    tokens: Vec<Token>,
    now: DateTime<Utc>,
    preemption: &PreemptionConfig,
    stagger: &StaggerConfig,
    rng: &mut R,
) -> SchedulePlan {
    let (survivors, mut discarded) = deduplicate(tokens);
    let mut entries = Vec::with_capacity(credentials.len());
    let mut orphaned = Vec::new();
    let mut scheduled: HashSet<usize> = HashSet::new();

    for token in survivors {
        let Some(index) = credentials
            .iter()
            .position(|credential| credential.matches(&token.owner_id, &token.app_id))
        else {
            orphaned.push(token);
            continue;
        };
        if !scheduled.insert(index) {
            discarded.push(token);
            continue;
        }
        let delay = delay_before_expiry(token.expiry, now, preemption_margin(preemption, rng));
        entries.push(PlannedWorker {
            credential: credentials[index].clone(),
            seed: Some(token),
            delay,
        });
    }

    let seeded_services: HashSet<String> = scheduled
        .iter()
        .map(|index| credentials[*index].service.name.to_owned())
        .collect();

    let mut groups: IndexMap<String, Vec<&Credential>> = IndexMap::new();
    for (index, credential) in credentials.iter().enumerate() {
        if !scheduled.contains(&index) {
            groups
                .entry(credential.service.name.to_owned())
                .or_default()
                .push(credential);
        }
    }

    let jitter_secs = stagger.jitter().as_secs();
    for (service, group) in groups {
        // an immediate fetch only when nothing else holds this service
        let mut position: u32 = if seeded_services.contains(&service) { 1 } else { 0 };
        for credential in group {
            let mut delay = stagger.step().saturating_mul(position);
            if delay > Duration::ZERO {
                delay = delay.saturating_add(Duration::from_secs(rng.random_range(0..=jitter_secs)));
            }
            position += 1;
            entries.push(PlannedWorker {
                credential: credential.clone(),
                seed: None,
                delay,
            });
        }
    }

    SchedulePlan { entries, orphaned, discarded }
}
