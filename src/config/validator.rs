//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Checks settings invariants (stagger spacing, backoff and retry bounds, logging)
//! - Checks the service registry, the issuer block, the store block and the accounts

use std::collections::HashMap;
use tracing::{error, info};

use crate::config::settings::SettingsConfig;
use crate::config::types::{GenericSourceValue, IssuerConfig, ServiceConfig, StoreConfig};
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_services(cfg, &mut errors);
    validate_issuer(&cfg.issuer, &mut errors);
    validate_store(&cfg.store, &mut errors);

    if cfg.accounts.is_empty() {
        errors.push("config: 'accounts' is empty; at least one account required".to_string());
    }
    for (name, account) in &cfg.accounts {
        if account.services.trim().is_empty() {
            errors.push(format!("accounts.{}: services cannot be empty", name));
        }
    }

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

/// SETTINGS VALIDATION
/// one year
const MAX_PREEMPTION_MINUTES: u64 = 60 * 24 * 365;
/// one day
const MAX_STEP_SECONDS: u64 = 24 * 3600;

fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    let stagger = &settings.stagger;
    if stagger.step_seconds == 0 {
        errors.push("settings.stagger.step_seconds must be > 0".to_string());
    }
    if stagger.step_seconds > MAX_STEP_SECONDS {
        errors.push(format!(
            "settings.stagger.step_seconds ({}) must be <= {}",
            stagger.step_seconds, MAX_STEP_SECONDS
        ));
    }
    // keeps delays strictly increasing inside a service group
    if stagger.jitter_seconds >= stagger.step_seconds {
        errors.push(format!(
            "settings.stagger.jitter_seconds ({}) must be < step_seconds ({})",
            stagger.jitter_seconds, stagger.step_seconds
        ));
    }

    let fetch = &settings.fetch;
    if fetch.timeout_seconds == 0 {
        errors.push("settings.fetch.timeout_seconds must be > 0".to_string());
    }
    if fetch.backoff_step_seconds == 0 {
        errors.push("settings.fetch.backoff_step_seconds must be > 0".to_string());
    }
    if fetch.backoff_max_seconds < fetch.backoff_step_seconds {
        errors.push(format!(
            "settings.fetch.backoff_max_seconds ({}) must be >= backoff_step_seconds ({})",
            fetch.backoff_max_seconds, fetch.backoff_step_seconds
        ));
    }

    let persist = &settings.persist;
    if persist.max_delay_ms < persist.base_delay_ms {
        errors.push(format!(
            "settings.persist.max_delay_ms ({}) must be >= base_delay_ms ({})",
            persist.max_delay_ms, persist.base_delay_ms
        ));
    }

    let preemption = &settings.preemption;
    if preemption.base_minutes > MAX_PREEMPTION_MINUTES {
        errors.push(format!(
            "settings.preemption.base_minutes ({}) must be <= {}",
            preemption.base_minutes, MAX_PREEMPTION_MINUTES
        ));
    }
    if preemption.jitter_minutes > MAX_PREEMPTION_MINUTES {
        errors.push(format!(
            "settings.preemption.jitter_minutes ({}) must be <= {}",
            preemption.jitter_minutes, MAX_PREEMPTION_MINUTES
        ));
    }
    if preemption.min_delay_seconds == 0 || preemption.min_delay_seconds > MAX_STEP_SECONDS {
        errors.push(format!(
            "settings.preemption.min_delay_seconds ({}) must be in 1..={}",
            preemption.min_delay_seconds, MAX_STEP_SECONDS
        ));
    }

    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be a valid port",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    if !settings.metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            settings.metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

fn validate_services(cfg: &ServiceConfig, errors: &mut Vec<String>) {
    if cfg.services.is_empty() {
        errors.push("config: 'services' is empty; at least one service required".to_string());
    }

    let mut app_ids: HashMap<&str, &str> = HashMap::new(); // app_id -> service name
    for (name, service) in &cfg.services {
        if service.app_id.trim().is_empty() {
            errors.push(format!("services.{}: app_id cannot be empty", name));
            continue;
        }
        if let Some(prev) = app_ids.insert(service.app_id.as_str(), name.as_str()) {
            errors.push(format!(
                "services.{} and services.{} share app_id '{}'; app ids must be unique",
                prev, name, service.app_id
            ));
        }
    }
}

fn validate_issuer(issuer: &IssuerConfig, errors: &mut Vec<String>) {
    if !(issuer.url.starts_with("http://") || issuer.url.starts_with("https://")) {
        errors.push(format!(
            "issuer.url '{}' must be an http(s) url",
            issuer.url
        ));
    }
    if issuer.app_id_header.trim().is_empty() {
        errors.push("issuer.app_id_header cannot be empty".to_string());
    }
    if let Some(headers) = &issuer.headers {
        for (k, v) in headers {
            validate_generic_source_value(&format!("issuer.headers.{}", k), v, errors);
        }
    }
    let response = &issuer.response;
    for (field, pointer) in [
        ("session_id", &response.session_id),
        ("value", &response.value),
        ("expiry", &response.expiry),
    ] {
        if !pointer.starts_with('/') {
            errors.push(format!(
                "issuer.response.{} '{}' must be a JSON pointer starting with '/'",
                field, pointer
            ));
        }
    }
}

fn validate_generic_source_value(path: &str, v: &GenericSourceValue, errors: &mut Vec<String>) {
    match v {
        GenericSourceValue::Literal { value } => {
            if value.trim().is_empty() {
                errors.push(format!("{}: literal value cannot be empty", path));
            }
        }
        GenericSourceValue::FromEnv { from_env } => {
            if from_env.trim().is_empty() {
                errors.push(format!("{}: env name cannot be empty", path));
            }
        }
        GenericSourceValue::FromFile { path: p } => {
            if p.trim().is_empty() {
                errors.push(format!("{}: from_file path cannot be empty", path));
            }
        }
    }
}

fn validate_store(store: &StoreConfig, errors: &mut Vec<String>) {
    match store {
        StoreConfig::Memory => {}
        StoreConfig::Redis { url, key_prefix } => {
            if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
                errors.push(format!("store.url '{}' must be a redis:// or rediss:// url", url));
            }
            if key_prefix.trim().is_empty() {
                errors.push("store.key_prefix cannot be empty".to_string());
            }
        }
    }
}
