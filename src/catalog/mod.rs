//! Credential catalog
//!
//! Expands configured account sections into one `Credential` per
//! login × service pair.

pub mod credential;

use indexmap::IndexMap;
use std::collections::HashSet;
use tracing::debug;

use crate::config::types::{AccountConfig, ServiceDef};
use crate::error::ConfigurationError;

pub use credential::{Credential, Service};

/// Builds the list of known services in declaration order
pub fn known_services(services: &IndexMap<String, ServiceDef>) -> Vec<Service> {
    services
        .iter()
        .map(|(name, def)| Service::new(name.to_owned(), def.app_id.to_owned()))
        .collect()
}

/// Expand account sections into credentials.
///
/// Service names are trimmed and matched case-insensitively; unknown names are
/// skipped. A repeated (id, service) pair keeps its first occurrence. Order
/// follows the config: sections first, then services as listed.
pub fn expand(
    accounts: &IndexMap<String, AccountConfig>,
    services: &[Service],
) -> Result<Vec<Credential>, ConfigurationError> {
    let mut credentials = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (section, account) in accounts {
        let id = account
            .identifier
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ConfigurationError::MissingIdentifier {
                section: section.to_owned(),
            })?;

        for requested in account.services.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let Some(service) = services
                .iter()
                .find(|service| service.name.eq_ignore_ascii_case(requested))
            else {
                debug!("account '{}': unknown service '{}' skipped", section, requested);
                continue;
            };

            if !seen.insert((id.to_owned(), service.name.to_owned())) {
                debug!("account '{}': duplicate credential {}@{} skipped", section, id, service);
                continue;
            }

            credentials.push(Credential::new(id, account.secret.to_owned(), service.clone()));
        }
    }

    Ok(credentials)
}
