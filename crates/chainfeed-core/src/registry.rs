//! Provider registry: named providers plus explicit health tracking.

use std::collections::{BTreeMap, HashMap};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use tracing::{info, warn};

use crate::provider::{DataProvider, ProviderError};
use crate::UtcDateTime;

/// Registry-level failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    DuplicateName { name: String },
    NotFound { name: String },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateName { name } => {
                write!(f, "provider {name} is already registered")
            }
            Self::NotFound { name } => write!(f, "provider {name} is not registered"),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Health bookkeeping for one registered provider.
///
/// Only explicit health checks mutate this state; data-fetch failures
/// never touch it.
#[derive(Debug, Clone, Default)]
pub struct ProviderState {
    pub validated: bool,
    pub last_checked: Option<UtcDateTime>,
    pub last_error: Option<String>,
}

/// Outcome of one provider's connection check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthOutcome {
    Ok,
    Failed { error: ProviderError },
}

impl HealthOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

struct RegistryEntry {
    provider: Arc<dyn DataProvider>,
    state: ProviderState,
}

/// Holds every configured provider under a unique name.
///
/// Registration order is preserved; collection cycles visit providers
/// in that order so output stays deterministic.
#[derive(Default)]
pub struct ProviderRegistry {
    order: Vec<String>,
    entries: HashMap<String, RegistryEntry>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        provider: Arc<dyn DataProvider>,
    ) -> Result<(), RegistryError> {
        let name = provider.name().to_owned();
        if self.entries.contains_key(&name) {
            return Err(RegistryError::DuplicateName { name });
        }
        info!(provider = %name, "registered provider");
        self.order.push(name.clone());
        self.entries.insert(
            name,
            RegistryEntry {
                provider,
                state: ProviderState::default(),
            },
        );
        Ok(())
    }

    pub fn get_provider(&self, name: &str) -> Result<Arc<dyn DataProvider>, RegistryError> {
        self.entries
            .get(name)
            .map(|entry| Arc::clone(&entry.provider))
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_owned(),
            })
    }

    pub fn state(&self, name: &str) -> Result<&ProviderState, RegistryError> {
        self.entries
            .get(name)
            .map(|entry| &entry.state)
            .ok_or_else(|| RegistryError::NotFound {
                name: name.to_owned(),
            })
    }

    /// Registered names in registration order.
    pub fn provider_names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Names whose most recent health check succeeded, in registration
    /// order. A provider that was never checked is not active.
    pub fn active_providers(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| {
                self.entries
                    .get(*name)
                    .map(|entry| entry.state.validated)
                    .unwrap_or(false)
            })
            .cloned()
            .collect()
    }

    /// Providers whose most recent health check succeeded, paired with
    /// their names, in registration order.
    pub fn active(&self) -> Vec<(String, Arc<dyn DataProvider>)> {
        self.order
            .iter()
            .filter_map(|name| {
                let entry = self.entries.get(name)?;
                entry
                    .state
                    .validated
                    .then(|| (name.clone(), Arc::clone(&entry.provider)))
            })
            .collect()
    }

    /// Runs every provider's connection check and records the outcome.
    ///
    /// Checks are independent: one provider failing never prevents the
    /// rest from being checked.
    pub async fn check_all_connections(&mut self) -> BTreeMap<String, HealthOutcome> {
        let mut outcomes = BTreeMap::new();
        for name in self.order.clone() {
            let provider = match self.entries.get(&name) {
                Some(entry) => Arc::clone(&entry.provider),
                None => continue,
            };

            let checked_at = UtcDateTime::now();
            let outcome = match provider.validate_connection().await {
                Ok(()) => {
                    info!(provider = %name, "connection check passed");
                    HealthOutcome::Ok
                }
                Err(error) => {
                    warn!(provider = %name, code = error.code(), "connection check failed: {error}");
                    HealthOutcome::Failed { error }
                }
            };

            if let Some(entry) = self.entries.get_mut(&name) {
                entry.state.validated = outcome.is_ok();
                entry.state.last_checked = Some(checked_at);
                entry.state.last_error = match &outcome {
                    HealthOutcome::Ok => None,
                    HealthOutcome::Failed { error } => Some(error.to_string()),
                };
            }
            outcomes.insert(name, outcome);
        }
        outcomes
    }

    /// Clears every provider's response cache.
    pub async fn clear_all_caches(&self) {
        for name in &self.order {
            if let Some(entry) = self.entries.get(name) {
                entry.provider.clear_cache().await;
                info!(provider = %name, "cache cleared");
            }
        }
    }
}
