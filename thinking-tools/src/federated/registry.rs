//! Provider registry keyed by [`ProviderKind`]

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use super::client::{OpenAiCompatClient, ProviderClient};
use super::config::{FederatedConfig, ProviderKind};
use super::error::{FederatedError, FederatedResult};

pub type SharedProvider = Arc<dyn ProviderClient>;

struct Entry {
    enabled: bool,
    default_model: Option<String>,
    client: SharedProvider,
}

/// Clients for every configured provider plus their enablement.
pub struct ProviderRegistry {
    entries: BTreeMap<ProviderKind, Entry>,
}

impl ProviderRegistry {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// One OpenAI-compatible client per provider in `config`.
    pub fn from_config(config: &FederatedConfig) -> Result<Self, reqwest::Error> {
        let mut registry = Self::empty();
        for (&kind, provider) in &config.providers {
            let client = OpenAiCompatClient::new(
                kind,
                provider,
                config.request_timeout(),
                config.default_temperature,
            )?;
            if provider.enabled {
                info!(provider = %kind, base_url = client.base_url(), "Provider enabled");
            }
            registry.register(
                Arc::new(client),
                provider.enabled,
                provider.default_model.clone(),
            );
        }
        Ok(registry)
    }

    /// Add or replace the client for `client.kind()`.
    pub fn register(&mut self, client: SharedProvider, enabled: bool, default_model: Option<String>) {
        self.entries.insert(
            client.kind(),
            Entry {
                enabled,
                default_model,
                client,
            },
        );
    }

    pub fn is_enabled(&self, kind: ProviderKind) -> bool {
        self.entries.get(&kind).is_some_and(|e| e.enabled)
    }

    pub fn default_model(&self, kind: ProviderKind) -> Option<&str> {
        self.entries.get(&kind).and_then(|e| e.default_model.as_deref())
    }

    /// The client for `kind`, or `ProviderDisabled` when it is off or absent.
    pub fn client(&self, kind: ProviderKind) -> FederatedResult<SharedProvider> {
        match self.entries.get(&kind) {
            Some(entry) if entry.enabled => Ok(entry.client.clone()),
            _ => Err(FederatedError::ProviderDisabled { provider: kind }),
        }
    }

    /// Enabled clients in provider order.
    pub fn enabled(&self) -> impl Iterator<Item = (ProviderKind, &SharedProvider)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.enabled)
            .map(|(kind, e)| (*kind, &e.client))
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let enabled: Vec<_> = self.enabled().map(|(k, _)| k).collect();
        f.debug_struct("ProviderRegistry")
            .field("enabled", &enabled)
            .finish()
    }
}
