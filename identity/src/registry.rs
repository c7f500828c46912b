//! Provider registry.
//!
//! Built once at startup from the configured providers and shared read-only with the
//! handshake orchestrator behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{unknown_provider_error, Error};
use crate::oauth::Provider;

/// Named collection of providers.
#[derive(Default)]
pub struct Registry {
    providers: HashMap<String, Arc<dyn Provider>>,
}

impl Registry {
    /// Register `providers` by name. A later provider replaces an earlier one with the
    /// same name.
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        let mut registry = Self::default();
        for provider in providers {
            registry.insert(provider);
        }
        registry
    }

    /// Register one provider, replacing any existing entry with the same name.
    pub fn insert(&mut self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        if self.providers.insert(name.clone(), provider).is_some() {
            info!("Provider {} replaced an earlier registration", name);
        } else {
            debug!("Registered provider {}", name);
        }
    }

    /// Look up a provider by name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>, Error> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| unknown_provider_error(name))
    }

    /// Registered provider names in ascending order.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove every provider.
    pub fn clear(&mut self) {
        self.providers.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
