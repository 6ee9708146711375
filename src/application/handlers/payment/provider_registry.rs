//! Registered mobile-money adapters, keyed by provider.

use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::payment::Provider;
use crate::ports::MobileMoneyProvider;

/// Providers a payment can be routed to.
///
/// A provider name without an adapter here is rejected at intake.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<Provider, Arc<dyn MobileMoneyProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an adapter under the provider it reports.
    pub fn with(mut self, adapter: Arc<dyn MobileMoneyProvider>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    pub fn supports(&self, provider: Provider) -> bool {
        self.adapters.contains_key(&provider)
    }

    pub fn get(&self, provider: Provider) -> Option<Arc<dyn MobileMoneyProvider>> {
        self.adapters.get(&provider).cloned()
    }
}
