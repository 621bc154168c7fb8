//! Provider registry
//!
//! Ordered, append-only collection of providers built during startup and
//! read once by the scheduler.

use std::sync::Arc;

use super::StatusProvider;

/// Errors raised while registering providers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A provider with the same name is already registered
    #[error("Provider '{0}' is already registered")]
    DuplicateProvider(String),
}

/// Registry of status provider adapters
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn StatusProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider
    ///
    /// Names double as the dedup namespace, so they must be unique.
    pub fn register<P>(&mut self, provider: P) -> Result<(), RegistryError>
    where
        P: StatusProvider + 'static,
    {
        self.register_arc(Arc::new(provider))
    }

    /// Register an already shared provider
    pub fn register_arc(&mut self, provider: Arc<dyn StatusProvider>) -> Result<(), RegistryError> {
        if self.providers.iter().any(|p| p.name() == provider.name()) {
            return Err(RegistryError::DuplicateProvider(provider.name().to_string()));
        }

        tracing::debug!(
            provider = provider.name(),
            interval_secs = provider.poll_interval().as_secs(),
            "Provider registered"
        );
        self.providers.push(provider);
        Ok(())
    }

    /// Registered providers in registration order
    pub fn providers(&self) -> Vec<Arc<dyn StatusProvider>> {
        self.providers.clone()
    }

    /// Registered provider names in registration order
    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
