// Provider Store Port (Interface)

use crate::domain::{Provider, ProviderId};
use crate::error::Result;
use async_trait::async_trait;

/// Outcome of an average-duration lookup. Store failures are `Err`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationLookup {
    Found(u32),
    NotFound,
}

/// Store interface for service providers
#[async_trait]
pub trait ProviderStore: Send + Sync {
    /// Average service duration of a provider, in minutes
    async fn average_service_duration(&self, id: &ProviderId) -> Result<DurationLookup>;

    async fn insert(&self, provider: &Provider) -> Result<()>;

    async fn find_by_id(&self, id: &ProviderId) -> Result<Option<Provider>>;

    /// Providers of a shop, ordered by name
    async fn list_by_shop(&self, shop_id: &str) -> Result<Vec<Provider>>;

    async fn update(&self, provider: &Provider) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory ProviderStore
    #[derive(Default)]
    pub struct InMemoryProviderStore {
        providers: Mutex<HashMap<ProviderId, Provider>>,
        fail_lookups: AtomicBool,
        lookups: AtomicUsize,
        name_lookups: AtomicUsize,
    }

    impl InMemoryProviderStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_providers(providers: impl IntoIterator<Item = Provider>) -> Self {
            let store = Self::new();
            {
                let mut map = store.providers.lock().unwrap();
                for p in providers {
                    map.insert(p.id.clone(), p);
                }
            }
            store
        }

        /// Make duration and `find_by_id` lookups fail with a store error
        pub fn set_fail_lookups(&self, fail: bool) {
            self.fail_lookups.store(fail, Ordering::SeqCst);
        }

        pub fn lookup_count(&self) -> usize {
            self.lookups.load(Ordering::SeqCst)
        }

        /// Calls to `find_by_id`
        pub fn name_lookup_count(&self) -> usize {
            self.name_lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ProviderStore for InMemoryProviderStore {
        async fn average_service_duration(&self, id: &ProviderId) -> Result<DurationLookup> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail_lookups.load(Ordering::SeqCst) {
                return Err(AppError::Database("provider lookup failed".to_string()));
            }
            Ok(match self.providers.lock().unwrap().get(id) {
                Some(p) => DurationLookup::Found(p.average_service_minutes),
                None => DurationLookup::NotFound,
            })
        }

        async fn insert(&self, provider: &Provider) -> Result<()> {
            self.providers
                .lock()
                .unwrap()
                .insert(provider.id.clone(), provider.clone());
            Ok(())
        }

        async fn find_by_id(&self, id: &ProviderId) -> Result<Option<Provider>> {
            self.name_lookups.fetch_add(1, Ordering::SeqCst);
            if self.fail_lookups.load(Ordering::SeqCst) {
                return Err(AppError::Database("provider lookup failed".to_string()));
            }
            Ok(self.providers.lock().unwrap().get(id).cloned())
        }

        async fn list_by_shop(&self, shop_id: &str) -> Result<Vec<Provider>> {
            let mut list: Vec<Provider> = self
                .providers
                .lock()
                .unwrap()
                .values()
                .filter(|p| p.shop_id == shop_id)
                .cloned()
                .collect();
            list.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(list)
        }

        async fn update(&self, provider: &Provider) -> Result<()> {
            let mut map = self.providers.lock().unwrap();
            match map.get_mut(&provider.id) {
                Some(existing) => {
                    *existing = provider.clone();
                    Ok(())
                }
                None => Err(AppError::NotFound(format!(
                    "Provider {} not found",
                    provider.id
                ))),
            }
        }
    }
}
