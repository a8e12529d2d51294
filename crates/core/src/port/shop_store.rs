// Shop Store Port (Interface)

use crate::domain::ShopConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Store interface for shop configuration
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Shop notification config; `None` if the shop does not exist
    async fn get_config(&self, shop_id: &str) -> Result<Option<ShopConfig>>;

    /// Create or replace a shop
    async fn upsert(&self, config: &ShopConfig) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory ShopStore
    #[derive(Default)]
    pub struct InMemoryShopStore {
        shops: Mutex<HashMap<String, ShopConfig>>,
        fail: AtomicBool,
    }

    impl InMemoryShopStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_shop(config: ShopConfig) -> Self {
            let store = Self::new();
            store
                .shops
                .lock()
                .unwrap()
                .insert(config.id.clone(), config);
            store
        }

        pub fn set_fail(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ShopStore for InMemoryShopStore {
        async fn get_config(&self, shop_id: &str) -> Result<Option<ShopConfig>> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(AppError::Database("shop lookup failed".to_string()));
            }
            Ok(self.shops.lock().unwrap().get(shop_id).cloned())
        }

        async fn upsert(&self, config: &ShopConfig) -> Result<()> {
            self.shops
                .lock()
                .unwrap()
                .insert(config.id.clone(), config.clone());
            Ok(())
        }
    }
}
