use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashSet;
use tracing::info;

use crate::error::SubscriptionError;

#[async_trait]
pub trait SubscriptionSource: Send + Sync {
    async fn is_subscribed(&self, user_id: &str) -> Result<bool, SubscriptionError>;
}

/// Subscription tiers held in memory, seeded from configuration.
#[derive(Default)]
pub struct StaticSubscriptions {
    subscribed: RwLock<HashSet<String>>,
}

impl StaticSubscriptions {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            subscribed: RwLock::new(users.into_iter().map(Into::into).collect()),
        }
    }

    pub fn subscribe(&self, user_id: &str) {
        if self.subscribed.write().insert(user_id.to_string()) {
            info!("User {} subscribed", user_id);
        }
    }

    pub fn unsubscribe(&self, user_id: &str) {
        if self.subscribed.write().remove(user_id) {
            info!("User {} unsubscribed", user_id);
        }
    }
}

#[async_trait]
impl SubscriptionSource for StaticSubscriptions {
    async fn is_subscribed(&self, user_id: &str) -> Result<bool, SubscriptionError> {
        Ok(self.subscribed.read().contains(user_id))
    }
}
