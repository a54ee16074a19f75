use std::collections::HashMap;

use parking_lot::RwLock;

use crate::domain::id::UserId;
use crate::domain::subscription::Subscription;
use crate::error::StoreError;
use crate::port::outbound::store::SubscriptionStore;

/// Subscriptions keyed by `(user, filter)`.
#[derive(Default)]
pub struct MemorySubscriptionStore {
    subscriptions: RwLock<HashMap<(UserId, String), Subscription>>,
}

impl MemorySubscriptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let store = Self::new();
        {
            let mut map = store.subscriptions.write();
            for sub in subscriptions {
                map.insert((sub.user, sub.filter.to_string()), sub);
            }
        }
        store
    }
}

fn sorted(mut subs: Vec<Subscription>) -> Vec<Subscription> {
    subs.sort_by(|a, b| {
        a.user
            .value()
            .cmp(&b.user.value())
            .then_with(|| a.filter.to_string().cmp(&b.filter.to_string()))
    });
    subs
}

impl SubscriptionStore for MemorySubscriptionStore {
    fn upsert(&self, subscription: &Subscription) -> Result<(), StoreError> {
        self.subscriptions.write().insert(
            (subscription.user, subscription.filter.to_string()),
            subscription.clone(),
        );
        Ok(())
    }

    fn active(&self) -> Result<Vec<Subscription>, StoreError> {
        let subs = self
            .subscriptions
            .read()
            .values()
            .filter(|s| s.active)
            .cloned()
            .collect();
        Ok(sorted(subs))
    }

    fn for_user(&self, user: UserId) -> Result<Vec<Subscription>, StoreError> {
        let subs = self
            .subscriptions
            .read()
            .values()
            .filter(|s| s.user == user)
            .cloned()
            .collect();
        Ok(sorted(subs))
    }
}
