use parking_lot::{RwLock, RwLockReadGuard};
use std::collections::HashSet;

use crate::models::Address;

/// Set of addresses whose activity is being indexed.
#[derive(Default)]
pub struct SubscriptionRegistry {
    addresses: RwLock<HashSet<Address>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an address. Returns `false` when it was already present.
    pub fn subscribe(&self, address: Address) -> bool {
        self.addresses.write().insert(address)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.read().contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.read().is_empty()
    }

    /// Sorted copy of the current subscriptions.
    pub fn snapshot(&self) -> Vec<Address> {
        let mut addresses: Vec<Address> = self.addresses.read().iter().cloned().collect();
        addresses.sort();
        addresses
    }

    /// Shared guard used by block distribution. Holding it blocks `subscribe`.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, HashSet<Address>> {
        self.addresses.read()
    }
}
