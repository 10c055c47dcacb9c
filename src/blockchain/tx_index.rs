use parking_lot::RwLock;
use std::collections::HashMap;

use crate::blockchain::registry::SubscriptionRegistry;
use crate::models::{Address, Transaction};

/// Per-address, append-only transaction history.
///
/// Sequences are ordered by block-processing order and, within a block, by
/// the node's transaction order. Nothing is ever removed or reordered.
#[derive(Default)]
pub struct TransactionIndex {
    entries: RwLock<HashMap<Address, Vec<Transaction>>>,
}

impl TransactionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current sequence for `address`, empty when nothing was recorded.
    pub fn get(&self, address: &Address) -> Vec<Transaction> {
        self.entries.read().get(address).cloned().unwrap_or_default()
    }

    /// Number of addresses with at least one recorded transaction.
    pub fn address_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Total number of recorded (address, transaction) entries.
    pub fn entry_count(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    /// Append every transaction of one block to the sequences of its
    /// subscribed sender and receiver. Returns the number of entries added.
    ///
    /// Lock order is registry (read) then index (write), both held for the
    /// whole block: a concurrent `subscribe` lands either before or after the
    /// block, never in the middle of it.
    ///
    /// A transaction whose sender and receiver are the same address is
    /// recorded once for that address.
    pub fn distribute(&self, registry: &SubscriptionRegistry, transactions: &[Transaction]) -> usize {
        let subscribed = registry.read();
        if subscribed.is_empty() {
            return 0;
        }

        let mut entries = self.entries.write();
        let mut appended = 0;

        for tx in transactions {
            let sender = tx.sender();
            let receiver = tx.receiver();

            if subscribed.contains(&sender) {
                entries.entry(sender.clone()).or_default().push(tx.clone());
                appended += 1;
            }

            if let Some(receiver) = receiver {
                if receiver != sender && subscribed.contains(&receiver) {
                    entries.entry(receiver).or_default().push(tx.clone());
                    appended += 1;
                }
            }
        }

        appended
    }
}
