//! Bookkeeping behind the dedup policies.

use std::collections::HashSet;

use crate::config::DedupPolicy;

/// Decides, per add, whether a key's stored entry is replaced or appended to.
///
/// Keys are tracked in their encoded form.
#[derive(Debug, Default)]
pub struct ChangeTracker {
    policy: DedupPolicy,
    remembered: HashSet<Vec<u8>>,
}

impl ChangeTracker {
    pub fn new(policy: DedupPolicy) -> Self {
        Self {
            policy,
            remembered: HashSet::new(),
        }
    }

    pub fn policy(&self) -> DedupPolicy {
        self.policy
    }

    /// Returns `true` when the next add for `key` must replace the existing
    /// entry. Nothing is recorded until [`ChangeTracker::record`] is called.
    pub fn should_replace(&self, key: &[u8]) -> bool {
        match self.policy {
            DedupPolicy::Accumulate => false,
            DedupPolicy::NoDuplicateKeys => true,
            DedupPolicy::RememberedKeys { .. } => !self.remembered.contains(key),
        }
    }

    /// Records a key whose add was written, for the remembered-keys policy.
    pub fn record(&mut self, key: &[u8]) {
        let DedupPolicy::RememberedKeys { sorted_arrival } = self.policy else {
            return;
        };
        if self.remembered.contains(key) {
            return;
        }
        if sorted_arrival {
            self.remembered.clear();
        }
        self.remembered.insert(key.to_vec());
    }

    pub fn remembered_len(&self) -> usize {
        self.remembered.len()
    }
}
