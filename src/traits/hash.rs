//! Hash algorithms used to route records to partitions.
//!
//! Routing must give the same partition for the same key in every process, so
//! only hashers without a random seed are offered.
//!
//! - `FastHash`: FxHash, the default router
//! - `CryptoHash`: SHA-256 folded to 64 bits, for adversarial key sets

use std::hash::{Hash, Hasher};

use crate::value::Value;

pub trait HashAlgorithm {
    type Hasher: Hasher + Default;

    fn new_hasher() -> Self::Hasher {
        Self::Hasher::default()
    }

    fn hash_value(value: &Value) -> u64 {
        let mut hasher = Self::new_hasher();
        value.hash(&mut hasher);
        hasher.finish()
    }

    /// Partition index in `0..partitions` for a key. Zero partitions is treated
    /// as one.
    fn partition_for(value: &Value, partitions: usize) -> usize {
        let partitions = partitions.max(1) as u64;
        (Self::hash_value(value) % partitions) as usize
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FastHash;

impl HashAlgorithm for FastHash {
    type Hasher = rustc_hash::FxHasher;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoHash;

/// Buffers the written bytes and digests them with SHA-256 on `finish`.
#[derive(Default)]
pub struct Sha256Hasher {
    data: Vec<u8>,
}

impl Hasher for Sha256Hasher {
    fn finish(&self) -> u64 {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(&self.data);
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest[..8]);
        u64::from_be_bytes(head)
    }

    fn write(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }
}

impl HashAlgorithm for CryptoHash {
    type Hasher = Sha256Hasher;
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn test_fast_hash_is_stable() {
        let key = Value::from("order-17");
        assert_eq!(FastHash::hash_value(&key), FastHash::hash_value(&key.clone()));
        assert_ne!(
            FastHash::hash_value(&Value::Int(1)),
            FastHash::hash_value(&Value::Long(1))
        );
    }

    #[test]
    fn test_crypto_hash_differs_from_fast_hash() {
        let key = Value::Long(42);
        assert_ne!(FastHash::hash_value(&key), CryptoHash::hash_value(&key));
        assert_eq!(CryptoHash::hash_value(&key), CryptoHash::hash_value(&key));
    }

    #[test]
    fn test_single_partition_takes_everything() {
        for i in 0..100 {
            assert_eq!(FastHash::partition_for(&Value::Int(i), 1), 0);
            assert_eq!(FastHash::partition_for(&Value::Int(i), 0), 0);
        }
    }

    quickcheck! {
        fn prop_partition_in_range_and_deterministic(key: i64, partitions: u8) -> bool {
            let n = partitions as usize;
            let value = Value::Long(key);
            let p = FastHash::partition_for(&value, n);
            p < n.max(1) && p == FastHash::partition_for(&value, n)
        }
    }
}
