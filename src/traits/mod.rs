pub mod engine;
pub mod hash;

pub use engine::{EngineCursor, StorageEngine};
pub use hash::{CryptoHash, FastHash, HashAlgorithm};
