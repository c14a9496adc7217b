//! # cryptopool
//!
//! Thread-safe object pools for expensive-to-construct resources, with keyed
//! factories for message digests and secure random generators.
//!
//! ## Features
//!
//! - Bounded pools with blocking, timed or failing borrows
//! - Automatic return of borrowed resources via RAII (Drop trait)
//! - Optional validation on create, borrow, return and while idle
//! - Background eviction of idle resources with hard and soft idle limits
//! - LIFO or FIFO idle ordering, fair wake-up of blocked borrowers
//! - Running statistics with rolling mean timings
//! - Keyed registries creating at most one pool and one singleton per key
//! - Digest (SHA-2 family) and secure random facades
//!
//! ## Quick Start
//!
//! ```rust
//! use cryptopool::{digest_str, DigestSpec, MessageDigestFactory, PoolConfig};
//!
//! let digests = MessageDigestFactory::new();
//! let spec = DigestSpec::new("SHA-256");
//!
//! {
//!     let digest = digests.get_pooled_instance(&spec, &PoolConfig::default()).unwrap();
//!     digest.update(b"abc");
//!     assert_eq!(digest.digest().len(), 32);
//!     // Digest automatically returned when `digest` goes out of scope
//! }
//!
//! let hash = digest_str(&digests, "abc", &spec).unwrap();
//! assert_eq!(hash[0], 0xba);
//! assert_eq!(digests.get_pool_stats(&spec).unwrap().num_idle, 1);
//! ```

mod config;
mod digest;
mod errors;
mod eviction;
mod facade;
mod factory;
mod pool;
mod prng;
mod registry;
mod spec;
mod stats;

pub use config::PoolConfig;
pub use digest::{
    digest_bytes, digest_bytes_with_config, digest_str, DigestFactory, MessageDigest, DEFAULT_DIGEST_PROVIDER,
    DIGEST_ALGORITHMS,
};
pub use errors::{PoolError, PoolResult};
pub use eviction::{EvictionContext, EvictionPolicy};
pub use facade::{MessageDigestFactory, PrimitiveFacade, PrimitiveSpec, SecureRandomFactory};
pub use factory::{FnFactory, ResourceFactory};
pub use pool::{ObjectPool, Pooled};
pub use prng::{PrngFactory, SecureRandom, DEFAULT_PRNG_ALGORITHM, DEFAULT_PRNG_PROVIDER, PRNG_ALGORITHMS};
pub use registry::{KeyedPoolRegistry, PoolKey};
pub use spec::{DigestSpec, PrngSpec};
pub use stats::{PoolStats, MEAN_WINDOW};
