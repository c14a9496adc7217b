//! Secure random generators backed by the `rand` crate

use crate::errors::{PoolError, PoolResult};
use crate::factory::ResourceFactory;
use crate::spec::PrngSpec;

use parking_lot::Mutex;
use rand::rngs::{OsRng, StdRng};
use rand::{RngCore, SeedableRng};
use std::fmt;

pub const DEFAULT_PRNG_PROVIDER: &str = "rand";

pub const DEFAULT_PRNG_ALGORITHM: &str = "StdRng";

/// Generator algorithms the default provider supports
pub const PRNG_ALGORITHMS: [&str; 2] = ["StdRng", "OsRng"];

enum Generator {
    /// Cryptographically secure generator seeded from the operating system
    Std(Box<StdRng>),
    /// Operating system randomness on every call
    Os,
}

/// A cryptographically secure random generator
///
/// # Examples
///
/// ```
/// use cryptopool::{PrngSpec, SecureRandomFactory};
///
/// let facade = SecureRandomFactory::new();
/// let random = facade.get_instance(&PrngSpec::default()).unwrap();
/// assert_eq!(random.algorithm(), "StdRng");
///
/// let mut key = [0u8; 32];
/// random.fill_bytes(&mut key);
/// assert_ne!(key, [0u8; 32]);
/// ```
pub struct SecureRandom {
    algorithm: &'static str,
    provider: &'static str,
    generator: Mutex<Generator>,
}

impl SecureRandom {
    /// Fill `dest` with random bytes
    pub fn fill_bytes(&self, dest: &mut [u8]) {
        match &mut *self.generator.lock() {
            Generator::Std(rng) => rng.fill_bytes(dest),
            Generator::Os => OsRng.fill_bytes(dest),
        }
    }

    /// Fill `dest` with random bytes, reporting generator failures
    pub fn try_fill_bytes(&self, dest: &mut [u8]) -> Result<(), rand::Error> {
        match &mut *self.generator.lock() {
            Generator::Std(rng) => rng.try_fill_bytes(dest),
            Generator::Os => OsRng.try_fill_bytes(dest),
        }
    }

    pub fn next_u32(&self) -> u32 {
        match &mut *self.generator.lock() {
            Generator::Std(rng) => rng.next_u32(),
            Generator::Os => OsRng.next_u32(),
        }
    }

    pub fn next_u64(&self) -> u64 {
        match &mut *self.generator.lock() {
            Generator::Std(rng) => rng.next_u64(),
            Generator::Os => OsRng.next_u64(),
        }
    }

    pub fn algorithm(&self) -> &str {
        self.algorithm
    }

    pub fn provider(&self) -> &str {
        self.provider
    }
}

impl fmt::Debug for SecureRandom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureRandom")
            .field("algorithm", &self.algorithm)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Builds [`SecureRandom`] instances for one provider and algorithm
#[derive(Debug, Clone, Copy)]
pub struct PrngFactory {
    algorithm: &'static str,
    provider: &'static str,
}

impl PrngFactory {
    pub fn new(spec: &PrngSpec) -> PoolResult<Self> {
        let provider = match spec.provider_name() {
            None | Some("") => {
                tracing::info!(provider = DEFAULT_PRNG_PROVIDER, "no random generator provider given, using the default");
                DEFAULT_PRNG_PROVIDER
            }
            Some(name) if name.eq_ignore_ascii_case(DEFAULT_PRNG_PROVIDER) => DEFAULT_PRNG_PROVIDER,
            Some(name) => {
                tracing::warn!(provider = name, "unknown random generator provider");
                return Err(PoolError::ProviderUnavailable(name.to_string()));
            }
        };

        let algorithm = match spec.algorithm_name() {
            None | Some("") => {
                tracing::info!(
                    algorithm = DEFAULT_PRNG_ALGORITHM,
                    "no random generator algorithm given, using the default"
                );
                DEFAULT_PRNG_ALGORITHM
            }
            Some(name) => PRNG_ALGORITHMS
                .iter()
                .find(|known| known.eq_ignore_ascii_case(name))
                .copied()
                .ok_or_else(|| {
                    tracing::warn!(algorithm = name, provider, "unknown random generator algorithm");
                    PoolError::AlgorithmUnavailable(name.to_string())
                })?,
        };

        Ok(Self { algorithm, provider })
    }

    pub fn algorithm(&self) -> &'static str {
        self.algorithm
    }
}

impl ResourceFactory<SecureRandom> for PrngFactory {
    fn create(&self) -> PoolResult<SecureRandom> {
        let generator = match self.algorithm {
            "OsRng" => Generator::Os,
            _ => {
                let rng = StdRng::from_rng(OsRng).map_err(|err| PoolError::FactoryError(err.to_string()))?;
                Generator::Std(Box::new(rng))
            }
        };

        Ok(SecureRandom {
            algorithm: self.algorithm,
            provider: self.provider,
            generator: Mutex::new(generator),
        })
    }
}
