//! Per-primitive facades over a [`KeyedPoolRegistry`]

use crate::config::PoolConfig;
use crate::digest::{DigestFactory, MessageDigest};
use crate::errors::PoolResult;
use crate::factory::ResourceFactory;
use crate::pool::Pooled;
use crate::prng::{PrngFactory, SecureRandom};
use crate::registry::{KeyedPoolRegistry, PoolKey};
use crate::spec::{DigestSpec, PrngSpec};
use crate::stats::PoolStats;

use std::sync::Arc;

/// Configuration of one kind of primitive
///
/// Ties a spec to the resource it describes and the factory that builds it.
pub trait PrimitiveSpec: Clone + Send + Sync + 'static {
    type Resource: Send + Sync + 'static;
    type Factory: ResourceFactory<Self::Resource>;

    fn provider_name(&self) -> Option<&str>;

    fn algorithm_name(&self) -> Option<&str>;

    /// Look up the provider and algorithm and return a factory for them
    fn factory(&self) -> PoolResult<Self::Factory>;

    /// Registry key, absent names count as empty
    fn key(&self) -> PoolKey {
        PoolKey::new(self.provider_name(), self.algorithm_name())
    }
}

impl PrimitiveSpec for DigestSpec {
    type Resource = MessageDigest;
    type Factory = DigestFactory;

    fn provider_name(&self) -> Option<&str> {
        DigestSpec::provider_name(self)
    }

    fn algorithm_name(&self) -> Option<&str> {
        DigestSpec::algorithm_name(self)
    }

    fn factory(&self) -> PoolResult<DigestFactory> {
        DigestFactory::new(self)
    }
}

impl PrimitiveSpec for PrngSpec {
    type Resource = SecureRandom;
    type Factory = PrngFactory;

    fn provider_name(&self) -> Option<&str> {
        PrngSpec::provider_name(self)
    }

    fn algorithm_name(&self) -> Option<&str> {
        PrngSpec::algorithm_name(self)
    }

    fn factory(&self) -> PoolResult<PrngFactory> {
        PrngFactory::new(self)
    }
}

/// Hands out primitives of one kind: fresh, shared or pooled
///
/// Each facade owns its registry, so independent facades never share pools.
///
/// # Examples
///
/// ```
/// use cryptopool::{DigestSpec, MessageDigestFactory, PoolConfig};
///
/// let facade = MessageDigestFactory::new();
/// let spec = DigestSpec::default();
///
/// let digest = facade.get_pooled_instance(&spec, &PoolConfig::default()).unwrap();
/// digest.update(b"hello");
/// facade.return_pooled_instance(&spec, digest).unwrap();
///
/// let stats = facade.get_pool_stats(&spec).unwrap();
/// assert_eq!(stats.num_idle, 1);
/// assert_eq!(stats.count_returned, 1);
/// ```
pub struct PrimitiveFacade<S: PrimitiveSpec> {
    registry: KeyedPoolRegistry<PoolKey, S::Resource>,
}

/// Facade for message digests
pub type MessageDigestFactory = PrimitiveFacade<DigestSpec>;

/// Facade for secure random generators
pub type SecureRandomFactory = PrimitiveFacade<PrngSpec>;

impl<S: PrimitiveSpec> Default for PrimitiveFacade<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PrimitiveSpec> PrimitiveFacade<S> {
    pub fn new() -> Self {
        Self {
            registry: KeyedPoolRegistry::new(),
        }
    }

    /// A new, unshared instance
    pub fn get_instance(&self, spec: &S) -> PoolResult<S::Resource> {
        spec.factory()?.create()
    }

    /// The instance shared by every caller asking for the same provider and
    /// algorithm
    pub fn get_singleton(&self, spec: &S) -> PoolResult<Arc<S::Resource>> {
        let factory = spec.factory()?;
        self.registry.get_or_create_singleton(&spec.key(), || factory)
    }

    /// Borrow an instance from the pool for `spec`
    ///
    /// The pool is created with `config` on first use; afterwards `config` is
    /// ignored for this provider and algorithm.
    pub fn get_pooled_instance(&self, spec: &S, config: &PoolConfig) -> PoolResult<Pooled<S::Resource>> {
        let key = spec.key();
        let factory = match self.registry.pool(&key) {
            Some(pool) => return pool.borrow(),
            None => spec.factory()?,
        };
        self.registry.borrow_from(&key, config, || factory)
    }

    /// Return a borrowed instance to the pool for `spec`
    pub fn return_pooled_instance(&self, spec: &S, resource: Pooled<S::Resource>) -> PoolResult<()> {
        self.registry.return_to(&spec.key(), resource)
    }

    /// Statistics of the pool for `spec`
    pub fn get_pool_stats(&self, spec: &S) -> PoolResult<PoolStats> {
        self.registry.stats_for(&spec.key())
    }

    /// Close every pool and drop every singleton
    pub fn reset(&self) {
        self.registry.reset();
    }

    pub fn registry(&self) -> &KeyedPoolRegistry<PoolKey, S::Resource> {
        &self.registry
    }
}
