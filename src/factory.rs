//! Resource factories used by pools to manage resource lifecycles

use crate::errors::PoolResult;

/// Creates, checks and disposes of the resources held by an
/// [`ObjectPool`](crate::ObjectPool)
///
/// Only `create` is required. The pool calls `validate` according to its
/// `test_on_*` settings, `reset` every time a resource comes back, and
/// `destroy` whenever it gives a resource up.
///
/// # Examples
///
/// ```
/// use cryptopool::{ObjectPool, PoolConfig, PoolResult, ResourceFactory};
///
/// struct Buffers;
///
/// impl ResourceFactory<Vec<u8>> for Buffers {
///     fn create(&self) -> PoolResult<Vec<u8>> {
///         Ok(Vec::with_capacity(4096))
///     }
///
///     fn reset(&self, buffer: &mut Vec<u8>) {
///         buffer.clear();
///     }
/// }
///
/// let pool = ObjectPool::new(Buffers, PoolConfig::default()).unwrap();
/// let mut buffer = pool.borrow().unwrap();
/// buffer.extend_from_slice(b"scratch");
/// pool.return_object(buffer).unwrap();
///
/// assert!(pool.borrow().unwrap().is_empty());
/// ```
pub trait ResourceFactory<T>: Send + Sync + 'static {
    /// Build a new resource
    fn create(&self) -> PoolResult<T>;

    /// Dispose of a resource the pool no longer keeps
    fn destroy(&self, resource: T) {
        drop(resource);
    }

    /// Check whether a resource is still usable
    fn validate(&self, _resource: &T) -> bool {
        true
    }

    /// Bring a returned resource back to a clean state
    fn reset(&self, _resource: &mut T) {}
}

/// Closure based factory
///
/// ```
/// use cryptopool::{FnFactory, ObjectPool, PoolConfig};
///
/// let pool = ObjectPool::new(FnFactory::new(|| Ok(42)), PoolConfig::default()).unwrap();
/// assert_eq!(*pool.borrow().unwrap(), 42);
/// ```
pub struct FnFactory<F> {
    create: F,
}

impl<F> FnFactory<F> {
    pub fn new<T>(create: F) -> Self
    where
        F: Fn() -> PoolResult<T> + Send + Sync + 'static,
    {
        Self { create }
    }
}

impl<T, F> ResourceFactory<T> for FnFactory<F>
where
    F: Fn() -> PoolResult<T> + Send + Sync + 'static,
{
    fn create(&self) -> PoolResult<T> {
        (self.create)()
    }
}
