//! Shared Key-Value Store Abstraction
//!
//! The accumulator only needs five operations from the shared store:
//! set-if-absent with a TTL, append, expire, glob key enumeration and get.
//!
//! Implementations:
//! - `InMemoryStore`: For unit tests and single-process embedding
//! - `RedisStore`: For production

mod glob;
mod in_memory;
mod redis_store;

pub use glob::glob_match;
pub use in_memory::InMemoryStore;
pub use redis_store::RedisStore;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Boxed future returned by store operations
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Error type for shared store operations
#[derive(Debug)]
pub enum StoreError {
    /// Could not reach the store
    Connection(String),
    /// The store rejected or failed a command
    Command(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Connection(msg) => write!(f, "store connection error: {}", msg),
            StoreError::Command(msg) => write!(f, "store command error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Key-value store trait
///
/// Each individual operation must be atomic with respect to a single key;
/// no atomicity is promised across operations.
pub trait KvStore: Send + Sync + 'static {
    /// Store `value` under `key` with a TTL, only if `key` is absent.
    /// Returns true when the key was created.
    fn set_if_absent<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> StoreFuture<'a, bool>;

    /// Append `value` to the string under `key`, returning the new length
    fn append<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, usize>;

    /// Set the TTL of a live key. Returns false when the key is absent.
    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, bool>;

    /// Enumerate live keys matching a glob pattern
    fn keys<'a>(&'a self, pattern: &'a str) -> StoreFuture<'a, Vec<String>>;

    /// Get the string under `key`
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;
}

impl<S: KvStore + ?Sized> KvStore for std::sync::Arc<S> {
    fn set_if_absent<'a>(
        &'a self,
        key: &'a str,
        value: &'a str,
        ttl: Duration,
    ) -> StoreFuture<'a, bool> {
        (**self).set_if_absent(key, value, ttl)
    }

    fn append<'a>(&'a self, key: &'a str, value: &'a str) -> StoreFuture<'a, usize> {
        (**self).append(key, value)
    }

    fn expire<'a>(&'a self, key: &'a str, ttl: Duration) -> StoreFuture<'a, bool> {
        (**self).expire(key, ttl)
    }

    fn keys<'a>(&'a self, pattern: &'a str) -> StoreFuture<'a, Vec<String>> {
        (**self).keys(pattern)
    }

    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        (**self).get(key)
    }
}
