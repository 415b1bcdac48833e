//! Key/value caches for feedx version markers.
//!
//! Consumers remember the last marker they fully read; recurring producers
//! remember the last source revision they pushed. Both go through the
//! [`Cache`] contract, usually via a [`CacheValue`] slot bound to one key.
//!
//! - [`MemoryCache`] -- process-local, single lock
//! - [`FileCache`] -- JSON file, rewritten atomically on every mutation

pub mod error;
pub mod file;
pub mod memory;
pub mod traits;

pub use error::{CacheError, CacheResult};
pub use file::FileCache;
pub use memory::MemoryCache;
pub use traits::{Cache, CacheValue};
