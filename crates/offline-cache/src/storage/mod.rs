//! # Storage Providers
//!
//! In-memory and on-disk implementations of [`CacheStorage`].

pub use self::file::FileStorage;
pub use self::memory::MemoryStorage;
pub use self::provider::CacheStorage;

pub mod provider;

pub mod file;
pub mod memory;
