//! Durable key/value storage shared by all cache stores.
//!
//! This module provides:
//! - `DurableStorage`: string values addressed by flat keys
//! - `FileStorage`: one file per key under the cache directory
//! - `MemoryStorage`: in-process storage for embedding and tests
//! - `StorageBus`: change notifications so every store sees writes made
//!   by other writers sharing the same storage

pub mod bus;
pub mod durable;

pub use bus::{StorageBus, StorageEvent, WriterId};
pub use durable::{DurableStorage, FileStorage, MemoryStorage};
