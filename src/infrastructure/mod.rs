//! Infrastructure adapters implementing the domain ports.
//!
//! This module provides the storage backends (in-memory by default, RocksDB
//! behind the `storage-rocksdb` feature) and the sandbox payment gateways
//! used by the CLI and the test suites.

pub mod gateways;
pub mod in_memory;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
