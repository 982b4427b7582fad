//! A concurrent, distributed open-addressing hash set over a shared PGAS
//! table, split across shards and probed with CAS.
//!
//! The core algorithm in [`Context::find_or_put`] is transport-, cluster-
//! and hash-agnostic: it is generic over the [`shardset_transport::Transport`],
//! [`shardset_transport::ClusterRuntime`] and [`shardset_hash::AvalancheHash`]
//! traits, so this crate has no concrete dependency on any particular
//! network, runtime, or hash function. `shardset-transport`'s `LocalCluster`
//! is the in-process reference implementation used by this crate's own
//! tests and benchmarks; a production deployment supplies its own.

mod address;
mod bucket;
mod config;
mod context;
pub mod metrics;
mod pipeline;
mod result;

pub mod error;

pub use bucket::Bucket;
pub use config::Config;
pub use context::Context;
pub use error::{ConfigError, ShardSetError};
pub use result::FindOrPut;

pub use shardset_hash::AvalancheHash;
pub use shardset_transport::{ClusterRuntime, Transport};
