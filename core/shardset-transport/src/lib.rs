//! Transport and cluster-runtime collaborators consumed by `shardset-core`,
//! plus an in-process reference implementation used by its tests and by
//! `shardset-bench` for single-host throughput measurement.

mod error;
mod local;
mod traits;

pub use error::TransportError;
pub use local::{LocalCluster, LocalRuntime, LocalTransport};
pub use traits::{ClusterRuntime, FetchHandle, Transport};
