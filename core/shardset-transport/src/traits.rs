use crate::error::TransportError;

/// An outstanding non-blocking fetch.
///
/// Returned by [`Transport::fetch_nb`] and consumed by [`Transport::wait`].
/// There is no way to inspect or drop a handle without waiting on it through
/// the transport — the only way back to "no outstanding fetch" is an
/// explicit wait, which is what lets `shardset-core`'s pipeline enforce the
/// "every issued fetch is matched by a completion" invariant.
pub struct FetchHandle {
    completion: crossbeam_channel::Receiver<Result<(), TransportError>>,
}

impl FetchHandle {
    pub fn new(completion: crossbeam_channel::Receiver<Result<(), TransportError>>) -> Self {
        Self { completion }
    }

    /// Blocks until the fetch this handle refers to has observably
    /// completed, i.e. until subsequent reads of the destination buffer see
    /// the fetched values.
    pub fn block_until_complete(self) -> Result<(), TransportError> {
        self.completion.recv().unwrap_or_else(|_| {
            Err(TransportError::Wait { reason: "completion sender was dropped".to_string() })
        })
    }
}

/// The primitives the core consumes from the PGAS runtime.
///
/// Any implementation providing these with the stated semantics is
/// admissible: a production PGAS runtime, this crate's in-process
/// [`crate::LocalTransport`] mock for tests, or a network-simulation
/// transport for fault injection. The core is polymorphic over this
/// capability set and never matches on a concrete transport type.
///
/// Fetches and CAS operations on the same bucket are *not* serialized by the
/// transport; `shardset-core` achieves linearizability of membership via
/// the CAS semantics alone.
pub trait Transport: Send + Sync {
    /// Initiates an asynchronous copy of `n_buckets` contiguous buckets
    /// starting at the logical address `src_addr` into `dst`. Returns
    /// immediately with a handle; `dst` must remain valid and untouched by
    /// the caller until [`Transport::wait`] returns.
    fn fetch_nb(
        &self,
        dst: &mut [u64],
        src_addr: u64,
        n_buckets: usize,
    ) -> Result<FetchHandle, TransportError>;

    /// Blocks until `handle`'s fetch observably completes.
    fn wait(&self, handle: FetchHandle) -> Result<(), TransportError> {
        handle.block_until_complete()
    }

    /// Strictly ordered, remote-capable compare-and-swap. Always returns the
    /// word that was actually present at `addr`; success is indicated by
    /// `observed == expected`.
    fn cas(&self, addr: u64, expected: u64, desired: u64) -> Result<u64, TransportError>;

    /// Pure address arithmetic: which shard owns the bucket at `addr`.
    fn owner_of(&self, addr: u64) -> usize;

    /// Pure address arithmetic: `addr`'s offset within its owning shard.
    fn offset_in_shard(&self, addr: u64) -> u64;
}

/// The external collaborator providing cluster bootstrap / process launch /
/// barrier primitives, kept out of scope for the core probing algorithm.
pub trait ClusterRuntime: Send + Sync {
    /// This process's rank, in `[0, world_size())`.
    fn rank(&self) -> usize;

    /// Total number of processes participating in the shared table.
    fn world_size(&self) -> usize;

    /// Collective synchronization across all processes. Must be called
    /// after [`crate::LocalTransport`] construction and before the first
    /// `find_or_put`, and again before teardown.
    fn barrier(&self);
}
