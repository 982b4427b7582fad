use crate::error::TransportError;
use crate::traits::{ClusterRuntime, FetchHandle, Transport};
use crossbeam::utils::CachePadded;
use std::sync::Arc;
use std::sync::Barrier;
use std::sync::atomic::{AtomicU64, Ordering};

/// The shared table backing an in-process [`LocalCluster`]: one contiguous,
/// cache-line-aligned array of `world_size * block_size` buckets, laid out
/// with a blocked (not round-robin) distribution: shard `r` owns indices
/// `[r * block_size, (r + 1) * block_size)`.
struct TableStorage {
    buckets: Vec<CachePadded<AtomicU64>>,
    block_size: u64,
    world_size: usize,
}

impl TableStorage {
    fn new(block_size: u64, world_size: usize) -> Self {
        let len = block_size as usize * world_size;
        let mut buckets = Vec::with_capacity(len);
        buckets.resize_with(len, || CachePadded::new(AtomicU64::new(0)));
        Self { buckets, block_size, world_size }
    }
}

/// An in-process, single-host reference implementation of [`Transport`] and
/// [`ClusterRuntime`].
///
/// All simulated ranks share one [`TableStorage`], so tests can exercise
/// genuine cross-rank CAS races within a single OS process. Fetches are
/// staged through a small `rayon` worker pool: the
/// actual bucket reads happen synchronously (they are just atomic loads
/// against local memory, so there is no real latency to hide), and a
/// worker-pool round trip is still interposed between issue and wait so
/// that the handle discipline — issue now, wait later, never drop a live
/// handle — is exercised the same way it would be against a real transport.
pub struct LocalCluster {
    table: Arc<TableStorage>,
    pool: Arc<rayon::ThreadPool>,
    barrier: Arc<Barrier>,
}

impl LocalCluster {
    /// Builds a cluster of `world_size` simulated ranks sharing one table of
    /// `block_size` buckets per rank, all within this OS process.
    pub fn new_single_process(block_size: u64, world_size: usize) -> Self {
        let table = Arc::new(TableStorage::new(block_size, world_size));
        let pool = Arc::new(
            rayon::ThreadPoolBuilder::new()
                .num_threads(world_size.max(1))
                .thread_name(|i| format!("shardset-local-fetch-{i}"))
                .build()
                .expect("failed to build shardset-transport worker pool"),
        );
        let barrier = Arc::new(Barrier::new(world_size.max(1)));
        Self { table, pool, barrier }
    }

    /// Returns the (transport, runtime) pair for simulated process `rank`.
    pub fn handle_for(&self, rank: usize) -> (LocalTransport, LocalRuntime) {
        assert!(rank < self.table.world_size, "rank out of range for this cluster");
        (
            LocalTransport {
                table: self.table.clone(),
                pool: self.pool.clone(),
                rank,
            },
            LocalRuntime { rank, world_size: self.table.world_size, barrier: self.barrier.clone() },
        )
    }

    pub fn world_size(&self) -> usize {
        self.table.world_size
    }

    pub fn block_size(&self) -> u64 {
        self.table.block_size
    }

    /// Reads a bucket's raw word without going through CAS. Exists for test
    /// assertions: a real transport has no such back door, since a remote
    /// process cannot peek at another shard's memory outside the
    /// fetch/CAS protocol, but this in-process reference implementation
    /// can offer one cheaply.
    pub fn peek(&self, addr: u64) -> u64 {
        let table_len = self.table.block_size * self.table.world_size as u64;
        self.table.buckets[(addr % table_len) as usize].load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
pub struct LocalTransport {
    table: Arc<TableStorage>,
    pool: Arc<rayon::ThreadPool>,
    rank: usize,
}

impl LocalTransport {
    fn table_len(&self) -> u64 {
        self.table.block_size * self.table.world_size as u64
    }
}

impl Transport for LocalTransport {
    fn fetch_nb(
        &self,
        dst: &mut [u64],
        src_addr: u64,
        n_buckets: usize,
    ) -> Result<FetchHandle, TransportError> {
        assert_eq!(dst.len(), n_buckets, "destination buffer must match fetch length");
        let table_len = self.table_len();
        for (i, slot) in dst.iter_mut().enumerate() {
            let addr = (src_addr + i as u64) % table_len;
            *slot = self.table.buckets[addr as usize].load(Ordering::SeqCst);
        }

        let (tx, rx) = crossbeam_channel::bounded(1);
        self.pool.spawn(move || {
            let _ = tx.send(Ok(()));
        });
        Ok(FetchHandle::new(rx))
    }

    fn cas(&self, addr: u64, expected: u64, desired: u64) -> Result<u64, TransportError> {
        let addr = addr % self.table_len();
        let cell = &self.table.buckets[addr as usize];
        match cell.compare_exchange(expected, desired, Ordering::SeqCst, Ordering::SeqCst) {
            Ok(observed) => Ok(observed),
            Err(observed) => Ok(observed),
        }
    }

    fn owner_of(&self, addr: u64) -> usize {
        let addr = addr % self.table_len();
        (addr / self.table.block_size) as usize
    }

    fn offset_in_shard(&self, addr: u64) -> u64 {
        let addr = addr % self.table_len();
        addr % self.table.block_size
    }
}

#[derive(Clone)]
pub struct LocalRuntime {
    rank: usize,
    world_size: usize,
    barrier: Arc<Barrier>,
}

impl ClusterRuntime for LocalRuntime {
    fn rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.world_size
    }

    fn barrier(&self) {
        self.barrier.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cas_claims_empty_bucket_exactly_once() {
        let cluster = LocalCluster::new_single_process(1024, 1);
        let (t, _rt) = cluster.handle_for(0);
        let observed = t.cas(7, 0, 0x8000_0000_0000_002A).unwrap();
        assert_eq!(observed, 0);
        let loser = t.cas(7, 0, 0x8000_0000_0000_0099).unwrap();
        assert_eq!(loser, 0x8000_0000_0000_002A);
    }

    #[test]
    fn fetch_reads_current_contents() {
        let cluster = LocalCluster::new_single_process(1024, 1);
        let (t, _rt) = cluster.handle_for(0);
        t.cas(3, 0, 42).unwrap();
        let mut dst = [0u64; 4];
        let handle = t.fetch_nb(&mut dst, 2, 4).unwrap();
        t.wait(handle).unwrap();
        assert_eq!(dst, [0, 42, 0, 0]);
    }

    #[test]
    fn owner_and_offset_respect_blocked_layout() {
        let cluster = LocalCluster::new_single_process(8, 2);
        let (t, _rt) = cluster.handle_for(0);
        assert_eq!(t.owner_of(6), 0);
        assert_eq!(t.offset_in_shard(6), 6);
        assert_eq!(t.owner_of(9), 1);
        assert_eq!(t.offset_in_shard(9), 1);
    }

    #[test]
    fn address_space_wraps_modulo_table_len() {
        let cluster = LocalCluster::new_single_process(8, 2);
        let (t, _rt) = cluster.handle_for(0);
        // table_len = 16; addr 17 should behave like addr 1.
        assert_eq!(t.owner_of(17), t.owner_of(1));
        assert_eq!(t.offset_in_shard(17), t.offset_in_shard(1));
    }

    #[test]
    fn barrier_releases_all_ranks() {
        let cluster = Arc::new(LocalCluster::new_single_process(8, 4));
        let mut handles = Vec::new();
        for rank in 0..4 {
            let cluster = cluster.clone();
            handles.push(std::thread::spawn(move || {
                let (_t, rt) = cluster.handle_for(rank);
                rt.barrier();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
