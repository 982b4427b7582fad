use crate::address;
use crate::bucket::Bucket;
use crate::config::Config;
use crate::error::ShardSetError;
use crate::metrics;
use crate::pipeline::HandleSlot;
use crate::result::FindOrPut;
use shardset_hash::AvalancheHash;
use shardset_transport::{ClusterRuntime, Transport};

/// One process's view of the shared table: the staging buffer, the
/// in-flight handle table, and handles on the transport/cluster-runtime/
/// hash collaborators.
///
/// `find_or_put` takes `&mut self` on purpose: the staging buffer and
/// handle table are process-private and not safe for concurrent intra-
/// process use, so the borrow checker — not a runtime check — is what
/// prevents two threads from driving the same `Context` at once. A caller
/// that needs multiple threads sharing one context must wrap it in a lock
/// itself, the same way this workspace's `RoutingTableViewV2` wraps shared
/// state behind a mutex rather than baking locking into the type.
pub struct Context<T, C, H> {
    config: Config,
    transport: T,
    cluster: C,
    hash: H,
    /// `c_max * s` buckets, reused slot-by-slot across calls.
    staging: Vec<u64>,
    /// Two handle slots per chunk index.
    handles: Vec<[HandleSlot; 2]>,
}

impl<T, C, H> Context<T, C, H>
where
    T: Transport,
    C: ClusterRuntime,
    H: AvalancheHash,
{
    /// Allocates the private staging buffer and handle table. Collective in
    /// spirit (every process constructs its own `Context` against a shared
    /// table already allocated by `transport`/`cluster`'s constructor), and
    /// must be followed by `cluster.barrier()` before the first
    /// `find_or_put` — a precondition this type documents but does not
    /// enforce.
    pub fn init(config: Config, transport: T, cluster: C, hash: H) -> Result<Self, ShardSetError> {
        config.validate()?;
        let c_max = config.c_max as usize;
        let s = config.s as usize;

        tracing::info!(
            target: "shardset::core",
            s = config.s,
            c_max = config.c_max,
            b = config.b,
            rank = cluster.rank(),
            world_size = cluster.world_size(),
            "initializing shardset context",
        );

        Ok(Self {
            config,
            transport,
            cluster,
            hash,
            staging: vec![0u64; c_max * s],
            handles: (0..c_max).map(|_| [HandleSlot::new(), HandleSlot::new()]).collect(),
        })
    }

    /// Drains any outstanding handles (a no-op under normal operation,
    /// since every `find_or_put` call drains on return, but defensive
    /// against a panic mid-call) and releases the private buffers. Must be
    /// preceded by `cluster.barrier()`.
    pub fn destroy(mut self) {
        for n in 0..self.handles.len() {
            if let Err(err) = self.wait_chunk(n) {
                tracing::warn!(
                    target: "shardset::core",
                    %err,
                    chunk = n,
                    "error waiting on handle during teardown",
                );
            }
        }
        tracing::info!(target: "shardset::core", "shardset context destroyed");
    }

    fn table_len(&self) -> u64 {
        self.config.b * self.cluster.world_size() as u64
    }

    /// Issues the prefetch for chunk `n` starting at hash `h`, splitting it
    /// into two sub-fetches if it straddles a shard boundary.
    fn issue_chunk(&mut self, h: u64, n: usize) -> Result<(), ShardSetError> {
        let table_len = self.table_len();
        let s = self.config.s;
        let b = self.config.b;
        let base = (h + n as u64 * s as u64) % table_len;

        let start = n * s as usize;
        let end = start + s as usize;

        if address::straddles(base, s, b) {
            let (size1, size2) = address::split_sizes(base, s, b);
            let mid = start + size1 as usize;
            let addr2 = (base + size1) % table_len;
            tracing::trace!(target: "shardset::probe", chunk = n, base, size1, size2, "chunk straddles shard boundary, splitting fetch");

            let handle0 = self.transport.fetch_nb(&mut self.staging[start..mid], base, size1 as usize)?;
            let handle1 =
                self.transport.fetch_nb(&mut self.staging[mid..end], addr2, size2 as usize)?;
            self.handles[n][0].set(handle0);
            self.handles[n][1].set(handle1);
        } else {
            let handle0 = self.transport.fetch_nb(&mut self.staging[start..end], base, s as usize)?;
            self.handles[n][0].set(handle0);
        }
        Ok(())
    }

    /// Blocks until both of chunk `n`'s handle slots are idle.
    fn wait_chunk(&mut self, n: usize) -> Result<(), ShardSetError> {
        if let Some(handle) = self.handles[n][0].take() {
            self.transport.wait(handle)?;
        }
        if let Some(handle) = self.handles[n][1].take() {
            self.transport.wait(handle)?;
        }
        Ok(())
    }

    /// Drains any handle left outstanding for `next` (the speculative
    /// chunk issued but never scanned because this call is returning
    /// early) and records the result.
    fn finish(
        &mut self,
        next: Option<usize>,
        result: FindOrPut,
        chunks_scanned: usize,
    ) -> Result<FindOrPut, ShardSetError> {
        if let Some(n) = next {
            self.wait_chunk(n)?;
        }
        metrics::FIND_OR_PUT_TOTAL.with_label_values(&[result.label()]).inc();
        metrics::PROBE_CHUNKS_SCANNED
            .with_label_values(&[result.label()])
            .observe(chunks_scanned as f64);
        tracing::Span::current().record("result", result.label());
        Ok(result)
    }

    /// Tests for membership and inserts if absent.
    #[tracing::instrument(target = "shardset::probe", level = "debug", skip(self), fields(result))]
    pub fn find_or_put(&mut self, value: u64) -> Result<FindOrPut, ShardSetError> {
        let v = value & crate::bucket::PAYLOAD_MASK;
        let table_len = self.table_len();
        let h = self.hash.hash(v) % table_len;
        let s = self.config.s as usize;
        let c_max = self.config.c_max as usize;

        self.issue_chunk(h, 0)?;

        for i in 0..c_max {
            let next = if i + 1 < c_max {
                self.issue_chunk(h, i + 1)?;
                Some(i + 1)
            } else {
                None
            };

            self.wait_chunk(i)?;

            for j in 0..s {
                let addr = (h + (i * s + j) as u64) % table_len;
                let slot = Bucket::from_word(self.staging[i * s + j]);

                if !slot.is_occupied() {
                    let desired = Bucket::occupied(v);
                    metrics::CAS_ATTEMPTS_TOTAL.inc();
                    let observed = self.transport.cas(addr, slot.word(), desired.word())?;
                    if observed == slot.word() {
                        return self.finish(next, FindOrPut::Inserted, i + 1);
                    } else if Bucket::from_word(observed).payload() == v {
                        return self.finish(next, FindOrPut::Found, i + 1);
                    }
                    // Else: some other payload now occupies the bucket. Open
                    // addressing — our key may still be ahead. No retry: the
                    // competing payload is not ours, and buckets are never
                    // vacated, so reprobing the same slot cannot improve progress.
                } else if slot.payload() == v {
                    return self.finish(next, FindOrPut::Found, i + 1);
                }
            }
        }

        self.finish(None, FindOrPut::Full, c_max)
    }

    #[cfg(test)]
    pub(crate) fn handles_idle(&self) -> bool {
        self.handles.iter().all(|pair| pair[0].is_idle() && pair[1].is_idle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use shardset_hash::SplitMix64;
    use shardset_transport::LocalCluster;
    use std::sync::Arc;

    /// A trivial test-only hash giving exact control over probe start
    /// addresses, used to reproduce concrete straddle/saturation scenarios.
    #[derive(Clone, Copy)]
    struct IdentityHash;
    impl AvalancheHash for IdentityHash {
        fn hash(&self, payload: u64) -> u64 {
            payload
        }
    }

    #[derive(Clone, Copy)]
    struct ConstantHash(u64);
    impl AvalancheHash for ConstantHash {
        fn hash(&self, _payload: u64) -> u64 {
            self.0
        }
    }

    fn single_process_context(
        config: Config,
    ) -> Context<shardset_transport::LocalTransport, shardset_transport::LocalRuntime, SplitMix64> {
        let cluster = LocalCluster::new_single_process(config.b, 1);
        let (transport, runtime) = cluster.handle_for(0);
        runtime.barrier();
        Context::init(config, transport, runtime, SplitMix64).unwrap()
    }

    #[test]
    fn e1_single_process_insert_then_find() {
        let config = Config { s: 4, c_max: 4, b: 1024 };
        let mut ctx = single_process_context(config);

        assert_matches!(ctx.find_or_put(42), Ok(FindOrPut::Inserted));
        assert_matches!(ctx.find_or_put(42), Ok(FindOrPut::Found));
        assert_matches!(ctx.find_or_put(43), Ok(FindOrPut::Inserted));
        assert!(ctx.handles_idle());
    }

    #[test]
    fn e2_straddling_chunk_is_split_across_two_shards() {
        let config = Config { s: 4, c_max: 2, b: 8 };
        let cluster = LocalCluster::new_single_process(config.b, 2);
        let (transport, runtime) = cluster.handle_for(0);
        runtime.barrier();
        let mut ctx = Context::init(config, transport, runtime, IdentityHash).unwrap();

        // hash(6) % 16 == 6: chunk 0 spans indices 6,7 (shard 0) and 8,9 (shard 1).
        assert_matches!(ctx.find_or_put(6), Ok(FindOrPut::Inserted));
        assert!(ctx.handles_idle());
        assert_eq!(cluster.peek(6), Bucket::occupied(6).word());
    }

    #[test]
    fn e3_saturation_returns_full_without_mutating_buckets() {
        let config = Config { s: 2, c_max: 2, b: 16 }; // budget = 4
        let cluster = LocalCluster::new_single_process(config.b, 1);
        let (transport, runtime) = cluster.handle_for(0);
        runtime.barrier();
        let mut ctx = Context::init(config, transport, runtime, IdentityHash).unwrap();

        // All four values hash (mod 16) to 3: 3, 19, 35, 51.
        for v in [3u64, 19, 35, 51] {
            assert_matches!(ctx.find_or_put(v), Ok(FindOrPut::Inserted));
        }

        let before: Vec<u64> = (3..7).map(|a| cluster.peek(a)).collect();
        assert_matches!(ctx.find_or_put(67), Ok(FindOrPut::Full));
        let after: Vec<u64> = (3..7).map(|a| cluster.peek(a)).collect();
        assert_eq!(before, after, "a FULL result must not mutate any bucket");
    }

    #[test]
    fn e4_concurrent_inserters_same_key_exactly_one_wins() {
        let config = Config { s: 4, c_max: 4, b: 64 };
        let cluster = Arc::new(LocalCluster::new_single_process(config.b, 4));
        let value = 12345u64;

        let handles: Vec<_> = (0..4)
            .map(|rank| {
                let cluster = cluster.clone();
                std::thread::spawn(move || {
                    let (transport, runtime) = cluster.handle_for(rank);
                    runtime.barrier();
                    let mut ctx = Context::init(config, transport, runtime, SplitMix64).unwrap();
                    ctx.find_or_put(value).unwrap()
                })
            })
            .collect();

        let results: Vec<FindOrPut> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| **r == FindOrPut::Inserted).count(), 1);
        assert_eq!(results.iter().filter(|r| **r == FindOrPut::Found).count(), 3);
    }

    #[test]
    fn e5_concurrent_colliding_probes_both_insert_and_are_both_findable() {
        let config = Config { s: 4, c_max: 4, b: 64 };
        let cluster = Arc::new(LocalCluster::new_single_process(config.b, 2));
        let (v1, v2) = (11u64, 22u64);

        let handles: Vec<_> = [v1, v2]
            .into_iter()
            .enumerate()
            .map(|(rank, v)| {
                let cluster = cluster.clone();
                std::thread::spawn(move || {
                    let (transport, runtime) = cluster.handle_for(rank);
                    runtime.barrier();
                    let mut ctx = Context::init(config, transport, runtime, ConstantHash(0)).unwrap();
                    ctx.find_or_put(v).unwrap()
                })
            })
            .collect();
        let results: Vec<FindOrPut> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results, vec![FindOrPut::Inserted, FindOrPut::Inserted]);

        let (transport, runtime) = cluster.handle_for(0);
        let mut ctx = Context::init(config, transport, runtime, ConstantHash(0)).unwrap();
        assert_matches!(ctx.find_or_put(v1), Ok(FindOrPut::Found));
        assert_matches!(ctx.find_or_put(v2), Ok(FindOrPut::Found));
    }

    #[test]
    fn e6_payload_bit_scrubbing() {
        let config = Config { s: 4, c_max: 4, b: 1024 };
        let mut ctx = single_process_context(config);

        assert_matches!(ctx.find_or_put(0x8000_0000_0000_0005), Ok(FindOrPut::Inserted));
        assert_matches!(ctx.find_or_put(5), Ok(FindOrPut::Found));
    }

    #[test]
    fn e7_probe_near_table_end_wraps_across_last_and_first_shard() {
        let config = Config { s: 4, c_max: 2, b: 8 };
        let cluster = LocalCluster::new_single_process(config.b, 2);
        let table_len = config.b * 2;
        let (transport, runtime) = cluster.handle_for(0);
        runtime.barrier();
        let mut ctx = Context::init(config, transport, runtime, ConstantHash(table_len - 1)).unwrap();

        assert_matches!(ctx.find_or_put(99), Ok(FindOrPut::Inserted));
        assert_eq!(cluster.peek(table_len - 1), Bucket::occupied(99).word());
    }

    #[test]
    fn probe_bound_is_exactly_c_max_times_s() {
        let config = Config { s: 2, c_max: 3, b: 64 }; // budget = 6
        let cluster = LocalCluster::new_single_process(config.b, 1);
        let (transport, runtime) = cluster.handle_for(0);
        runtime.barrier();
        let mut ctx = Context::init(config, transport, runtime, IdentityHash).unwrap();

        for v in [1u64, 2, 3, 4, 5, 6] {
            assert_matches!(ctx.find_or_put(v), Ok(FindOrPut::Inserted));
        }
        assert_matches!(ctx.find_or_put(7), Ok(FindOrPut::Full));
    }
}
