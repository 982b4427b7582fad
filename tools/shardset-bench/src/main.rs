mod config;
mod scenario;

use anyhow::Context as _;
use clap::Parser;
use config::FileConfig;
use scenario::Scenario;
use shardset_hash::SplitMix64;
use shardset_transport::{ClusterRuntime, LocalCluster};
use std::path::PathBuf;
use std::sync::Arc;

/// Drives a throughput benchmark against an in-process [`LocalCluster`],
/// following `original_source/throughput/main.c`'s three read/write mixes.
#[derive(Parser, Debug)]
#[command(name = "shardset-bench", version)]
struct Cli {
    /// Read/write mix to run.
    #[arg(value_enum)]
    scenario: Scenario,

    /// Optional YAML config file (see [`FileConfig`] for fields); CLI flags
    /// below override whatever it sets.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Chunk size (S).
    #[arg(long)]
    s: Option<u32>,

    /// Max probe chunks per call (Cmax).
    #[arg(long)]
    c_max: Option<u32>,

    /// Per-shard block size (B).
    #[arg(long)]
    b: Option<u64>,

    /// Number of simulated ranks.
    #[arg(long)]
    world_size: Option<usize>,

    /// Number of `find_or_put` calls each rank performs.
    #[arg(long)]
    limit: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut file_config = match &cli.config {
        Some(path) => FileConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => FileConfig::default(),
    };
    if let Some(s) = cli.s {
        file_config.s = s;
    }
    if let Some(c_max) = cli.c_max {
        file_config.c_max = c_max;
    }
    if let Some(b) = cli.b {
        file_config.b = b;
    }
    if let Some(world_size) = cli.world_size {
        file_config.world_size = world_size;
    }
    if let Some(limit) = cli.limit {
        file_config.limit = limit;
    }

    let shardset_config = file_config.to_shardset_config();
    shardset_config.validate().context("invalid shardset configuration")?;

    let range = cli.scenario.range(file_config.world_size, file_config.limit);
    tracing::info!(
        target: "shardset::bench",
        s = shardset_config.s,
        c_max = shardset_config.c_max,
        b = shardset_config.b,
        world_size = file_config.world_size,
        limit = file_config.limit,
        range,
        "starting throughput benchmark",
    );

    let cluster = Arc::new(LocalCluster::new_single_process(shardset_config.b, file_config.world_size));
    let wall_clock_start = std::time::Instant::now();

    let handles: Vec<_> = (0..file_config.world_size)
        .map(|rank| {
            let cluster = cluster.clone();
            let scenario = cli.scenario;
            let limit = file_config.limit;
            std::thread::spawn(move || -> anyhow::Result<scenario::ScenarioStats> {
                let (transport, runtime) = cluster.handle_for(rank);
                runtime.barrier();
                let mut ctx = shardset_core::Context::init(
                    shardset_config,
                    transport,
                    runtime,
                    SplitMix64,
                )?;
                let stats = scenario::run(&mut ctx, &SplitMix64, rank, limit, range)?;
                ctx.destroy();
                Ok(stats)
            })
        })
        .collect();

    let mut totals = scenario::ScenarioStats::default();
    for (rank, handle) in handles.into_iter().enumerate() {
        let stats = handle.join().expect("benchmark thread panicked")?;
        let total_ops = stats.finds + stats.inserts + stats.errors;
        tracing::info!(
            target: "shardset::bench",
            rank,
            finds = stats.finds,
            inserts = stats.inserts,
            errors = stats.errors,
            finds_frac = stats.finds as f64 / total_ops as f64,
            inserts_frac = stats.inserts as f64 / total_ops as f64,
            ops_per_sec = stats.ops_per_sec(),
            "rank completed",
        );
        totals.finds += stats.finds;
        totals.inserts += stats.inserts;
        totals.errors += stats.errors;
    }
    let wall_clock = wall_clock_start.elapsed();
    let total_ops = totals.finds + totals.inserts + totals.errors;

    tracing::info!(
        target: "shardset::bench",
        finds = totals.finds,
        inserts = totals.inserts,
        errors = totals.errors,
        aggregate_ops_per_sec = total_ops as f64 / wall_clock.as_secs_f64(),
        "throughput benchmark complete",
    );

    Ok(())
}
