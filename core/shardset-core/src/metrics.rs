//! Prometheus counters/histograms for the probe/CAS hot path, following the
//! `LazyLock` + `try_create_*` pattern used throughout this workspace's
//! teacher for metrics modules.

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};
use std::sync::LazyLock;

fn try_create_int_counter(name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn try_create_int_counter_vec(
    name: &str,
    help: &str,
    labels: &[&str],
) -> prometheus::Result<IntCounterVec> {
    let counter = IntCounterVec::new(Opts::new(name, help), labels)?;
    prometheus::register(Box::new(counter.clone()))?;
    Ok(counter)
}

fn try_create_histogram_vec(
    name: &str,
    help: &str,
    labels: &[&str],
    buckets: Option<Vec<f64>>,
) -> prometheus::Result<HistogramVec> {
    let mut opts = HistogramOpts::new(name, help);
    if let Some(buckets) = buckets {
        opts = opts.buckets(buckets);
    }
    let histogram = HistogramVec::new(opts, labels)?;
    prometheus::register(Box::new(histogram.clone()))?;
    Ok(histogram)
}

/// Number of `find_or_put` calls completed, labeled by result
/// (`inserted` / `found` / `full`).
pub static FIND_OR_PUT_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    try_create_int_counter_vec(
        "shardset_find_or_put_total",
        "Number of find_or_put calls completed, by result",
        &["result"],
    )
    .unwrap()
});

/// Number of CAS attempts issued against the shared table.
pub static CAS_ATTEMPTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    try_create_int_counter(
        "shardset_cas_attempts_total",
        "Number of CAS attempts issued against the shared table",
    )
    .unwrap()
});

/// Number of chunks scanned per `find_or_put` call, labeled by result.
/// Bounded by `Cmax`, so a small number of linear buckets covers it.
pub static PROBE_CHUNKS_SCANNED: LazyLock<HistogramVec> = LazyLock::new(|| {
    try_create_histogram_vec(
        "shardset_probe_chunks_scanned",
        "Number of chunks scanned per find_or_put call, by result",
        &["result"],
        Some(prometheus::linear_buckets(1.0, 1.0, 64).unwrap()),
    )
    .unwrap()
});
