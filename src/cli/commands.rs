//! CLI command implementations.

use std::path::Path;
use std::sync::Arc;

use super::workload::{load_workload, OpOutcome};
use crate::cache::{BitemporalCache, CollectingListener};
use crate::config::CacheConfig;
use crate::index::TemporalIndex;
use crate::types::{CacheResult, Interval};

/// Print the node that would own an interval.
pub fn cmd_locate(
    max_depth: u32,
    domain_max: u64,
    low: u64,
    high: Option<u64>,
    json: bool,
) -> CacheResult<()> {
    let index: TemporalIndex<()> = TemporalIndex::new(max_depth, domain_max)?;
    let interval = Interval::with_high(low, high)?;
    let node = index.find_owning_node(&interval)?;
    let (start, end) = index.node_range(node);

    if json {
        let info = serde_json::json!({
            "interval": interval,
            "node": node.raw(),
            "depth": node.depth(),
            "position": node.position(),
            "range": [start, end],
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&info).unwrap_or_default()
        );
    } else {
        println!("Interval: {}", interval);
        println!("Node: {}", node);
        println!("  Depth: {} of {}", node.depth(), max_depth);
        println!("  Position: {}", node.position());
        println!("  Range: [{}, {})", start, end);
    }
    Ok(())
}

/// Replay a JSON workload against a fresh cache.
pub fn cmd_replay(workload: &Path, config_path: Option<&Path>, json: bool) -> CacheResult<()> {
    let config = resolve_config(config_path)?;
    let ops = load_workload(workload)?;
    let cache = BitemporalCache::new(config)?;
    let listener = Arc::new(CollectingListener::new());
    cache.add_listener(listener.clone());

    let mut steps = Vec::with_capacity(ops.len());
    let mut failures = 0;
    for (i, op) in ops.iter().enumerate() {
        let outcome = op.apply(&cache);
        if matches!(outcome, OpOutcome::Failed { .. }) {
            failures += 1;
        }
        let removals = listener.take();
        if json {
            steps.push(serde_json::json!({
                "step": i,
                "op": op,
                "result": outcome,
                "removals": removals,
            }));
        } else {
            println!("[{}] {} -> {}", i, op.label(), outcome);
            for notice in &removals {
                println!(
                    "      {} {} valid {} tx {}",
                    notice.cause, notice.identifier, notice.valid, notice.transaction
                );
            }
        }
    }

    let stats = cache.stats();
    cache.shutdown(true)?;

    if json {
        let report = serde_json::json!({
            "steps": steps,
            "stats": stats,
            "hit_rate": stats.hit_rate(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_default()
        );
    } else {
        println!();
        println!("Operations: {} ({} failed)", ops.len(), failures);
        println!("Hits: {}  Misses: {}", stats.hits, stats.misses);
        println!("Hit rate: {:.1}%", stats.hit_rate() * 100.0);
        println!("Writes: {}", stats.writes);
        println!(
            "Removed: {} evicted, {} invalidated, {} superseded",
            stats.evictions, stats.invalidations, stats.superseded
        );
        println!(
            "Live entries: {} valid, {} transaction, {} payloads",
            stats.valid_entries, stats.transaction_entries, stats.stored_payloads
        );
    }
    Ok(())
}

/// Print the effective configuration.
pub fn cmd_config(config_path: Option<&Path>, json: bool) -> CacheResult<()> {
    let config = resolve_config(config_path)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&config).unwrap_or_default()
        );
    } else {
        print!("{}", config.to_toml_string()?);
        println!("# domain_max = {}", format_timestamp(config.domain_max));
    }
    Ok(())
}

fn resolve_config(config_path: Option<&Path>) -> CacheResult<CacheConfig> {
    match config_path {
        Some(path) => CacheConfig::load(path),
        None => Ok(CacheConfig::default()),
    }
}

fn format_timestamp(millis: u64) -> String {
    let dt = i64::try_from(millis)
        .ok()
        .and_then(chrono::DateTime::from_timestamp_millis);
    match dt {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f UTC").to_string(),
        None => format!("{} ms", millis),
    }
}
