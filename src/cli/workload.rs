//! JSON workload files replayed by `trestle replay`.
//!
//! A workload is a JSON array of operations:
//!
//! ```json
//! [
//!   {"op": "write", "identifier": "county_42",
//!    "valid": {"low": 0, "high": 100}, "transaction": {"low": 0},
//!    "payload": {"name": "King County"}},
//!   {"op": "read", "identifier": "county_42", "valid_time": 50, "transaction_time": 10},
//!   {"op": "evict", "identifier": "county_42", "valid": {"low": 0, "high": 100}},
//!   {"op": "invalidate", "identifier": "county_42"},
//!   {"op": "set_max_depth", "depth": 8}
//! ]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::BitemporalCache;
use crate::types::{CacheResult, Identifier, Interval};

/// One replayable cache operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WorkloadOp {
    Write {
        identifier: Identifier,
        valid: Interval,
        transaction: Interval,
        payload: serde_json::Value,
    },
    Read {
        identifier: Identifier,
        valid_time: u64,
        transaction_time: u64,
    },
    Evict {
        identifier: Identifier,
        valid: Interval,
    },
    Invalidate {
        identifier: Identifier,
    },
    SetMaxDepth {
        depth: u32,
    },
}

/// What happened when an operation ran.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OpOutcome {
    Written,
    Hit { payload: serde_json::Value },
    Miss,
    Removed { count: usize },
    Reconfigured,
    Failed { error: String },
}

impl std::fmt::Display for OpOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Written => write!(f, "written"),
            Self::Hit { payload } => write!(f, "hit {}", payload),
            Self::Miss => write!(f, "miss"),
            Self::Removed { count } => write!(f, "removed {}", count),
            Self::Reconfigured => write!(f, "reconfigured"),
            Self::Failed { error } => write!(f, "failed: {}", error),
        }
    }
}

impl WorkloadOp {
    /// Short label for text output.
    pub fn label(&self) -> String {
        match self {
            Self::Write {
                identifier,
                valid,
                transaction,
                ..
            } => format!("write {} valid {} tx {}", identifier, valid, transaction),
            Self::Read {
                identifier,
                valid_time,
                transaction_time,
            } => format!("read {} @ ({}, {})", identifier, valid_time, transaction_time),
            Self::Evict { identifier, valid } => format!("evict {} valid {}", identifier, valid),
            Self::Invalidate { identifier } => format!("invalidate {}", identifier),
            Self::SetMaxDepth { depth } => format!("set_max_depth {}", depth),
        }
    }

    /// Run against `cache`. Operation failures become [`OpOutcome::Failed`]
    /// so a replay reports every step.
    pub fn apply(&self, cache: &BitemporalCache<serde_json::Value>) -> OpOutcome {
        let result = match self {
            Self::Write {
                identifier,
                valid,
                transaction,
                payload,
            } => cache
                .write(identifier.clone(), *valid, *transaction, payload.clone())
                .map(|_| OpOutcome::Written),
            Self::Read {
                identifier,
                valid_time,
                transaction_time,
            } => cache
                .read(identifier, *valid_time, *transaction_time)
                .map(|found| match found {
                    Some(payload) => OpOutcome::Hit { payload },
                    None => OpOutcome::Miss,
                }),
            Self::Evict { identifier, valid } => cache
                .evict(identifier, valid)
                .map(|count| OpOutcome::Removed { count }),
            Self::Invalidate { identifier } => cache
                .invalidate(identifier)
                .map(|count| OpOutcome::Removed { count }),
            Self::SetMaxDepth { depth } => cache
                .set_max_depth(*depth)
                .map(|_| OpOutcome::Reconfigured),
        };
        result.unwrap_or_else(|e| OpOutcome::Failed {
            error: e.to_string(),
        })
    }
}

/// Parse a workload file.
pub fn load_workload(path: &Path) -> CacheResult<Vec<WorkloadOp>> {
    let content = std::fs::read_to_string(path)?;
    parse_workload(&content)
}

/// Parse a workload document.
pub fn parse_workload(content: &str) -> CacheResult<Vec<WorkloadOp>> {
    Ok(serde_json::from_str(content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;

    #[test]
    fn test_parse_and_apply() {
        let ops = parse_workload(
            r#"[
                {"op": "write", "identifier": "x", "valid": {"low": 0, "high": 10},
                 "transaction": {"low": 0}, "payload": 1},
                {"op": "read", "identifier": "x", "valid_time": 5, "transaction_time": 5},
                {"op": "read", "identifier": "x", "valid_time": 10, "transaction_time": 5},
                {"op": "invalidate", "identifier": "x"}
            ]"#,
        )
        .unwrap();
        assert_eq!(ops.len(), 4);

        let cache = BitemporalCache::new(CacheConfig::new().with_domain_max(1_000)).unwrap();
        let outcomes: Vec<OpOutcome> = ops.iter().map(|op| op.apply(&cache)).collect();
        assert_eq!(outcomes[0], OpOutcome::Written);
        assert_eq!(
            outcomes[1],
            OpOutcome::Hit {
                payload: serde_json::json!(1)
            }
        );
        assert_eq!(outcomes[2], OpOutcome::Miss);
        assert_eq!(outcomes[3], OpOutcome::Removed { count: 1 });
    }

    #[test]
    fn test_unknown_op_rejected() {
        assert!(parse_workload(r#"[{"op": "explode"}]"#).is_err());
    }
}
