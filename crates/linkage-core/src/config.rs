//! Configuration for the record-linkage engine.
//!
//! Loaded from environment variables, matching the teacher's
//! `python-decouple`-flavored convention: every field has a documented
//! default and a typed getter. Thresholds are read once per task (§4.4)
//! and then carried immutably through the whole run so that a single task
//! produces a coherent decision surface.

use std::env;

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Engine-wide configuration (§6 Configuration Inputs).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    /// PRIMARY records per page (default 100).
    pub batch_size: usize,
    /// Parallel match workers per page (default 4).
    pub workers_per_page: usize,
    /// L3 acceptance threshold (default 0.75).
    pub theta1: f64,
    /// L4 acceptance threshold (default 0.70).
    pub theta2: f64,
    /// L3 hard gate on `name_core` similarity (default 0.70).
    pub name_core_hard_gate: f64,
    /// L4 hard gate on `name_core` similarity (default 0.60); L4 must not
    /// promote a candidate below this even if the graph boost clears
    /// `theta2` (§4.4).
    pub name_core_hard_gate_l4: f64,
    /// Prefilter max candidates (default 100).
    pub candidate_cap_k: usize,
    /// Prefilter full-text cap (default 50).
    pub text_search_limit_t: usize,
    /// Address-keyword fallback cap (default 30).
    pub address_keyword_limit: usize,
    /// Soft deadline per record, milliseconds (default 2000).
    pub per_record_deadline_ms: u64,
    /// Optional global per-task deadline, seconds.
    pub task_deadline_secs: Option<u64>,
    /// Most-recent SECONDARY records used to build the L4 graph eagerly
    /// at task start (default 50 000).
    pub graph_build_limit: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            workers_per_page: 4,
            theta1: 0.75,
            theta2: 0.70,
            name_core_hard_gate: 0.70,
            name_core_hard_gate_l4: 0.60,
            candidate_cap_k: 100,
            text_search_limit_t: 50,
            address_keyword_limit: 30,
            per_record_deadline_ms: 2000,
            task_deadline_secs: None,
            graph_build_limit: 50_000,
        }
    }
}

impl MatchConfig {
    /// Load configuration from the process environment, falling back to
    /// the documented defaults for any unset variable. Read once at task
    /// start (§4.4) — callers should not re-read mid-task.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_usize("LINKAGE_BATCH_SIZE", defaults.batch_size),
            workers_per_page: env_usize("LINKAGE_WORKERS_PER_PAGE", defaults.workers_per_page),
            theta1: env_f64("LINKAGE_THETA1", defaults.theta1),
            theta2: env_f64("LINKAGE_THETA2", defaults.theta2),
            name_core_hard_gate: env_f64(
                "LINKAGE_NAME_CORE_HARD_GATE",
                defaults.name_core_hard_gate,
            ),
            name_core_hard_gate_l4: env_f64(
                "LINKAGE_NAME_CORE_HARD_GATE_L4",
                defaults.name_core_hard_gate_l4,
            ),
            candidate_cap_k: env_usize("LINKAGE_CANDIDATE_CAP_K", defaults.candidate_cap_k),
            text_search_limit_t: env_usize(
                "LINKAGE_TEXT_SEARCH_LIMIT_T",
                defaults.text_search_limit_t,
            ),
            address_keyword_limit: env_usize(
                "LINKAGE_ADDRESS_KEYWORD_LIMIT",
                defaults.address_keyword_limit,
            ),
            per_record_deadline_ms: env_u64(
                "LINKAGE_PER_RECORD_DEADLINE_MS",
                defaults.per_record_deadline_ms,
            ),
            task_deadline_secs: env::var("LINKAGE_TASK_DEADLINE_SECS")
                .ok()
                .and_then(|v| v.parse().ok()),
            graph_build_limit: env_usize("LINKAGE_GRAPH_BUILD_LIMIT", defaults.graph_build_limit),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = MatchConfig::default();
        assert_eq!(c.batch_size, 100);
        assert_eq!(c.workers_per_page, 4);
        assert!((c.theta1 - 0.75).abs() < 1e-9);
        assert!((c.theta2 - 0.70).abs() < 1e-9);
        assert!((c.name_core_hard_gate - 0.70).abs() < 1e-9);
        assert_eq!(c.candidate_cap_k, 100);
        assert_eq!(c.text_search_limit_t, 50);
        assert_eq!(c.per_record_deadline_ms, 2000);
    }
}
