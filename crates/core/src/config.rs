//! Configuration system for the pipeline simulator.
//!
//! This module defines all configuration structures and enums used to
//! parameterize the simulated core. It provides:
//! 1. **Defaults:** Baseline microarchitecture constants (widths, capacities,
//!    unit latencies, cache geometry, predictor sizing).
//! 2. **Structures:** Hierarchical config for pipeline, execute units, branch
//!    prediction, caches, memory, and simulation limits.
//! 3. **Validation:** `Config::validate` rejects malformed configurations
//!    before any simulation state is built.
//!
//! Configuration is supplied as JSON (see the CLI's `--config` flag) or via
//! `Config::default()`.

use serde::Deserialize;

use crate::common::SimError;

/// Default configuration constants for the simulated core.
mod defaults {
    /// Instructions fetched per cycle.
    pub const FETCH_WIDTH: usize = 2;

    /// Instructions issued to reservation stations per cycle.
    pub const ISSUE_WIDTH: usize = 2;

    /// Instructions retired from the reorder buffer per cycle.
    pub const COMMIT_WIDTH: usize = 2;

    /// Reorder buffer capacity (in-flight instruction limit).
    pub const ROB_CAPACITY: usize = 32;

    /// Reservation station entries per functional-unit class.
    pub const RS_CAPACITY: usize = 8;

    /// Load/store queue capacity.
    pub const LSQ_CAPACITY: usize = 8;

    /// Integer ALU count and latency.
    pub const ALU_COUNT: usize = 2;
    pub const ALU_LATENCY: u64 = 1;

    /// Floating-point unit count and latency.
    pub const FPU_COUNT: usize = 1;
    pub const FPU_LATENCY: u64 = 3;

    /// Load/store (address generation) unit count and latency.
    pub const LSU_COUNT: usize = 1;
    pub const LSU_LATENCY: u64 = 1;

    /// Branch predictor pattern table entries.
    pub const PREDICTOR_ENTRIES: usize = 1024;

    /// Global history register length in bits (gshare).
    pub const HISTORY_LENGTH: usize = 8;

    /// Branch target buffer entries.
    pub const BTB_ENTRIES: usize = 64;

    /// Default cache size in bytes (1 KiB).
    pub const CACHE_SIZE: usize = 1024;

    /// Default cache block size in bytes.
    pub const CACHE_BLOCK: usize = 64;

    /// Default cache associativity (ways).
    pub const CACHE_WAYS: usize = 2;

    /// Default cache miss penalty in cycles.
    pub const CACHE_MISS_PENALTY: u64 = 10;

    /// Flat memory size in bytes (64 KiB).
    pub const MEMORY_SIZE: usize = 64 * 1024;

    /// Simulation wall limit in cycles.
    pub const MAX_CYCLES: u64 = 1_000_000;
}

/// Branch prediction algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum PredictorKind {
    /// Predict every branch taken; target from the BTB.
    AlwaysTaken,
    /// Per-branch 2-bit saturating counters indexed by PC bits.
    #[default]
    Bimodal,
    /// PC XOR global-history indexed 2-bit counters.
    #[serde(alias = "Gshare")]
    GShare,
}

/// Root configuration structure containing all simulator settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use mips_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.pipeline.issue_width, 2);
/// assert!(config.validate().is_ok());
/// ```
///
/// Deserializing from JSON:
///
/// ```
/// use mips_core::config::{Config, PredictorKind};
///
/// let json = r#"{
///     "pipeline": { "fetch_width": 4, "issue_width": 4, "commit_width": 4 },
///     "branch_predictor": { "kind": "GShare", "history_length": 12 },
///     "cache": {
///         "icache": { "size_bytes": 4096, "block_bytes": 64, "ways": 4 },
///         "dcache": { "size_bytes": 4096, "block_bytes": 64, "ways": 4 }
///     }
/// }"#;
///
/// let config: Config = serde_json::from_str(json).unwrap();
/// assert_eq!(config.pipeline.fetch_width, 4);
/// assert_eq!(config.branch_predictor.kind, PredictorKind::GShare);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pipeline widths and structure capacities.
    pub pipeline: PipelineConfig,
    /// Functional unit counts and latencies.
    pub execute_units: ExecUnitsConfig,
    /// Branch predictor selection and sizing.
    pub branch_predictor: PredictorConfig,
    /// Instruction and data cache geometry.
    pub cache: CacheHierarchyConfig,
    /// Flat memory configuration.
    pub memory: MemoryConfig,
    /// Simulation limits and tracing.
    pub simulation: SimulationConfig,
}

/// Pipeline widths and buffer capacities.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Instructions fetched per cycle.
    pub fetch_width: usize,
    /// Instructions issued per cycle (also the default CDB width).
    pub issue_width: usize,
    /// Instructions committed per cycle.
    pub commit_width: usize,
    /// Results broadcast on the common data bus per cycle (0 = issue_width).
    pub cdb_width: usize,
    /// Reorder buffer capacity.
    pub rob_capacity: usize,
    /// Reservation station entries per functional-unit class.
    pub rs_capacity_per_class: usize,
    /// Load/store queue capacity.
    pub lsq_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_width: defaults::FETCH_WIDTH,
            issue_width: defaults::ISSUE_WIDTH,
            commit_width: defaults::COMMIT_WIDTH,
            cdb_width: 0,
            rob_capacity: defaults::ROB_CAPACITY,
            rs_capacity_per_class: defaults::RS_CAPACITY,
            lsq_capacity: defaults::LSQ_CAPACITY,
        }
    }
}

impl PipelineConfig {
    /// Effective CDB width: configured value, or issue width when left at 0.
    pub fn effective_cdb_width(&self) -> usize {
        if self.cdb_width == 0 {
            self.issue_width
        } else {
            self.cdb_width
        }
    }
}

/// Count and latency of one functional-unit class.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UnitConfig {
    /// Number of units of this class.
    pub count: usize,
    /// Execution latency in cycles.
    pub latency: u64,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            count: 1,
            latency: 1,
        }
    }
}

/// Functional unit configuration per class.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecUnitsConfig {
    /// Integer ALUs (also execute branches, jumps, and syscalls).
    pub alu: UnitConfig,
    /// Floating-point units.
    pub fpu: UnitConfig,
    /// Load/store address-generation units.
    pub lsu: UnitConfig,
}

impl Default for ExecUnitsConfig {
    fn default() -> Self {
        Self {
            alu: UnitConfig {
                count: defaults::ALU_COUNT,
                latency: defaults::ALU_LATENCY,
            },
            fpu: UnitConfig {
                count: defaults::FPU_COUNT,
                latency: defaults::FPU_LATENCY,
            },
            lsu: UnitConfig {
                count: defaults::LSU_COUNT,
                latency: defaults::LSU_LATENCY,
            },
        }
    }
}

/// Branch predictor selection and table sizing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    /// Prediction algorithm.
    pub kind: PredictorKind,
    /// Pattern table entries (bimodal, gshare).
    pub num_entries: usize,
    /// Global history register length in bits (gshare).
    pub history_length: usize,
    /// Branch target buffer entries.
    pub btb_entries: usize,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            kind: PredictorKind::default(),
            num_entries: defaults::PREDICTOR_ENTRIES,
            history_length: defaults::HISTORY_LENGTH,
            btb_entries: defaults::BTB_ENTRIES,
        }
    }
}

/// Geometry of a single cache.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Total cache size in bytes.
    pub size_bytes: usize,
    /// Cache block (line) size in bytes.
    pub block_bytes: usize,
    /// Associativity (number of ways).
    pub ways: usize,
    /// Miss penalty in cycles.
    pub miss_penalty: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            size_bytes: defaults::CACHE_SIZE,
            block_bytes: defaults::CACHE_BLOCK,
            ways: defaults::CACHE_WAYS,
            miss_penalty: defaults::CACHE_MISS_PENALTY,
        }
    }
}

/// Instruction and data cache configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheHierarchyConfig {
    /// Instruction cache (read-only to the pipeline).
    pub icache: CacheConfig,
    /// Data cache (written only by store commit).
    pub dcache: CacheConfig,
}

/// Flat memory configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Memory size in bytes.
    pub size_bytes: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            size_bytes: defaults::MEMORY_SIZE,
        }
    }
}

/// Simulation limits and tracing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Wall limit in cycles; the run stops when reached.
    pub max_cycles: u64,
    /// Per-stage trace lines to stderr.
    pub trace: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_cycles: defaults::MAX_CYCLES,
            trace: false,
        }
    }
}

impl Config {
    /// Validates the configuration before simulation.
    ///
    /// Rejects zero widths/capacities/counts, non-power-of-two cache
    /// geometry, caches that do not divide evenly into sets, and
    /// out-of-range history lengths.
    pub fn validate(&self) -> Result<(), SimError> {
        let p = &self.pipeline;
        if p.fetch_width == 0 || p.issue_width == 0 || p.commit_width == 0 {
            return Err(SimError::Config(
                "pipeline widths must be nonzero".to_string(),
            ));
        }
        if p.rob_capacity == 0 || p.rs_capacity_per_class == 0 || p.lsq_capacity == 0 {
            return Err(SimError::Config(
                "rob/rs/lsq capacities must be nonzero".to_string(),
            ));
        }
        for (name, unit) in [
            ("alu", &self.execute_units.alu),
            ("fpu", &self.execute_units.fpu),
            ("lsu", &self.execute_units.lsu),
        ] {
            if unit.count == 0 {
                return Err(SimError::Config(format!("{} count must be nonzero", name)));
            }
            if unit.latency == 0 {
                return Err(SimError::Config(format!(
                    "{} latency must be nonzero",
                    name
                )));
            }
        }
        if self.branch_predictor.num_entries == 0
            || !self.branch_predictor.num_entries.is_power_of_two()
        {
            return Err(SimError::Config(
                "predictor num_entries must be a nonzero power of two".to_string(),
            ));
        }
        if self.branch_predictor.btb_entries == 0 {
            return Err(SimError::Config("btb_entries must be nonzero".to_string()));
        }
        if self.branch_predictor.history_length == 0 || self.branch_predictor.history_length > 32 {
            return Err(SimError::Config(
                "history_length must be in 1..=32".to_string(),
            ));
        }
        for (name, c) in [("icache", &self.cache.icache), ("dcache", &self.cache.dcache)] {
            if !c.size_bytes.is_power_of_two() || !c.block_bytes.is_power_of_two() {
                return Err(SimError::Config(format!(
                    "{} size and block size must be powers of two",
                    name
                )));
            }
            if c.ways == 0 || c.block_bytes == 0 {
                return Err(SimError::Config(format!(
                    "{} ways and block size must be nonzero",
                    name
                )));
            }
            let lines = c.size_bytes / c.block_bytes;
            if lines == 0 || lines % c.ways != 0 {
                return Err(SimError::Config(format!(
                    "{} must divide evenly into sets ({} lines, {} ways)",
                    name, lines, c.ways
                )));
            }
            if c.miss_penalty == 0 {
                return Err(SimError::Config(format!(
                    "{} miss penalty must be nonzero",
                    name
                )));
            }
        }
        if self.memory.size_bytes == 0 {
            return Err(SimError::Config("memory size must be nonzero".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_width_rejected() {
        let mut cfg = Config::default();
        cfg.pipeline.issue_width = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_non_power_of_two_cache_rejected() {
        let mut cfg = Config::default();
        cfg.cache.dcache.size_bytes = 1000;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_uneven_sets_rejected() {
        let mut cfg = Config::default();
        // 1024 / 64 = 16 lines, 3 ways does not divide evenly.
        cfg.cache.icache.ways = 3;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_history_length_bounds() {
        let mut cfg = Config::default();
        cfg.branch_predictor.history_length = 33;
        assert!(cfg.validate().is_err());
        cfg.branch_predictor.history_length = 32;
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_cdb_width_defaults_to_issue_width() {
        let mut cfg = Config::default();
        cfg.pipeline.issue_width = 4;
        assert_eq!(cfg.pipeline.effective_cdb_width(), 4);
        cfg.pipeline.cdb_width = 1;
        assert_eq!(cfg.pipeline.effective_cdb_width(), 1);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "pipeline": { "issue_width": 4 } }"#;
        let cfg: Config = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.pipeline.issue_width, 4);
        assert_eq!(cfg.pipeline.fetch_width, 2);
        assert_eq!(cfg.branch_predictor.kind, PredictorKind::Bimodal);
    }
}
