//! Simulation statistics collection and reporting.
//!
//! This module tracks the performance counters of the simulated core:
//! 1. **Cycle and IPC:** Total cycles, committed instructions, derived IPC.
//! 2. **Branch prediction:** Conditional-branch predictions, mispredictions,
//!    and accuracy.
//! 3. **Caches:** Access and hit counts for the I-cache and D-cache.
//! 4. **Stalls:** Cycles lost per cause (structural, cache miss, RAW).
//! 5. **Functional units:** Busy-cycle histogram per unit class.
//!
//! `SimStats` is the mutable counter bundle owned by the core; `SimReport`
//! is the finished, serializable record emitted when the run ends.

use serde::Serialize;

use crate::core::rs::{FuClass, FU_CLASSES};

/// Causes of pipeline stalls, counted once per affected cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StallCause {
    /// Decode blocked: reorder buffer full.
    RobFull,
    /// Decode blocked: no free reservation station of the needed class
    /// (slots reserved by already-decoded instructions count as taken).
    RsFull,
    /// Decode blocked: load/store queue full.
    LsqFull,
    /// Fetch blocked: instruction cache miss in progress.
    IcacheMiss,
    /// Memory blocked: data cache miss in progress.
    DcacheMiss,
    /// Memory blocked: load waiting on an older store (ordering or partial
    /// overlap).
    RawHazard,
}

const STALL_CAUSES: usize = 6;

impl StallCause {
    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// Mutable performance counters, owned by the core and bumped by the stages.
#[derive(Clone, Default)]
pub struct SimStats {
    /// Total simulated cycles.
    pub cycles: u64,
    /// Instructions retired in program order.
    pub instructions_committed: u64,
    /// Conditional branch predictions made (counted at commit).
    pub branch_predictions: u64,
    /// Conditional branch mispredictions.
    pub branch_mispredictions: u64,
    /// Instruction cache accesses.
    pub icache_accesses: u64,
    /// Instruction cache hits.
    pub icache_hits: u64,
    /// Data cache accesses.
    pub dcache_accesses: u64,
    /// Data cache hits.
    pub dcache_hits: u64,
    /// Stall cycles per cause.
    stalls: [u64; STALL_CAUSES],
    /// Busy cycles per functional-unit class.
    fu_busy_cycles: [u64; 3],
}

impl SimStats {
    /// Counts one stalled cycle for `cause`.
    #[inline]
    pub fn count_stall(&mut self, cause: StallCause) {
        self.stalls[cause.index()] += 1;
    }

    /// Stall cycles recorded for `cause`.
    #[inline]
    pub fn stalls(&self, cause: StallCause) -> u64 {
        self.stalls[cause.index()]
    }

    /// Adds busy-unit cycles for a functional-unit class.
    #[inline]
    pub fn count_fu_busy(&mut self, class: FuClass, busy_units: u64) {
        self.fu_busy_cycles[class.index()] += busy_units;
    }

    /// Builds the final report. `fu_counts` gives the configured unit count
    /// per class so utilization can be derived.
    pub fn report(&self, fu_counts: [usize; 3]) -> SimReport {
        let cyc = self.cycles.max(1);
        let ipc = self.instructions_committed as f64 / cyc as f64;
        let branch_accuracy = if self.branch_predictions == 0 {
            // No branches: perfect by convention.
            1.0
        } else {
            (self.branch_predictions - self.branch_mispredictions) as f64
                / self.branch_predictions as f64
        };

        let functional_units = FU_CLASSES
            .iter()
            .map(|&class| {
                let busy = self.fu_busy_cycles[class.index()];
                let slots = fu_counts[class.index()] as u64 * cyc;
                FuUtilization {
                    class: class.name(),
                    busy_cycles: busy,
                    utilization: busy as f64 / slots.max(1) as f64,
                }
            })
            .collect();

        SimReport {
            cycles: self.cycles,
            instructions_committed: self.instructions_committed,
            ipc,
            branch_predictions: self.branch_predictions,
            branch_mispredictions: self.branch_mispredictions,
            branch_accuracy,
            icache_accesses: self.icache_accesses,
            icache_hits: self.icache_hits,
            dcache_accesses: self.dcache_accesses,
            dcache_hits: self.dcache_hits,
            stalls_by_cause: StallsByCause {
                rob_full: self.stalls(StallCause::RobFull),
                rs_full: self.stalls(StallCause::RsFull),
                lsq_full: self.stalls(StallCause::LsqFull),
                icache_miss: self.stalls(StallCause::IcacheMiss),
                dcache_miss: self.stalls(StallCause::DcacheMiss),
                raw_hazard: self.stalls(StallCause::RawHazard),
            },
            functional_units,
        }
    }
}

/// Stall-cycle breakdown by cause.
#[derive(Clone, Debug, Default, Serialize)]
pub struct StallsByCause {
    pub rob_full: u64,
    pub rs_full: u64,
    pub lsq_full: u64,
    pub icache_miss: u64,
    pub dcache_miss: u64,
    pub raw_hazard: u64,
}

/// Per-class functional-unit utilization.
#[derive(Clone, Debug, Serialize)]
pub struct FuUtilization {
    /// Unit class name.
    pub class: &'static str,
    /// Cycles any unit of the class was busy (summed over units).
    pub busy_cycles: u64,
    /// Busy cycles over available unit-cycles.
    pub utilization: f64,
}

/// Final result record emitted when the run halts or hits the cycle limit.
#[derive(Clone, Debug, Serialize)]
pub struct SimReport {
    pub cycles: u64,
    pub instructions_committed: u64,
    pub ipc: f64,
    pub branch_predictions: u64,
    pub branch_mispredictions: u64,
    pub branch_accuracy: f64,
    pub icache_accesses: u64,
    pub icache_hits: u64,
    pub dcache_accesses: u64,
    pub dcache_hits: u64,
    pub stalls_by_cause: StallsByCause,
    pub functional_units: Vec<FuUtilization>,
}

impl SimReport {
    /// Prints the report to stdout as a fixed-width text table.
    pub fn print(&self) {
        println!("\n==========================================================");
        println!("SUPERSCALAR PIPELINE SIMULATION STATISTICS");
        println!("==========================================================");
        println!("sim_cycles               {}", self.cycles);
        println!("sim_insts                {}", self.instructions_committed);
        println!("sim_ipc                  {:.4}", self.ipc);
        println!("----------------------------------------------------------");
        println!("BRANCH PREDICTION");
        println!("  bp.lookups             {}", self.branch_predictions);
        println!("  bp.mispredicts         {}", self.branch_mispredictions);
        println!("  bp.accuracy            {:.2}%", self.branch_accuracy * 100.0);
        println!("----------------------------------------------------------");
        println!("MEMORY HIERARCHY");
        let print_cache = |name: &str, accesses: u64, hits: u64| {
            let rate = if accesses > 0 {
                hits as f64 / accesses as f64 * 100.0
            } else {
                0.0
            };
            println!(
                "  {:<6} accesses: {:<10} | hits: {:<10} | hit_rate: {:.2}%",
                name, accesses, hits, rate
            );
        };
        print_cache("I", self.icache_accesses, self.icache_hits);
        print_cache("D", self.dcache_accesses, self.dcache_hits);
        println!("----------------------------------------------------------");
        println!("STALLS");
        let s = &self.stalls_by_cause;
        println!("  stall.rob_full         {}", s.rob_full);
        println!("  stall.rs_full          {}", s.rs_full);
        println!("  stall.lsq_full         {}", s.lsq_full);
        println!("  stall.icache_miss      {}", s.icache_miss);
        println!("  stall.dcache_miss      {}", s.dcache_miss);
        println!("  stall.raw_hazard       {}", s.raw_hazard);
        println!("----------------------------------------------------------");
        println!("FUNCTIONAL UNITS");
        for fu in &self.functional_units {
            println!(
                "  {:<4} busy_cycles: {:<10} | utilization: {:.2}%",
                fu.class,
                fu.busy_cycles,
                fu.utilization * 100.0
            );
        }
        println!("==========================================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipc_identity() {
        let mut stats = SimStats::default();
        stats.cycles = 100;
        stats.instructions_committed = 250;
        let report = stats.report([2, 1, 1]);
        assert!((report.ipc - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_branch_accuracy_identity() {
        let mut stats = SimStats::default();
        stats.cycles = 1;
        stats.branch_predictions = 100;
        stats.branch_mispredictions = 4;
        let report = stats.report([1, 1, 1]);
        assert!((report.branch_accuracy - 0.96).abs() < 1e-12);
    }

    #[test]
    fn test_no_branches_is_perfect() {
        let mut stats = SimStats::default();
        stats.cycles = 1;
        let report = stats.report([1, 1, 1]);
        assert_eq!(report.branch_accuracy, 1.0);
    }

    #[test]
    fn test_stall_counting() {
        let mut stats = SimStats::default();
        stats.count_stall(StallCause::RobFull);
        stats.count_stall(StallCause::RobFull);
        stats.count_stall(StallCause::DcacheMiss);
        assert_eq!(stats.stalls(StallCause::RobFull), 2);
        assert_eq!(stats.stalls(StallCause::DcacheMiss), 1);
        assert_eq!(stats.stalls(StallCause::RsFull), 0);
    }

    #[test]
    fn test_fu_utilization() {
        let mut stats = SimStats::default();
        stats.cycles = 10;
        stats.count_fu_busy(FuClass::Alu, 5);
        stats.count_fu_busy(FuClass::Alu, 5);
        let report = stats.report([2, 1, 1]);
        let alu = &report.functional_units[0];
        assert_eq!(alu.class, "ALU");
        assert_eq!(alu.busy_cycles, 10);
        // 10 busy cycles over 2 units * 10 cycles.
        assert!((alu.utilization - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_report_serializes() {
        let stats = SimStats::default();
        let report = stats.report([1, 1, 1]);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"stalls_by_cause\""));
        assert!(json.contains("\"ipc\""));
    }
}
