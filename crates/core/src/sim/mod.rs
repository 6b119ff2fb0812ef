//! Simulation driver: program loading and the run loop.

/// Assembly-file loading.
pub mod loader;

use crate::common::SimError;
use crate::config::Config;
use crate::core::Core;
use crate::isa::Program;
use crate::stats::SimReport;

/// Top-level simulator: a configured core plus the run policy.
pub struct Simulator {
    /// The simulated core.
    pub core: Core,
    max_cycles: u64,
}

impl Simulator {
    /// Builds a simulator from a validated configuration and an assembled
    /// program.
    pub fn new(config: &Config, program: Program) -> Result<Self, SimError> {
        Ok(Self {
            core: Core::new(config, program)?,
            max_cycles: config.simulation.max_cycles,
        })
    }

    /// Assembles `src` and builds a simulator for it.
    pub fn from_source(config: &Config, src: &str) -> Result<Self, SimError> {
        let program = Program::assemble(src)?;
        Self::new(config, program)
    }

    /// Advances one cycle.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.core.tick()
    }

    /// Runs to the exit sentinel or the configured cycle limit and returns
    /// the final report. Dirty data-cache lines are written back so the
    /// memory image reflects every committed store.
    pub fn run(&mut self) -> Result<SimReport, SimError> {
        self.core.run_until_halt_or_limit(self.max_cycles)?;
        self.core
            .dcache
            .flush_dirty(&mut self.core.mem)
            .expect("resident cache lines map to valid memory");
        Ok(self.report())
    }

    /// True once the exit sentinel has committed.
    pub fn halted(&self) -> bool {
        self.core.halted
    }

    /// Snapshot of the metrics so far.
    pub fn report(&self) -> SimReport {
        self.core.stats.report(self.core.fu_counts())
    }
}
