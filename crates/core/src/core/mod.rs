//! The simulated core: arenas, latches, and the cycle engine.
//!
//! `Core` is the single explicit engine record threaded through the stage
//! functions. It owns every arena (register file, rename map, ROB,
//! reservation stations, functional units, LSQ, CDB, predictor, caches,
//! memory) and is the sole mutator; components never reach into one another
//! directly, so all cross-component traffic is visible in the stage code.

/// Branch prediction unit (direction predictors + BTB).
pub mod bpu;
/// Common data bus.
pub mod cdb;
/// Load/store queue.
pub mod lsq;
/// Pipeline stages and the per-cycle driver.
pub mod pipeline;
/// Architectural register file and rename map.
pub mod regfile;
/// Reorder buffer.
pub mod rob;
/// Reservation stations and functional units.
pub mod rs;

use std::collections::VecDeque;

use crate::common::SimError;
use crate::config::Config;
use crate::core::bpu::BranchUnit;
use crate::core::cdb::CommonDataBus;
use crate::core::lsq::LoadStoreQueue;
use crate::core::pipeline::{IssueEntry, PendingFetch, PendingLoad};
use crate::core::regfile::{RegisterFile, RenameMap};
use crate::core::rob::Rob;
use crate::core::rs::{FuClass, FuPool, ReservationStation, FU_CLASSES};
use crate::isa::{Program, REG_SP};
use crate::mem::{Cache, Memory};
use crate::stats::SimStats;

/// Latched fetch output consumed by decode: the instruction plus its
/// branch prediction.
#[derive(Clone, Copy, Debug)]
pub struct FetchedInst {
    /// Decoded instruction from the program array.
    pub inst: crate::isa::Instruction,
    /// Prediction made at fetch (default = fall through).
    pub pred: bpu::Prediction,
}

/// The simulated superscalar core.
pub struct Core {
    // Widths (validated configuration).
    pub fetch_width: usize,
    pub issue_width: usize,
    pub commit_width: usize,
    /// Per-stage trace lines to stderr.
    pub trace: bool,

    // Architectural and speculative state.
    pub regs: RegisterFile,
    pub rename: RenameMap,
    pub rob: Rob,
    pub stations: [ReservationStation; 3],
    pub fus: [FuPool; 3],
    pub lsq: LoadStoreQueue,
    pub cdb: CommonDataBus,
    pub bpu: BranchUnit,
    pub icache: Cache,
    pub dcache: Cache,
    pub mem: Memory,
    pub program: Program,

    // Pipeline latches.
    pub pc: u32,
    pub fetch_buffer: Vec<FetchedInst>,
    pub fetch_pending: Option<PendingFetch>,
    pub issue_queue: VecDeque<IssueEntry>,
    pub dcache_busy: Option<PendingLoad>,

    // Bookkeeping.
    pub cycle: u64,
    pub stats: SimStats,
    pub halted: bool,
    fu_counts: [usize; 3],
    last_commit_cycle: u64,
}

impl Core {
    /// Builds a core from a validated configuration and an assembled
    /// program: sizes every arena, loads the initial data image, points the
    /// PC at the entry, and parks the stack pointer at the top of memory.
    pub fn new(config: &Config, program: Program) -> Result<Self, SimError> {
        config.validate()?;

        let mut mem = Memory::new(config.memory.size_bytes);
        for (base, bytes) in &program.data {
            mem.write(*base, bytes).map_err(|_| SimError::Program {
                line: 0,
                msg: format!(
                    "data segment at {:#x} ({} bytes) exceeds memory size {}",
                    base,
                    bytes.len(),
                    config.memory.size_bytes
                ),
            })?;
        }

        let eu = &config.execute_units;
        let fu_counts = [eu.alu.count, eu.fpu.count, eu.lsu.count];
        let rs_cap = config.pipeline.rs_capacity_per_class;

        // Stack pointer starts just below the top of memory, 16-byte aligned.
        let mut regs = RegisterFile::new();
        regs.write(REG_SP, (config.memory.size_bytes as u32).saturating_sub(16) & !0xF);

        let entry = program.entry;
        Ok(Self {
            fetch_width: config.pipeline.fetch_width,
            issue_width: config.pipeline.issue_width,
            commit_width: config.pipeline.commit_width,
            trace: config.simulation.trace,
            regs,
            rename: RenameMap::new(),
            rob: Rob::new(config.pipeline.rob_capacity),
            stations: [
                ReservationStation::new(rs_cap),
                ReservationStation::new(rs_cap),
                ReservationStation::new(rs_cap),
            ],
            fus: [
                FuPool::new(FuClass::Alu, eu.alu.count, eu.alu.latency),
                FuPool::new(FuClass::Fpu, eu.fpu.count, eu.fpu.latency),
                FuPool::new(FuClass::Lsu, eu.lsu.count, eu.lsu.latency),
            ],
            lsq: LoadStoreQueue::new(config.pipeline.lsq_capacity),
            cdb: CommonDataBus::new(config.pipeline.effective_cdb_width()),
            bpu: BranchUnit::new(&config.branch_predictor),
            icache: Cache::new(&config.cache.icache),
            dcache: Cache::new(&config.cache.dcache),
            mem,
            program,
            pc: entry,
            fetch_buffer: Vec::new(),
            fetch_pending: None,
            issue_queue: VecDeque::new(),
            dcache_busy: None,
            cycle: 0,
            stats: SimStats::default(),
            halted: false,
            fu_counts,
            last_commit_cycle: 0,
        })
    }

    /// Configured unit counts per class (for the utilization report).
    pub fn fu_counts(&self) -> [usize; 3] {
        self.fu_counts
    }

    /// Records commit progress for deadlock detection.
    pub(crate) fn note_commit_progress(&mut self) {
        self.last_commit_cycle = self.cycle;
    }

    /// Cycles since the ROB head last made progress.
    pub(crate) fn cycles_without_commit(&self) -> u64 {
        self.cycle.saturating_sub(self.last_commit_cycle)
    }

    /// Accounts this cycle's functional-unit occupancy.
    pub(crate) fn account_fu_busy(&mut self) {
        for &class in &FU_CLASSES {
            let busy = self.fus[class.index()].busy_count() as u64;
            self.stats.count_fu_busy(class, busy);
        }
    }
}
