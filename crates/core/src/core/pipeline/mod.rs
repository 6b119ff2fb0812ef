//! Pipeline stages and the per-cycle driver.
//!
//! A single `tick` runs the stages in reverse pipeline order — commit,
//! memory, execute, issue, decode, fetch — so every stage reads the state
//! latched by the previous cycle and writes the state consumed next cycle.
//! Structural stalls hold instructions in their latches (fetch buffer, issue
//! queue, station slots) and upstream stages back up behind them.

/// Commit: in-order retirement, store drain, squash.
pub mod commit;
/// Decode: ROB/LSQ allocation and renaming.
pub mod decode;
/// Execute: unit countdown, CDB broadcast, dispatch.
pub mod execute;
/// Fetch: I-cache access and branch prediction.
pub mod fetch;
/// Issue: operand capture and station install.
pub mod issue;
/// Memory: load port, forwarding, D-cache access.
pub mod memory;

use crate::common::SimError;
use crate::core::rob::SeqNo;
use crate::core::{Core, FetchedInst};
use crate::isa::Instruction;

/// Cycles the ROB head may sit unretired before the driver declares the
/// pipeline wedged.
const DEADLOCK_CYCLES: u64 = 10_000;

/// Decode → issue latch entry: renamed instruction awaiting a station slot.
#[derive(Clone, Copy, Debug)]
pub struct IssueEntry {
    /// Sequence number (ROB tag) assigned at decode.
    pub seq: SeqNo,
    /// The decoded instruction.
    pub inst: Instruction,
    /// Producer of `src1` at decode time, if still in flight.
    pub src1_tag: Option<SeqNo>,
    /// Producer of `src2` at decode time, if still in flight.
    pub src2_tag: Option<SeqNo>,
}

/// A fetch packet slot waiting out an I-cache miss.
#[derive(Clone, Copy, Debug)]
pub struct PendingFetch {
    /// Cycles until the line arrives.
    pub remaining: u64,
    /// The instruction (and its prediction) to deliver when it does.
    pub fi: FetchedInst,
}

/// A load occupying the data-cache port while a miss resolves.
#[derive(Clone, Copy, Debug)]
pub struct PendingLoad {
    /// Sequence number of the load.
    pub seq: SeqNo,
    /// Cycles until the value is available.
    pub remaining: u64,
    /// The value the fill returned.
    pub value: u32,
}

impl Core {
    /// Advances the simulation one cycle.
    ///
    /// Stage order is the correctness property: write-back side effects from
    /// this cycle become visible to upstream stages next cycle.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.cycle += 1;
        self.stats.cycles += 1;

        commit::commit_stage(self)?;
        if !self.halted {
            memory::memory_stage(self);
            execute::execute_stage(self);
            issue::issue_stage(self);
            decode::decode_stage(self);
            fetch::fetch_stage(self);
        }
        self.account_fu_busy();

        if self.rob.is_empty() {
            self.note_commit_progress();
        } else if self.cycles_without_commit() > DEADLOCK_CYCLES {
            let head = self.rob.peek_head().expect("non-empty ROB has a head");
            return Err(SimError::Deadlock {
                cycle: self.cycle,
                detail: format!(
                    "ROB head seq={} pc={:#x} op={} never retires",
                    head.seq.0,
                    head.pc,
                    head.op.mnemonic()
                ),
            });
        }
        Ok(())
    }

    /// Runs until the exit sentinel commits or the cycle limit is reached.
    pub fn run_until_halt_or_limit(&mut self, max_cycles: u64) -> Result<(), SimError> {
        while !self.halted && self.stats.cycles < max_cycles {
            self.tick()?;
        }
        Ok(())
    }

    /// Squashes every instruction younger than `seq`: ROB tail, stations,
    /// in-flight unit work, queued broadcasts, LSQ tail, the memory port,
    /// and both front-end latches. The rename map is rebuilt from the
    /// surviving ROB entries, which is exactly the mapping captured at the
    /// branch's decode.
    pub(crate) fn squash_after(&mut self, seq: SeqNo) {
        self.rob.squash_after(seq);
        for station in &mut self.stations {
            station.squash_after(seq);
        }
        for pool in &mut self.fus {
            pool.squash_after(seq);
        }
        self.lsq.squash_after(seq);
        self.cdb.squash_after(seq);
        if self.dcache_busy.map_or(false, |p| p.seq > seq) {
            self.dcache_busy = None;
        }
        self.fetch_buffer.clear();
        self.fetch_pending = None;
        self.issue_queue.clear();
        self.rename.rebuild_from_rob(&self.rob);
    }
}
