//! Decode stage: ROB and LSQ allocation, renaming.
//!
//! Consumes the fetch buffer in program order. For each instruction it
//! allocates a reorder-buffer slot (and a load/store-queue slot for memory
//! ops), snapshots the producers of its source registers from the rename
//! map, and then claims the destination register. Source tags are captured
//! *before* the destination is claimed so an instruction reading its own
//! destination sees the previous producer, not itself.
//!
//! Backpressure: a full ROB, a full LSQ, or a full reservation station of
//! the required class stops decode for the cycle; nothing is allocated for
//! the stalled instruction and fetch backs up behind the unconsumed buffer.
//! Station occupancy is checked with already-decoded instructions counted
//! against their class, so every entry handed to issue holds a reserved
//! slot and the decode→issue latch can never grow past the stations'
//! combined capacity.

use crate::core::lsq::MemKind;
use crate::core::pipeline::IssueEntry;
use crate::core::rs::FuClass;
use crate::core::Core;
use crate::isa::OpClass;
use crate::stats::StallCause;

/// Executes the decode stage.
pub fn decode_stage(core: &mut Core) {
    // Station slots already spoken for by decoded-but-not-issued entries.
    let mut reserved = [0usize; 3];
    for pending in &core.issue_queue {
        reserved[FuClass::for_op(pending.inst.op.class()).index()] += 1;
    }

    let mut consumed = 0;

    for i in 0..core.fetch_buffer.len() {
        if consumed >= core.fetch_width {
            break;
        }
        let fi = core.fetch_buffer[i];
        let inst = fi.inst;
        let class = inst.op.class();
        let fu = FuClass::for_op(class);

        if core.rob.is_full() {
            core.stats.count_stall(StallCause::RobFull);
            break;
        }
        if class.is_memory() && core.lsq.is_full() {
            core.stats.count_stall(StallCause::LsqFull);
            break;
        }
        if core.stations[fu.index()].free_slots() <= reserved[fu.index()] {
            core.stats.count_stall(StallCause::RsFull);
            break;
        }

        let seq = core
            .rob
            .allocate(inst.pc, inst.op, inst.dest)
            .expect("ROB has room");
        if class.is_memory() {
            let kind = if class == OpClass::Load {
                MemKind::Load
            } else {
                MemKind::Store
            };
            let ok = core.lsq.allocate(seq, kind);
            debug_assert!(ok, "LSQ has room");
        }
        reserved[fu.index()] += 1;

        core.rob.set_prediction(
            seq,
            fi.pred.taken,
            fi.pred.target.unwrap_or_else(|| inst.next_pc()),
            fi.pred.history,
        );

        // Source producers first, then claim the destination.
        let src1_tag = inst.src1.and_then(|r| core.rename.producer(r));
        let src2_tag = inst.src2.and_then(|r| core.rename.producer(r));
        if let Some(dest) = inst.dest {
            core.rename.set_producer(dest, seq);
        }

        if core.trace {
            eprintln!("DE  pc={:#x} seq={} {}", inst.pc, seq.0, inst);
        }

        core.issue_queue.push_back(IssueEntry {
            seq,
            inst,
            src1_tag,
            src2_tag,
        });
        consumed += 1;
    }

    core.fetch_buffer.drain(..consumed);
}
