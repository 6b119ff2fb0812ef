//! Issue stage: operand capture and reservation-station install.
//!
//! Installs renamed instructions into a station of the matching
//! functional-unit class, in program order, up to `issue_width` per cycle.
//! Decode reserved a slot for every queued instruction, so installation
//! cannot fail; station-full backpressure is applied (and counted) at
//! decode. Each source operand is resolved through the tag captured at
//! decode:
//! - no tag → read the architectural register file;
//! - tag pointing at a completed ROB entry → bypass the result;
//! - tag still in flight → install pending; the CDB broadcast wakes it.
//!
//! Issue order within a cycle follows program order: in-order issue,
//! out-of-order execution.

use crate::core::rob::SeqNo;
use crate::core::rs::{FuClass, Operand, RsEntry};
use crate::core::Core;

/// Executes the issue stage.
pub fn issue_stage(core: &mut Core) {
    for _ in 0..core.issue_width {
        let entry = match core.issue_queue.front() {
            Some(e) => *e,
            None => break,
        };

        let class = FuClass::for_op(entry.inst.op.class());
        // The slot was reserved when decode accepted the instruction.
        debug_assert!(
            core.stations[class.index()].has_free(),
            "decode over-committed the {} station",
            class.name()
        );
        if !core.stations[class.index()].has_free() {
            break;
        }
        core.issue_queue.pop_front();

        let a = resolve_operand(core, entry.inst.src1, entry.src1_tag);
        let b = resolve_operand(core, entry.inst.src2, entry.src2_tag);

        if core.trace {
            eprintln!(
                "IS  pc={:#x} seq={} -> {} a={:?} b={:?}",
                entry.inst.pc,
                entry.seq.0,
                class.name(),
                a.tag,
                b.tag
            );
        }

        let installed = core.stations[class.index()].insert(RsEntry {
            seq: entry.seq,
            op: entry.inst.op,
            pc: entry.inst.pc,
            a,
            b,
            imm: entry.inst.imm,
            target: entry.inst.target,
            issued_cycle: core.cycle,
            valid: true,
        });
        debug_assert!(installed, "station had a free slot");
    }
}

/// Resolves one source operand through its decode-time producer tag.
fn resolve_operand(core: &Core, reg: Option<u8>, tag: Option<SeqNo>) -> Operand {
    let reg = match reg {
        Some(r) => r,
        None => return Operand::ready(0),
    };
    if reg == 0 {
        return Operand::ready(0);
    }
    match tag {
        None => Operand::ready(core.regs.read(reg)),
        Some(t) => match core.rob.find(t) {
            Some(producer) if producer.completed => Operand::ready(producer.result),
            Some(_) => Operand::pending(t),
            // Producer already committed; the value reached the register file.
            None => Operand::ready(core.regs.read(reg)),
        },
    }
}
