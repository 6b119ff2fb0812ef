//! Fetch stage: I-cache access, branch prediction, PC redirect.
//!
//! Reads up to `fetch_width` instructions from the program array through the
//! I-cache timing model. A predicted-taken control-flow instruction ends the
//! packet and redirects the PC; an I-cache miss parks the slot in a pending
//! latch for the miss penalty and stalls the packet behind it.

use crate::core::pipeline::PendingFetch;
use crate::core::{Core, FetchedInst};
use crate::isa::OpClass;
use crate::stats::StallCause;

/// Executes the fetch stage.
pub fn fetch_stage(core: &mut Core) {
    // A miss in flight: count the stall and deliver the slot when it lands.
    if let Some(pending) = &mut core.fetch_pending {
        core.stats.count_stall(StallCause::IcacheMiss);
        pending.remaining -= 1;
        if pending.remaining == 0 {
            let p = core.fetch_pending.take().expect("pending fetch present");
            redirect_pc(core, &p.fi);
            core.fetch_buffer.push(p.fi);
        }
        return;
    }

    // Decode has not consumed the previous packet; fetching now would
    // reorder the stream.
    if !core.fetch_buffer.is_empty() {
        return;
    }

    for _ in 0..core.fetch_width {
        let inst = match core.program.inst_at(core.pc) {
            Some(inst) => *inst,
            None => break, // ran off the end of text
        };

        let access = match core.icache.read_u32(core.pc, &mut core.mem) {
            Ok((_, access)) => access,
            // Text outside the memory image: nothing to fetch.
            Err(_) => break,
        };
        core.stats.icache_accesses += 1;

        let pred = match inst.op.class() {
            OpClass::Branch => core
                .bpu
                .predict_branch(inst.pc, inst.target.unwrap_or_else(|| inst.next_pc())),
            OpClass::Jump => core.bpu.predict_jump(inst.pc, inst.op, inst.target),
            _ => Default::default(),
        };
        let fi = FetchedInst { inst, pred };

        if !access.hit {
            // The line is being filled; hold the slot for the penalty.
            core.fetch_pending = Some(PendingFetch {
                remaining: access.latency,
                fi,
            });
            break;
        }
        core.stats.icache_hits += 1;

        if core.trace {
            eprintln!("FE  pc={:#x} {}", inst.pc, inst);
        }

        let taken = fi.pred.taken;
        redirect_pc(core, &fi);
        core.fetch_buffer.push(fi);
        if taken {
            // Later slots in the packet are on the wrong path.
            break;
        }
    }
}

/// Advances the PC past a fetched instruction, following the prediction.
fn redirect_pc(core: &mut Core, fi: &FetchedInst) {
    core.pc = match (fi.pred.taken, fi.pred.target) {
        (true, Some(target)) => target,
        _ => fi.inst.next_pc(),
    };
}
