//! Memory stage: the load port.
//!
//! One load may use the data-cache port per cycle. The oldest resolved load
//! with no older unresolved store either:
//! - forwards from the newest older store that fully covers it (1-cycle
//!   path, no cache access),
//! - stalls on a partial overlap until that store commits and drains, or
//! - reads the data cache: a hit completes this cycle, a miss occupies the
//!   port for the miss penalty.
//!
//! Stores never touch the cache here; they drain at commit.

use crate::core::lsq::{ForwardResult, LoadQuery};
use crate::core::pipeline::PendingLoad;
use crate::core::Core;
use crate::stats::StallCause;

/// Executes the memory stage.
pub fn memory_stage(core: &mut Core) {
    // A miss holds the port until the fill completes.
    if let Some(pending) = &mut core.dcache_busy {
        core.stats.count_stall(StallCause::DcacheMiss);
        pending.remaining -= 1;
        if pending.remaining == 0 {
            let p = core.dcache_busy.take().expect("pending load present");
            core.cdb.push(p.seq, p.value);
            core.lsq.mark_done(p.seq);
            if core.trace {
                eprintln!("ME  seq={} fill complete value={:#x}", p.seq.0, p.value);
            }
        }
        return;
    }

    let (seq, addr) = match core.lsq.poll_load() {
        LoadQuery::Ready { seq, addr } => (seq, addr),
        LoadQuery::Blocked => {
            // Older store address still unknown: cannot disambiguate.
            core.stats.count_stall(StallCause::RawHazard);
            return;
        }
        LoadQuery::Idle => return,
    };

    match core.lsq.forward_load(seq, addr) {
        ForwardResult::Hit(value) => {
            if core.trace {
                eprintln!("ME  seq={} addr={:#x} forwarded={:#x}", seq.0, addr, value);
            }
            core.cdb.push(seq, value);
            core.lsq.mark_done(seq);
        }
        ForwardResult::Stall => {
            // Partial overlap: wait for the store to commit and drain.
            core.stats.count_stall(StallCause::RawHazard);
        }
        ForwardResult::Miss => {
            let (value, access) = match core.dcache.read_u32(addr, &mut core.mem) {
                Ok(r) => r,
                Err(fault) => {
                    core.rob.fault(seq, fault);
                    core.lsq.mark_done(seq);
                    return;
                }
            };
            core.stats.dcache_accesses += 1;
            if access.hit {
                core.stats.dcache_hits += 1;
                if core.trace {
                    eprintln!("ME  seq={} addr={:#x} hit value={:#x}", seq.0, addr, value);
                }
                core.cdb.push(seq, value);
                core.lsq.mark_done(seq);
            } else {
                if core.trace {
                    eprintln!(
                        "ME  seq={} addr={:#x} miss ({} cycles)",
                        seq.0, addr, access.latency
                    );
                }
                core.dcache_busy = Some(PendingLoad {
                    seq,
                    remaining: access.latency,
                    value,
                });
            }
        }
    }
}
