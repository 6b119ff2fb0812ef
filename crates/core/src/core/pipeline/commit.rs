//! Commit stage: in-order retirement from the ROB head.
//!
//! Retires up to `commit_width` completed entries per cycle:
//! 1. Faults recorded out of order surface here, in program order.
//! 2. Register results reach the architectural file; the rename map entry
//!    is cleared only if this instruction is still the latest producer.
//! 3. A committing store is marked in the LSQ and drains to the data cache
//!    from the head, one per cycle; until it drains it still forwards to
//!    younger loads.
//! 4. Branches train the predictor; a mispredicted branch squashes every
//!    younger instruction, restores the rename map, repairs the speculative
//!    global history, and redirects fetch to the actual target.
//! 5. The exit sentinel stops the driver after the current cycle.

use crate::common::SimError;
use crate::core::Core;

/// Executes the commit stage.
pub fn commit_stage(core: &mut Core) -> Result<(), SimError> {
    // One committed store drains to the data cache per cycle.
    drain_one_store(core);

    for _ in 0..core.commit_width {
        match core.rob.peek_head() {
            Some(head) if head.completed => {}
            _ => break,
        }

        // Surfacing a fault consumes the entry so the diagnostic carries its
        // identity.
        if let Some(fault) = core.rob.peek_head().and_then(|h| h.fault.clone()) {
            let entry = core.rob.commit_head().expect("completed head");
            return Err(fault.into_error(entry.pc, entry.seq));
        }

        let entry = core.rob.commit_head().expect("completed head");
        core.note_commit_progress();
        core.stats.instructions_committed += 1;

        if core.trace {
            eprintln!(
                "CM  pc={:#x} seq={} {}",
                entry.pc,
                entry.seq.0,
                entry.op.mnemonic()
            );
        }

        if entry.is_store {
            core.lsq.mark_committed(entry.seq);
        } else if entry.is_load {
            // Committed stores queued ahead of the load leave first so the
            // load is the head when released.
            while core.lsq.peek_head().map_or(false, |h| h.seq < entry.seq) {
                if !drain_one_store(core) {
                    break;
                }
            }
            core.lsq
                .release_head(entry.seq)
                .expect("committing load holds the LSQ head");
        }

        if let Some(dest) = entry.dest {
            core.regs.write(dest, entry.result);
            core.rename.clear_if_match(dest, entry.seq);
        }

        if entry.is_halt {
            core.halted = true;
            // Flush remaining committed stores so memory is final.
            while drain_one_store(core) {}
            break;
        }

        if entry.is_branch {
            let mispredicted = entry.mispredicted();
            if entry.is_conditional {
                core.stats.branch_predictions += 1;
                if mispredicted {
                    core.stats.branch_mispredictions += 1;
                }
                core.bpu.update(
                    entry.pc,
                    entry.history,
                    entry.actual_taken,
                    entry.actual_target,
                );
            } else if entry.actual_taken {
                core.bpu.update_jump(entry.pc, entry.actual_target);
            }

            if mispredicted {
                if entry.is_conditional {
                    core.bpu.recover_history(entry.history, entry.actual_taken);
                } else {
                    core.bpu.restore_history(entry.history);
                }
                if core.trace {
                    eprintln!(
                        "CM  pc={:#x} seq={} MISPREDICT -> {:#x}",
                        entry.pc, entry.seq.0, entry.actual_target
                    );
                }
                core.squash_after(entry.seq);
                core.pc = entry.actual_target;
                break;
            }
        }
    }

    Ok(())
}

/// Drains one committed store from the LSQ head into the data cache.
/// Returns true if a store drained.
fn drain_one_store(core: &mut Core) -> bool {
    let store = match core.lsq.drain_committed() {
        Some(s) => s,
        None => return false,
    };
    let addr = store.addr.expect("committed store has an address");
    let access = core
        .dcache
        .write_u32(addr, store.data, &mut core.mem)
        .expect("store address was bounds-checked at resolve");
    core.stats.dcache_accesses += 1;
    if access.hit {
        core.stats.dcache_hits += 1;
    }
    if core.trace {
        eprintln!("CM  STORE DRAIN addr={:#x} data={:#x}", addr, store.data);
    }
    true
}
