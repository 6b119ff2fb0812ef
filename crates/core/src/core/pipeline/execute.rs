//! Execute stage: unit countdown, result computation, CDB broadcast,
//! dispatch.
//!
//! Three steps each cycle:
//! 1. **Countdown:** Every busy unit ticks; units reaching zero produce
//!    their result. ALU results (and resolved branch outcomes) go onto the
//!    CDB queue; LSU completions resolve addresses into the load/store
//!    queue instead — a load's value broadcast happens later, from the
//!    memory stage.
//! 2. **Broadcast:** Up to `cdb_width` queued results drain in sequence
//!    order. The broadcast is the single write event: it completes the ROB
//!    entry and wakes every matching station operand.
//! 3. **Dispatch:** Each free unit binds the oldest ready entry of its
//!    class, so freshly woken instructions can start in the same cycle.

use crate::common::Fault;
use crate::core::lsq::{ForwardResult, LoadQuery};
use crate::core::rs::{RsEntry, FU_CLASSES};
use crate::core::Core;
use crate::isa::{OpClass, Opcode, SYSCALL_EXIT};

/// Executes the execute stage.
pub fn execute_stage(core: &mut Core) {
    // 1. Countdown.
    for &class in &FU_CLASSES {
        for finished in core.fus[class.index()].tick() {
            finish(core, finished);
        }
    }

    // 2. Broadcast.
    for result in core.cdb.drain_cycle() {
        if core.trace {
            eprintln!("WB  seq={} value={:#x}", result.seq.0, result.value);
        }
        core.rob.complete(result.seq, result.value);
        for station in &mut core.stations {
            station.broadcast(result.seq, result.value);
        }
    }

    // 3. Dispatch.
    for &class in &FU_CLASSES {
        while core.fus[class.index()].free_count() > 0 {
            match core.stations[class.index()].take_oldest_ready() {
                Some(entry) => {
                    if core.trace {
                        eprintln!("EX  pc={:#x} seq={} -> {}", entry.pc, entry.seq.0, class.name());
                    }
                    core.fus[class.index()].start(entry);
                }
                None => break,
            }
        }
    }
}

/// Consumes a finished unit's work: computes the result and routes it.
fn finish(core: &mut Core, entry: RsEntry) {
    match entry.op.class() {
        OpClass::Load => {
            let addr = entry.a.value.wrapping_add(entry.imm as u32);
            if let Err(fault) = check_word_access(core, addr) {
                core.rob.fault(entry.seq, fault);
                core.lsq.mark_done(entry.seq);
                return;
            }
            core.lsq.resolve(entry.seq, addr, 0);
            wake_forwardable_loads(core);
        }
        OpClass::Store => {
            let addr = entry.a.value.wrapping_add(entry.imm as u32);
            let data = entry.b.value;
            if let Err(fault) = check_word_access(core, addr) {
                core.rob.fault(entry.seq, fault);
                return;
            }
            core.lsq.resolve(entry.seq, addr, data);
            // Stores carry their data to the ROB over the CDB; the cache
            // write waits for commit.
            core.cdb.push(entry.seq, data);
            wake_forwardable_loads(core);
        }
        OpClass::Branch => {
            let taken = branch_taken(entry.op, entry.a.value, entry.b.value);
            let target = entry.target.unwrap_or(0);
            let actual = if taken {
                target
            } else {
                entry.pc.wrapping_add(4)
            };
            core.rob.set_branch_outcome(entry.seq, taken, actual);
            core.cdb.push(entry.seq, 0);
        }
        OpClass::Jump => {
            let (target, link) = match entry.op {
                Opcode::Jr => (entry.a.value, 0),
                Opcode::Jal => (entry.target.unwrap_or(0), entry.pc.wrapping_add(4)),
                _ => (entry.target.unwrap_or(0), 0),
            };
            core.rob.set_branch_outcome(entry.seq, true, target);
            core.cdb.push(entry.seq, link);
        }
        OpClass::IntAlu | OpClass::Nop => {
            if entry.op == Opcode::Syscall && entry.a.value == SYSCALL_EXIT {
                core.rob.set_halt(entry.seq);
            }
            core.cdb.push(entry.seq, int_result(&entry));
        }
        OpClass::FloatAlu => match float_result(&entry) {
            Ok(value) => core.cdb.push(entry.seq, value),
            Err(fault) => core.rob.fault(entry.seq, fault),
        },
    }
}

/// The 1-cycle forwarding path, taken at address resolution: whenever a load
/// or store resolves, any load now fully covered by its newest older store
/// completes immediately without a cache access. A load that still needs the
/// cache (or must wait out a partial overlap) is left for the memory stage.
fn wake_forwardable_loads(core: &mut Core) {
    while let LoadQuery::Ready { seq, addr } = core.lsq.poll_load() {
        // A load occupying the cache port completes through the fill path.
        if core.dcache_busy.map_or(false, |p| p.seq == seq) {
            break;
        }
        match core.lsq.forward_load(seq, addr) {
            ForwardResult::Hit(value) => {
                if core.trace {
                    eprintln!("EX  seq={} addr={:#x} forwarded={:#x}", seq.0, addr, value);
                }
                core.cdb.push(seq, value);
                core.lsq.mark_done(seq);
            }
            _ => break,
        }
    }
}

/// Bounds and alignment check for a 4-byte data access.
fn check_word_access(core: &Core, addr: u32) -> Result<(), Fault> {
    if addr % 4 != 0 {
        return Err(Fault::Memory { addr });
    }
    core.mem.check(addr, 4)
}

/// Resolves a conditional branch direction from its operand values.
fn branch_taken(op: Opcode, a: u32, b: u32) -> bool {
    let (sa, sb) = (a as i32, b as i32);
    match op {
        Opcode::Beq => a == b,
        Opcode::Bne => a != b,
        Opcode::Bgt => sa > sb,
        Opcode::Bge => sa >= sb,
        Opcode::Ble => sa <= sb,
        Opcode::Blt => sa < sb,
        _ => unreachable!("not a conditional branch"),
    }
}

/// Integer ALU result.
fn int_result(entry: &RsEntry) -> u32 {
    let a = entry.a.value;
    let b = entry.b.value;
    let imm = entry.imm;
    match entry.op {
        Opcode::Add => a.wrapping_add(b),
        Opcode::Addi => a.wrapping_add(imm as u32),
        Opcode::Sub => a.wrapping_sub(b),
        Opcode::Mul => a.wrapping_mul(b),
        Opcode::And => a & b,
        Opcode::Or => a | b,
        Opcode::Xor => a ^ b,
        Opcode::Sll => a << (imm as u32 & 31),
        Opcode::Srl => a >> (imm as u32 & 31),
        Opcode::Slt => ((a as i32) < (b as i32)) as u32,
        Opcode::Li | Opcode::La => imm as u32,
        Opcode::Nop | Opcode::Syscall => 0,
        _ => unreachable!("not an integer ALU op"),
    }
}

/// Floating-point result on f32 bit patterns.
fn float_result(entry: &RsEntry) -> Result<u32, Fault> {
    let a = f32::from_bits(entry.a.value);
    let b = f32::from_bits(entry.b.value);
    let value = match entry.op {
        Opcode::Fadd => a + b,
        Opcode::Fsub => a - b,
        Opcode::Fmul => a * b,
        Opcode::Fdiv => {
            if b == 0.0 {
                return Err(Fault::Arithmetic {
                    detail: "float divide by zero",
                });
            }
            a / b
        }
        _ => unreachable!("not a floating-point op"),
    };
    Ok(value.to_bits())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rs::Operand;

    fn entry(op: Opcode, a: u32, b: u32, imm: i32) -> RsEntry {
        RsEntry {
            op,
            a: Operand::ready(a),
            b: Operand::ready(b),
            imm,
            valid: true,
            ..RsEntry::default()
        }
    }

    #[test]
    fn test_int_results() {
        assert_eq!(int_result(&entry(Opcode::Add, 2, 3, 0)), 5);
        assert_eq!(int_result(&entry(Opcode::Sub, 2, 3, 0)), u32::MAX);
        assert_eq!(int_result(&entry(Opcode::Addi, 2, 0, -1)), 1);
        assert_eq!(int_result(&entry(Opcode::Mul, 7, 6, 0)), 42);
        assert_eq!(int_result(&entry(Opcode::Sll, 1, 0, 4)), 16);
        assert_eq!(int_result(&entry(Opcode::Srl, 16, 0, 4)), 1);
        assert_eq!(int_result(&entry(Opcode::Slt, (-1i32) as u32, 0, 0)), 1);
        assert_eq!(int_result(&entry(Opcode::Li, 0, 0, 123)), 123);
    }

    #[test]
    fn test_branch_direction() {
        assert!(branch_taken(Opcode::Beq, 5, 5));
        assert!(!branch_taken(Opcode::Beq, 5, 6));
        assert!(branch_taken(Opcode::Bne, 5, 6));
        assert!(branch_taken(Opcode::Blt, (-1i32) as u32, 0));
        assert!(!branch_taken(Opcode::Bgt, (-1i32) as u32, 0));
        assert!(branch_taken(Opcode::Bge, 3, 3));
        assert!(branch_taken(Opcode::Ble, 2, 3));
    }

    #[test]
    fn test_float_results() {
        let e = entry(Opcode::Fadd, 2.5f32.to_bits(), 0.5f32.to_bits(), 0);
        assert_eq!(float_result(&e).unwrap(), 3.0f32.to_bits());

        let e = entry(Opcode::Fdiv, 1.0f32.to_bits(), 0, 0);
        assert!(matches!(float_result(&e), Err(Fault::Arithmetic { .. })));
    }
}
