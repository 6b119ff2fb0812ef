//! Simulator error and fault definitions.
//!
//! This module defines the error handling surface of the engine. It provides:
//! 1. **Pre-simulation errors:** Invalid configuration and invalid programs.
//! 2. **Runtime faults:** Memory and arithmetic faults attached to in-flight
//!    instructions and surfaced in program order at commit.
//! 3. **Invariant violations:** Deadlock diagnostics when the pipeline makes
//!    no forward progress.

use std::fmt;

use crate::core::rob::SeqNo;

/// A fault recorded on an in-flight instruction.
///
/// Faults are detected out of order (at a functional unit or during memory
/// access) but are only surfaced when the faulting instruction reaches the
/// reorder buffer head, so reporting preserves program order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// Load or store address outside the flat memory image.
    Memory { addr: u32 },
    /// Arithmetic hazard (e.g. float divide by zero).
    Arithmetic { detail: &'static str },
}

/// Top-level simulator error type.
#[derive(Clone, Debug, PartialEq)]
pub enum SimError {
    /// Configuration rejected before simulation started.
    Config(String),
    /// Program rejected by the assembler/loader before simulation started.
    Program { line: usize, msg: String },
    /// Runtime memory fault, surfaced at commit of the faulting instruction.
    MemoryFault { pc: u32, seq_no: SeqNo, addr: u32 },
    /// Runtime arithmetic fault, surfaced at commit of the faulting instruction.
    ArithmeticFault {
        pc: u32,
        seq_no: SeqNo,
        detail: &'static str,
    },
    /// Internal invariant violation: no commit or dispatch progress.
    Deadlock { cycle: u64, detail: String },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::Config(msg) => write!(f, "invalid configuration: {}", msg),
            SimError::Program { line, msg } => write!(f, "invalid program (line {}): {}", line, msg),
            SimError::MemoryFault { pc, seq_no, addr } => write!(
                f,
                "memory fault at pc={:#x} seq={} addr={:#x}",
                pc, seq_no.0, addr
            ),
            SimError::ArithmeticFault { pc, seq_no, detail } => write!(
                f,
                "arithmetic fault at pc={:#x} seq={}: {}",
                pc, seq_no.0, detail
            ),
            SimError::Deadlock { cycle, detail } => {
                write!(f, "pipeline deadlock at cycle {}: {}", cycle, detail)
            }
        }
    }
}

impl std::error::Error for SimError {}

impl Fault {
    /// Converts a recorded fault into the commit-time error, attaching the
    /// faulting instruction's identity.
    pub fn into_error(self, pc: u32, seq_no: SeqNo) -> SimError {
        match self {
            Fault::Memory { addr } => SimError::MemoryFault { pc, seq_no, addr },
            Fault::Arithmetic { detail } => SimError::ArithmeticFault { pc, seq_no, detail },
        }
    }
}
