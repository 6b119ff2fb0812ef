//! Assembly-file loading.
//!
//! Thin wrapper over the assembler: reads a `.asm` file from disk and
//! produces the program image the core consumes. I/O failures are reported
//! as program-invalid errors so the caller has a single pre-simulation
//! error path.

use std::fs;
use std::path::Path;

use crate::common::SimError;
use crate::isa::Program;

/// Reads and assembles a MIPS-like assembly file.
pub fn load_program(path: &Path) -> Result<Program, SimError> {
    let src = fs::read_to_string(path).map_err(|e| SimError::Program {
        line: 0,
        msg: format!("could not read '{}': {}", path.display(), e),
    })?;
    Program::assemble(&src)
}
