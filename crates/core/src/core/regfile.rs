//! Architectural register file and tag-based rename map.
//!
//! The register file holds committed architectural state only; speculative
//! values live in the reorder buffer until commit. The rename map tracks,
//! per architectural register, the sequence number of its latest in-flight
//! producer (`None` = the architectural value is current). This lets issue
//! resolve each source operand with a single ROB lookup.

use crate::core::rob::{Rob, SeqNo};
use crate::isa::NUM_REGS;

/// Architectural register file. `$zero` reads as zero and ignores writes.
pub struct RegisterFile {
    regs: [u32; NUM_REGS],
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterFile {
    /// Creates a zeroed register file.
    pub fn new() -> Self {
        Self {
            regs: [0; NUM_REGS],
        }
    }

    /// Reads a register.
    #[inline]
    pub fn read(&self, reg: u8) -> u32 {
        self.regs[reg as usize]
    }

    /// Writes a register. Writes to `$zero` are dropped.
    #[inline]
    pub fn write(&mut self, reg: u8, value: u32) {
        if reg != 0 {
            self.regs[reg as usize] = value;
        }
    }
}

/// Rename map: architectural register → latest in-flight producer tag.
pub struct RenameMap {
    map: [Option<SeqNo>; NUM_REGS],
}

impl Default for RenameMap {
    fn default() -> Self {
        Self::new()
    }
}

impl RenameMap {
    /// Creates a rename map with no pending producers.
    pub fn new() -> Self {
        Self {
            map: [None; NUM_REGS],
        }
    }

    /// Marks `reg` as produced by the in-flight instruction `seq`.
    /// No-op for `$zero`.
    pub fn set_producer(&mut self, reg: u8, seq: SeqNo) {
        if reg != 0 {
            self.map[reg as usize] = Some(seq);
        }
    }

    /// Latest pending producer for `reg`, or `None` if the architectural
    /// value is current.
    pub fn producer(&self, reg: u8) -> Option<SeqNo> {
        self.map[reg as usize]
    }

    /// Clears the producer for `reg`, but only if it still matches `seq`.
    /// A committing instruction must not clear a tag set by a newer rename
    /// of the same register (WAW safety).
    pub fn clear_if_match(&mut self, reg: u8, seq: SeqNo) {
        if self.map[reg as usize] == Some(seq) {
            self.map[reg as usize] = None;
        }
    }

    /// Rebuilds the map from the surviving ROB entries after a squash.
    ///
    /// Walking head to tail lets the youngest surviving writer of each
    /// register win, which is exactly the mapping a decode-time snapshot
    /// of the squashed branch would restore.
    pub fn rebuild_from_rob(&mut self, rob: &Rob) {
        self.map = [None; NUM_REGS];
        rob.for_each_valid(|entry| {
            if let Some(dest) = entry.dest {
                if dest != 0 {
                    self.map[dest as usize] = Some(entry.seq);
                }
            }
        });
    }
}
