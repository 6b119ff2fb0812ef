//! Reorder buffer (ROB) for in-order commit.
//!
//! The ROB is a circular buffer tracking every in-flight instruction from
//! decode through commit. It provides:
//! 1. **Allocation:** Assigns monotonic sequence numbers at decode.
//! 2. **Completion:** Marks entries done when their results broadcast.
//! 3. **In-order commit:** Retires entries from the head in program order.
//! 4. **Squash:** Frees all entries younger than a mispredicted branch.
//!
//! Sequence numbers double as the producer tags consumed by reservation
//! stations; the ROB resolves tag → slot internally, so ring-slot reuse can
//! never alias a stale tag.

use crate::common::Fault;
use crate::isa::{OpClass, Opcode};

/// Monotonic program-order tag assigned at decode; the primary ordering key
/// and the producer identity broadcast on the common data bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SeqNo(pub u32);

/// A single entry in the reorder buffer.
#[derive(Clone, Debug, Default)]
pub struct RobEntry {
    /// Sequence number of this instruction.
    pub seq: SeqNo,
    /// Program counter.
    pub pc: u32,
    /// Operation.
    pub op: Opcode,
    /// Destination architectural register, if any.
    pub dest: Option<u8>,
    /// Result value (ALU output, load data, or link address).
    pub result: u32,
    /// Execution finished; result (and branch outcome) are valid.
    pub completed: bool,
    /// Fault recorded out of order, surfaced when this entry commits.
    pub fault: Option<Fault>,
    /// Control-flow entry (branch or jump).
    pub is_branch: bool,
    /// Conditional branch (participates in predictor statistics).
    pub is_conditional: bool,
    /// Predicted direction at fetch.
    pub pred_taken: bool,
    /// Predicted target at fetch (fall-through when predicted not-taken).
    pub pred_target: u32,
    /// Resolved direction.
    pub actual_taken: bool,
    /// Resolved target.
    pub actual_target: u32,
    /// Global-history snapshot captured at predict time (gshare recovery).
    pub history: u32,
    /// Store entry: the data-cache write happens at commit.
    pub is_store: bool,
    /// Load entry.
    pub is_load: bool,
    /// Exit-syscall sentinel; stops the driver when it reaches the head.
    pub is_halt: bool,
    /// Slot occupied.
    pub valid: bool,
}

impl RobEntry {
    /// True if the resolved control flow disagrees with the prediction.
    pub fn mispredicted(&self) -> bool {
        self.is_branch
            && (self.actual_taken != self.pred_taken
                || (self.actual_taken && self.actual_target != self.pred_target))
    }
}

/// Reorder buffer: fixed-capacity ring with head (commit) and tail (allocate).
pub struct Rob {
    entries: Vec<RobEntry>,
    head: usize,
    tail: usize,
    count: usize,
    next_seq: u32,
}

impl Rob {
    /// Creates a new ROB with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![RobEntry::default(); capacity],
            head: 0,
            tail: 0,
            count: 0,
            next_seq: 1,
        }
    }

    /// ROB capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    /// Number of occupied entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True if no entries are in flight.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True if no slot is free.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.entries.len()
    }

    /// Allocates an entry for a decoded instruction. Returns `None` when full.
    pub fn allocate(&mut self, pc: u32, op: Opcode, dest: Option<u8>) -> Option<SeqNo> {
        if self.is_full() {
            return None;
        }
        let seq = SeqNo(self.next_seq);
        self.next_seq = self.next_seq.wrapping_add(1);

        let class = op.class();
        self.entries[self.tail] = RobEntry {
            seq,
            pc,
            op,
            dest,
            is_branch: class.is_control(),
            is_conditional: class == OpClass::Branch,
            is_store: class == OpClass::Store,
            is_load: class == OpClass::Load,
            valid: true,
            ..RobEntry::default()
        };
        self.tail = (self.tail + 1) % self.entries.len();
        self.count += 1;
        Some(seq)
    }

    /// Marks an entry completed with its result value.
    pub fn complete(&mut self, seq: SeqNo, result: u32) {
        if let Some(entry) = self.find_mut(seq) {
            entry.completed = true;
            entry.result = result;
        }
    }

    /// Records a fault; the entry is completed so it can reach the head.
    pub fn fault(&mut self, seq: SeqNo, fault: Fault) {
        if let Some(entry) = self.find_mut(seq) {
            entry.completed = true;
            entry.fault = Some(fault);
        }
    }

    /// Records the resolved outcome of a control-flow instruction.
    pub fn set_branch_outcome(&mut self, seq: SeqNo, taken: bool, target: u32) {
        if let Some(entry) = self.find_mut(seq) {
            entry.actual_taken = taken;
            entry.actual_target = target;
        }
    }

    /// Records prediction metadata captured at fetch.
    pub fn set_prediction(&mut self, seq: SeqNo, taken: bool, target: u32, history: u32) {
        if let Some(entry) = self.find_mut(seq) {
            entry.pred_taken = taken;
            entry.pred_target = target;
            entry.history = history;
        }
    }

    /// Marks an entry as the exit sentinel.
    pub fn set_halt(&mut self, seq: SeqNo) {
        if let Some(entry) = self.find_mut(seq) {
            entry.is_halt = true;
        }
    }

    /// Returns the head (oldest) entry, if any.
    pub fn peek_head(&self) -> Option<&RobEntry> {
        if self.count == 0 {
            None
        } else {
            Some(&self.entries[self.head])
        }
    }

    /// Retires the head entry if it has completed. Returns `None` when the
    /// ROB is empty or the head is still executing.
    pub fn commit_head(&mut self) -> Option<RobEntry> {
        if self.count == 0 || !self.entries[self.head].completed {
            return None;
        }
        let committed = self.entries[self.head].clone();
        self.entries[self.head].valid = false;
        self.head = (self.head + 1) % self.entries.len();
        self.count -= 1;
        Some(committed)
    }

    /// Frees every entry strictly younger than `seq`. The entry with `seq`
    /// itself is kept (the mispredicted branch commits normally).
    pub fn squash_after(&mut self, seq: SeqNo) {
        let cap = self.entries.len();
        let mut idx = self.head;
        let mut kept = 0;
        for i in 0..self.count {
            if self.entries[idx].seq > seq {
                // Everything from here to the tail is younger.
                let mut j = idx;
                while j != self.tail {
                    self.entries[j].valid = false;
                    j = (j + 1) % cap;
                }
                self.tail = idx;
                self.count = i;
                return;
            }
            kept += 1;
            idx = (idx + 1) % cap;
        }
        self.count = kept;
    }

    /// Looks up an in-flight entry by sequence number.
    pub fn find(&self, seq: SeqNo) -> Option<&RobEntry> {
        let mut idx = self.head;
        for _ in 0..self.count {
            if self.entries[idx].valid && self.entries[idx].seq == seq {
                return Some(&self.entries[idx]);
            }
            idx = (idx + 1) % self.entries.len();
        }
        None
    }

    /// Iterates all valid entries from head to tail.
    pub fn for_each_valid(&self, mut f: impl FnMut(&RobEntry)) {
        let mut idx = self.head;
        for _ in 0..self.count {
            if self.entries[idx].valid {
                f(&self.entries[idx]);
            }
            idx = (idx + 1) % self.entries.len();
        }
    }

    fn find_mut(&mut self, seq: SeqNo) -> Option<&mut RobEntry> {
        let mut idx = self.head;
        for _ in 0..self.count {
            if self.entries[idx].valid && self.entries[idx].seq == seq {
                return Some(&mut self.entries[idx]);
            }
            idx = (idx + 1) % self.entries.len();
        }
        None
    }
}
