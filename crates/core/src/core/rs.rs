//! Reservation stations and functional units.
//!
//! Each functional-unit class (ALU, FPU, LSU) has a fixed-capacity station of
//! waiting instructions and a pool of units with a per-class latency:
//! 1. **Install:** Issue places a decoded instruction into a free slot with
//!    its operand readiness captured as (value, producer-tag) pairs.
//! 2. **Wakeup:** Common-data-bus broadcasts fill matching pending operands.
//! 3. **Select:** Each cycle, every free unit binds the oldest ready entry
//!    of its class; the entry leaves the station.
//! 4. **Countdown:** A bound unit decrements its remaining cycles and
//!    surfaces the instruction when it reaches zero.

use crate::core::rob::SeqNo;
use crate::isa::{OpClass, Opcode};

/// Functional-unit class.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FuClass {
    /// Integer ALU; also executes branches, jumps, nops, and syscalls.
    Alu,
    /// Floating-point unit.
    Fpu,
    /// Load/store address generation.
    Lsu,
}

/// All functional-unit classes, in index order.
pub const FU_CLASSES: [FuClass; 3] = [FuClass::Alu, FuClass::Fpu, FuClass::Lsu];

impl FuClass {
    /// Which class executes the given instruction class.
    pub fn for_op(class: OpClass) -> FuClass {
        match class {
            OpClass::FloatAlu => FuClass::Fpu,
            OpClass::Load | OpClass::Store => FuClass::Lsu,
            _ => FuClass::Alu,
        }
    }

    /// Dense index for per-class arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            FuClass::Alu => "ALU",
            FuClass::Fpu => "FPU",
            FuClass::Lsu => "LSU",
        }
    }
}

/// One source operand slot: a value, or a pending producer tag.
#[derive(Clone, Copy, Debug, Default)]
pub struct Operand {
    /// Operand value, valid once `tag` is `None`.
    pub value: u32,
    /// Pending producer; cleared by the matching CDB broadcast.
    pub tag: Option<SeqNo>,
}

impl Operand {
    /// An operand whose value is already available.
    pub fn ready(value: u32) -> Self {
        Self { value, tag: None }
    }

    /// An operand waiting on an in-flight producer.
    pub fn pending(tag: SeqNo) -> Self {
        Self {
            value: 0,
            tag: Some(tag),
        }
    }

    /// True once the value is available.
    #[inline]
    pub fn is_ready(&self) -> bool {
        self.tag.is_none()
    }
}

/// A reservation station entry: an issued instruction waiting on operands.
#[derive(Clone, Debug, Default)]
pub struct RsEntry {
    /// Sequence number (doubles as the destination ROB tag).
    pub seq: SeqNo,
    /// Operation.
    pub op: Opcode,
    /// Program counter (diagnostics and link values).
    pub pc: u32,
    /// First operand (base register for memory ops).
    pub a: Operand,
    /// Second operand (store data for `sw`).
    pub b: Operand,
    /// Immediate / displacement / shift amount.
    pub imm: i32,
    /// Static branch/jump target.
    pub target: Option<u32>,
    /// Cycle the entry was installed (diagnostics).
    pub issued_cycle: u64,
    /// Slot occupied.
    pub valid: bool,
}

impl RsEntry {
    /// True when both operand slots are ready.
    #[inline]
    pub fn operands_ready(&self) -> bool {
        self.a.is_ready() && self.b.is_ready()
    }
}

/// Fixed-capacity reservation station for one functional-unit class.
pub struct ReservationStation {
    slots: Vec<RsEntry>,
    count: usize,
}

impl ReservationStation {
    /// Creates a station with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![RsEntry::default(); capacity],
            count: 0,
        }
    }

    /// Number of occupied slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True if no slot is occupied.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True if a free slot exists.
    pub fn has_free(&self) -> bool {
        self.count < self.slots.len()
    }

    /// Number of unoccupied slots.
    pub fn free_slots(&self) -> usize {
        self.slots.len() - self.count
    }

    /// Installs an entry into a free slot. Returns false when full.
    pub fn insert(&mut self, entry: RsEntry) -> bool {
        for slot in &mut self.slots {
            if !slot.valid {
                *slot = entry;
                slot.valid = true;
                self.count += 1;
                return true;
            }
        }
        false
    }

    /// Delivers a CDB broadcast: every pending operand with a matching
    /// producer tag adopts the value and becomes ready.
    pub fn broadcast(&mut self, seq: SeqNo, value: u32) {
        for slot in &mut self.slots {
            if !slot.valid {
                continue;
            }
            if slot.a.tag == Some(seq) {
                slot.a = Operand::ready(value);
            }
            if slot.b.tag == Some(seq) {
                slot.b = Operand::ready(value);
            }
        }
    }

    /// Removes and returns the oldest (lowest sequence number) entry whose
    /// operands are all ready.
    pub fn take_oldest_ready(&mut self) -> Option<RsEntry> {
        let mut best: Option<usize> = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.valid && slot.operands_ready() {
                match best {
                    Some(b) if self.slots[b].seq <= slot.seq => {}
                    _ => best = Some(i),
                }
            }
        }
        let idx = best?;
        let entry = self.slots[idx].clone();
        self.slots[idx].valid = false;
        self.count -= 1;
        Some(entry)
    }

    /// Frees every entry strictly younger than `seq`.
    pub fn squash_after(&mut self, seq: SeqNo) {
        for slot in &mut self.slots {
            if slot.valid && slot.seq > seq {
                slot.valid = false;
                self.count -= 1;
            }
        }
    }
}

/// A single functional unit: holds at most one instruction at a time.
#[derive(Clone, Debug, Default)]
struct FunctionalUnit {
    busy: bool,
    remaining: u64,
    entry: RsEntry,
}

/// The pool of functional units of one class, with a shared latency.
pub struct FuPool {
    class: FuClass,
    units: Vec<FunctionalUnit>,
    latency: u64,
}

impl FuPool {
    /// Creates `count` units with the given latency.
    pub fn new(class: FuClass, count: usize, latency: u64) -> Self {
        Self {
            class,
            units: vec![FunctionalUnit::default(); count],
            latency,
        }
    }

    /// Number of idle units.
    pub fn free_count(&self) -> usize {
        self.units.iter().filter(|u| !u.busy).count()
    }

    /// Number of busy units (utilization accounting).
    pub fn busy_count(&self) -> usize {
        self.units.len() - self.free_count()
    }

    /// Total unit count.
    pub fn count(&self) -> usize {
        self.units.len()
    }

    /// Binds an entry to a free unit. Panics if none is free (the dispatch
    /// loop checks `free_count` first).
    pub fn start(&mut self, entry: RsEntry) {
        let unit = self
            .units
            .iter_mut()
            .find(|u| !u.busy)
            .unwrap_or_else(|| panic!("{} pool dispatched with no free unit", self.class.name()));
        unit.busy = true;
        unit.remaining = self.latency;
        unit.entry = entry;
    }

    /// Advances every busy unit one cycle; returns the entries whose
    /// countdown reached zero this cycle.
    pub fn tick(&mut self) -> Vec<RsEntry> {
        let mut done = Vec::new();
        for unit in &mut self.units {
            if !unit.busy {
                continue;
            }
            assert!(
                unit.remaining > 0,
                "{} unit busy past its latency",
                self.class.name()
            );
            unit.remaining -= 1;
            if unit.remaining == 0 {
                unit.busy = false;
                done.push(std::mem::take(&mut unit.entry));
            }
        }
        done
    }

    /// Cancels in-flight work strictly younger than `seq`.
    pub fn squash_after(&mut self, seq: SeqNo) {
        for unit in &mut self.units {
            if unit.busy && unit.entry.seq > seq {
                unit.busy = false;
                unit.entry = RsEntry::default();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(seq: u32, a: Operand, b: Operand) -> RsEntry {
        RsEntry {
            seq: SeqNo(seq),
            op: Opcode::Add,
            a,
            b,
            valid: true,
            ..RsEntry::default()
        }
    }

    #[test]
    fn test_insert_until_full() {
        let mut rs = ReservationStation::new(2);
        assert!(rs.insert(entry(1, Operand::ready(0), Operand::ready(0))));
        assert!(rs.insert(entry(2, Operand::ready(0), Operand::ready(0))));
        assert!(!rs.has_free());
        assert!(!rs.insert(entry(3, Operand::ready(0), Operand::ready(0))));
    }

    #[test]
    fn test_oldest_ready_wins() {
        let mut rs = ReservationStation::new(4);
        rs.insert(entry(3, Operand::ready(0), Operand::ready(0)));
        rs.insert(entry(1, Operand::ready(0), Operand::ready(0)));
        rs.insert(entry(2, Operand::pending(SeqNo(99)), Operand::ready(0)));

        assert_eq!(rs.take_oldest_ready().unwrap().seq, SeqNo(1));
        // Entry 2 is not ready, so 3 goes next.
        assert_eq!(rs.take_oldest_ready().unwrap().seq, SeqNo(3));
        assert!(rs.take_oldest_ready().is_none());
    }

    #[test]
    fn test_broadcast_wakes_operands() {
        let mut rs = ReservationStation::new(4);
        rs.insert(entry(2, Operand::pending(SeqNo(1)), Operand::pending(SeqNo(1))));

        assert!(rs.take_oldest_ready().is_none());
        rs.broadcast(SeqNo(1), 42);

        let e = rs.take_oldest_ready().unwrap();
        assert_eq!(e.a.value, 42);
        assert_eq!(e.b.value, 42);
    }

    #[test]
    fn test_broadcast_ignores_other_tags() {
        let mut rs = ReservationStation::new(4);
        rs.insert(entry(2, Operand::pending(SeqNo(1)), Operand::ready(7)));
        rs.broadcast(SeqNo(5), 42);
        assert!(rs.take_oldest_ready().is_none());
    }

    #[test]
    fn test_squash_after() {
        let mut rs = ReservationStation::new(4);
        rs.insert(entry(1, Operand::ready(0), Operand::ready(0)));
        rs.insert(entry(5, Operand::ready(0), Operand::ready(0)));
        rs.squash_after(SeqNo(3));
        assert_eq!(rs.len(), 1);
        assert_eq!(rs.take_oldest_ready().unwrap().seq, SeqNo(1));
    }

    #[test]
    fn test_fu_countdown() {
        let mut pool = FuPool::new(FuClass::Fpu, 1, 3);
        pool.start(entry(1, Operand::ready(2), Operand::ready(3)));
        assert_eq!(pool.free_count(), 0);

        assert!(pool.tick().is_empty());
        assert!(pool.tick().is_empty());
        let done = pool.tick();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].seq, SeqNo(1));
        assert_eq!(pool.free_count(), 1);
    }

    #[test]
    fn test_fu_parallel_units() {
        let mut pool = FuPool::new(FuClass::Alu, 2, 1);
        pool.start(entry(1, Operand::ready(0), Operand::ready(0)));
        pool.start(entry(2, Operand::ready(0), Operand::ready(0)));
        assert_eq!(pool.free_count(), 0);
        let done = pool.tick();
        assert_eq!(done.len(), 2);
    }

    #[test]
    fn test_fu_squash() {
        let mut pool = FuPool::new(FuClass::Alu, 2, 2);
        pool.start(entry(1, Operand::ready(0), Operand::ready(0)));
        pool.start(entry(9, Operand::ready(0), Operand::ready(0)));
        pool.squash_after(SeqNo(4));
        assert_eq!(pool.free_count(), 1);
        pool.tick();
        let done = pool.tick();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].seq, SeqNo(1));
    }
}
