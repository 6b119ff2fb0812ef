//! Branch target buffer (BTB).
//!
//! A small fully-associative cache mapping branch PCs to their last resolved
//! targets, with LRU eviction. Fetch uses it to predict targets that are not
//! statically encoded (register jumps).

/// An entry in the branch target buffer.
#[derive(Clone, Copy, Default)]
struct BtbEntry {
    pc: u32,
    target: u32,
    lru: u64,
    valid: bool,
}

/// Branch target buffer with LRU replacement.
pub struct Btb {
    table: Vec<BtbEntry>,
    stamp: u64,
}

impl Btb {
    /// Creates a BTB with `entries` slots.
    pub fn new(entries: usize) -> Self {
        Self {
            table: vec![BtbEntry::default(); entries],
            stamp: 0,
        }
    }

    /// Looks up the predicted target for `pc`, refreshing its LRU stamp.
    pub fn lookup(&mut self, pc: u32) -> Option<u32> {
        self.stamp += 1;
        for e in &mut self.table {
            if e.valid && e.pc == pc {
                e.lru = self.stamp;
                return Some(e.target);
            }
        }
        None
    }

    /// Records a resolved target for `pc`, evicting the LRU entry if needed.
    pub fn update(&mut self, pc: u32, target: u32) {
        self.stamp += 1;
        if let Some(e) = self.table.iter_mut().find(|e| e.valid && e.pc == pc) {
            e.target = target;
            e.lru = self.stamp;
            return;
        }
        let victim = self
            .table
            .iter_mut()
            .min_by_key(|e| (e.valid, e.lru))
            .expect("BTB has at least one entry");
        *victim = BtbEntry {
            pc,
            target,
            lru: self.stamp,
            valid: true,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_miss_then_hit() {
        let mut btb = Btb::new(4);
        assert_eq!(btb.lookup(0x100), None);
        btb.update(0x100, 0x200);
        assert_eq!(btb.lookup(0x100), Some(0x200));
    }

    #[test]
    fn test_update_existing() {
        let mut btb = Btb::new(4);
        btb.update(0x100, 0x200);
        btb.update(0x100, 0x300);
        assert_eq!(btb.lookup(0x100), Some(0x300));
    }

    #[test]
    fn test_lru_eviction() {
        let mut btb = Btb::new(2);
        btb.update(0x100, 0x1);
        btb.update(0x200, 0x2);
        // Touch 0x100 so 0x200 becomes LRU.
        btb.lookup(0x100);
        btb.update(0x300, 0x3);

        assert_eq!(btb.lookup(0x100), Some(0x1));
        assert_eq!(btb.lookup(0x200), None);
        assert_eq!(btb.lookup(0x300), Some(0x3));
    }
}
