//! Load/store queue: program-order memory disambiguation.
//!
//! Memory operations enter the queue at decode in program order and leave at
//! commit. The queue provides:
//! 1. **Resolution:** Addresses (and store data) are filled in when the LSU
//!    finishes address generation.
//! 2. **Ordering:** A load may access memory only once every older store has
//!    a resolved address.
//! 3. **Forwarding:** The newest older store that fully covers a load
//!    supplies its value directly; partial overlap stalls the load until the
//!    store commits and drains.
//! 4. **Drain:** A store writes the data cache only when it commits, from
//!    the queue head.

use crate::core::rob::SeqNo;

/// Memory operation kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum MemKind {
    #[default]
    Load,
    Store,
}

/// Result of polling the queue for a load to send to the data cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadQuery {
    /// This load may access the cache (or forward) now.
    Ready { seq: SeqNo, addr: u32 },
    /// The oldest pending load is held up by an older unresolved store.
    Blocked,
    /// No load is waiting on the port.
    Idle,
}

/// Result of a store-to-load forwarding check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ForwardResult {
    /// A store fully covers the load; use the forwarded value.
    Hit(u32),
    /// No overlap with any older store; safe to read the data cache.
    Miss,
    /// Partial overlap; the load must wait for the store to drain.
    Stall,
}

/// One queue entry. All accesses are 4-byte words.
#[derive(Clone, Debug, Default)]
pub struct LsqEntry {
    /// Sequence number of the memory instruction.
    pub seq: SeqNo,
    /// Load or store.
    pub kind: MemKind,
    /// Resolved address, `None` until address generation completes.
    pub addr: Option<u32>,
    /// Store data (valid for resolved stores).
    pub data: u32,
    /// The operation has produced its result (loads) or is ready to drain
    /// at commit (stores).
    pub done: bool,
    /// Store has committed; it drains to the data cache from the head.
    /// Until it drains it still forwards to younger loads.
    pub committed: bool,
    /// Slot occupied.
    pub valid: bool,
}

const ACCESS_BYTES: u32 = 4;

/// Program-order FIFO of in-flight memory operations.
pub struct LoadStoreQueue {
    entries: Vec<LsqEntry>,
    head: usize,
    tail: usize,
    count: usize,
}

impl LoadStoreQueue {
    /// Creates a queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: vec![LsqEntry::default(); capacity],
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    /// Number of occupied entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True if the queue is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True if the queue is full.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.entries.len()
    }

    /// Appends an entry in program order. Returns false when full.
    pub fn allocate(&mut self, seq: SeqNo, kind: MemKind) -> bool {
        if self.is_full() {
            return false;
        }
        self.entries[self.tail] = LsqEntry {
            seq,
            kind,
            valid: true,
            ..LsqEntry::default()
        };
        self.tail = (self.tail + 1) % self.entries.len();
        self.count += 1;
        true
    }

    /// Fills in the resolved address (and store data) after address
    /// generation.
    pub fn resolve(&mut self, seq: SeqNo, addr: u32, data: u32) {
        if let Some(entry) = self.find_mut(seq) {
            entry.addr = Some(addr);
            entry.data = data;
            if entry.kind == MemKind::Store {
                entry.done = true;
            }
        }
    }

    /// Marks a load as having produced its value.
    pub fn mark_done(&mut self, seq: SeqNo) {
        if let Some(entry) = self.find_mut(seq) {
            entry.done = true;
        }
    }

    /// True if any store older than `seq` has an unresolved address.
    pub fn has_older_unresolved_store(&self, seq: SeqNo) -> bool {
        let mut idx = self.head;
        for _ in 0..self.count {
            let e = &self.entries[idx];
            if e.valid && e.seq < seq && e.kind == MemKind::Store && e.addr.is_none() {
                return true;
            }
            idx = (idx + 1) % self.entries.len();
        }
        false
    }

    /// Store-to-load forwarding for a resolved load.
    ///
    /// Scans older stores newest-first. The first store whose range overlaps
    /// the load decides the outcome: full coverage forwards its data, partial
    /// overlap stalls. Callers must have checked that no older store is
    /// unresolved.
    pub fn forward_load(&self, seq: SeqNo, addr: u32) -> ForwardResult {
        let load_start = addr;
        let load_end = addr + ACCESS_BYTES;

        let cap = self.entries.len();
        let mut idx = if self.tail == 0 { cap - 1 } else { self.tail - 1 };
        for _ in 0..self.count {
            let e = &self.entries[idx];
            if e.valid && e.seq < seq && e.kind == MemKind::Store {
                if let Some(store_addr) = e.addr {
                    let store_start = store_addr;
                    let store_end = store_addr + ACCESS_BYTES;
                    if load_start < store_end && load_end > store_start {
                        if store_start <= load_start && store_end >= load_end {
                            return ForwardResult::Hit(e.data);
                        }
                        return ForwardResult::Stall;
                    }
                }
            }
            idx = if idx == 0 { cap - 1 } else { idx - 1 };
        }
        ForwardResult::Miss
    }

    /// Polls for the oldest load eligible for the data-cache port this
    /// cycle. Younger loads wait behind a pending one (in-order address
    /// resolution).
    pub fn poll_load(&self) -> LoadQuery {
        let mut idx = self.head;
        for _ in 0..self.count {
            let e = &self.entries[idx];
            if e.valid && e.kind == MemKind::Load && !e.done {
                return match e.addr {
                    Some(_) if self.has_older_unresolved_store(e.seq) => LoadQuery::Blocked,
                    Some(addr) => LoadQuery::Ready { seq: e.seq, addr },
                    // Address generation still pending: execution latency,
                    // not a hazard.
                    None => LoadQuery::Idle,
                };
            }
            idx = (idx + 1) % self.entries.len();
        }
        LoadQuery::Idle
    }

    /// Returns the head (oldest) entry, if any.
    pub fn peek_head(&self) -> Option<&LsqEntry> {
        if self.count == 0 {
            None
        } else {
            Some(&self.entries[self.head])
        }
    }

    /// Marks a committed store; it remains queued (and forwardable) until
    /// `drain_committed` pops it from the head.
    pub fn mark_committed(&mut self, seq: SeqNo) {
        if let Some(entry) = self.find_mut(seq) {
            debug_assert_eq!(entry.kind, MemKind::Store);
            entry.committed = true;
        }
    }

    /// Pops the head if it is a committed store, returning it for the
    /// data-cache write. One call drains at most one store.
    pub fn drain_committed(&mut self) -> Option<LsqEntry> {
        if self.count == 0 {
            return None;
        }
        let head = &self.entries[self.head];
        if head.kind != MemKind::Store || !head.committed {
            return None;
        }
        let drained = self.entries[self.head].clone();
        self.entries[self.head].valid = false;
        self.head = (self.head + 1) % self.entries.len();
        self.count -= 1;
        Some(drained)
    }

    /// Releases a committing load. The load must be the queue head (commit
    /// is in program order; any committed stores ahead of it must have been
    /// drained first).
    pub fn release_head(&mut self, seq: SeqNo) -> Option<LsqEntry> {
        if self.count == 0 {
            return None;
        }
        let head = &self.entries[self.head];
        assert_eq!(
            head.seq, seq,
            "commit released a memory op that is not the LSQ head"
        );
        let released = self.entries[self.head].clone();
        self.entries[self.head].valid = false;
        self.head = (self.head + 1) % self.entries.len();
        self.count -= 1;
        Some(released)
    }

    /// Frees every entry strictly younger than `seq`.
    pub fn squash_after(&mut self, seq: SeqNo) {
        let cap = self.entries.len();
        let mut idx = self.head;
        for i in 0..self.count {
            if self.entries[idx].seq > seq {
                let mut j = idx;
                while j != self.tail {
                    self.entries[j].valid = false;
                    j = (j + 1) % cap;
                }
                self.tail = idx;
                self.count = i;
                return;
            }
            idx = (idx + 1) % cap;
        }
    }

    fn find_mut(&mut self, seq: SeqNo) -> Option<&mut LsqEntry> {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_in_order() {
        let mut lsq = LoadStoreQueue::new(2);
        assert!(lsq.allocate(SeqNo(1), MemKind::Store));
        assert!(lsq.allocate(SeqNo(2), MemKind::Load));
        assert!(lsq.is_full());
        assert!(!lsq.allocate(SeqNo(3), MemKind::Load));
    }

    #[test]
    fn test_forward_full_cover() {
        let mut lsq = LoadStoreQueue::new(4);
        lsq.allocate(SeqNo(1), MemKind::Store);
        lsq.allocate(SeqNo(2), MemKind::Load);
        lsq.resolve(SeqNo(1), 0x100, 0xAB);

        assert_eq!(lsq.forward_load(SeqNo(2), 0x100), ForwardResult::Hit(0xAB));
        assert_eq!(lsq.forward_load(SeqNo(2), 0x104), ForwardResult::Miss);
    }

    #[test]
    fn test_forward_partial_overlap_stalls() {
        let mut lsq = LoadStoreQueue::new(4);
        lsq.allocate(SeqNo(1), MemKind::Store);
        lsq.allocate(SeqNo(2), MemKind::Load);
        lsq.resolve(SeqNo(1), 0x102, 0xAB);

        assert_eq!(lsq.forward_load(SeqNo(2), 0x100), ForwardResult::Stall);
    }

    #[test]
    fn test_forward_newest_older_store_wins() {
        let mut lsq = LoadStoreQueue::new(4);
        lsq.allocate(SeqNo(1), MemKind::Store);
        lsq.allocate(SeqNo(2), MemKind::Store);
        lsq.allocate(SeqNo(3), MemKind::Load);
        lsq.resolve(SeqNo(1), 0x100, 1);
        lsq.resolve(SeqNo(2), 0x100, 2);

        assert_eq!(lsq.forward_load(SeqNo(3), 0x100), ForwardResult::Hit(2));
    }

    #[test]
    fn test_forwarding_ignores_younger_stores() {
        let mut lsq = LoadStoreQueue::new(4);
        lsq.allocate(SeqNo(1), MemKind::Load);
        lsq.allocate(SeqNo(2), MemKind::Store);
        lsq.resolve(SeqNo(2), 0x100, 7);

        assert_eq!(lsq.forward_load(SeqNo(1), 0x100), ForwardResult::Miss);
    }

    #[test]
    fn test_older_unresolved_store_blocks_load() {
        let mut lsq = LoadStoreQueue::new(4);
        lsq.allocate(SeqNo(1), MemKind::Store);
        lsq.allocate(SeqNo(2), MemKind::Load);
        lsq.resolve(SeqNo(2), 0x200, 0);

        assert!(lsq.has_older_unresolved_store(SeqNo(2)));
        assert_eq!(lsq.poll_load(), LoadQuery::Blocked);

        lsq.resolve(SeqNo(1), 0x100, 0);
        assert!(!lsq.has_older_unresolved_store(SeqNo(2)));
        assert_eq!(
            lsq.poll_load(),
            LoadQuery::Ready {
                seq: SeqNo(2),
                addr: 0x200
            }
        );
    }

    #[test]
    fn test_store_commit_then_drain() {
        let mut lsq = LoadStoreQueue::new(4);
        lsq.allocate(SeqNo(1), MemKind::Store);
        lsq.resolve(SeqNo(1), 0x100, 42);

        // Not committed yet: nothing drains.
        assert!(lsq.drain_committed().is_none());

        lsq.mark_committed(SeqNo(1));
        // Still forwardable while committed-but-undrained.
        assert_eq!(lsq.forward_load(SeqNo(2), 0x100), ForwardResult::Hit(42));

        let e = lsq.drain_committed().unwrap();
        assert_eq!(e.addr, Some(0x100));
        assert_eq!(e.data, 42);
        assert!(lsq.is_empty());
    }

    #[test]
    #[should_panic(expected = "not the LSQ head")]
    fn test_release_out_of_order_panics() {
        let mut lsq = LoadStoreQueue::new(4);
        lsq.allocate(SeqNo(1), MemKind::Store);
        lsq.allocate(SeqNo(2), MemKind::Load);
        lsq.release_head(SeqNo(2));
    }

    #[test]
    fn test_squash_after() {
        let mut lsq = LoadStoreQueue::new(4);
        lsq.allocate(SeqNo(1), MemKind::Store);
        lsq.allocate(SeqNo(5), MemKind::Load);
        lsq.allocate(SeqNo(6), MemKind::Store);

        lsq.squash_after(SeqNo(2));
        assert_eq!(lsq.len(), 1);

        // Reuse after squash keeps FIFO order.
        assert!(lsq.allocate(SeqNo(7), MemKind::Load));
        assert_eq!(lsq.len(), 2);
    }

    #[test]
    fn test_stall_clears_after_store_drains() {
        let mut lsq = LoadStoreQueue::new(4);
        lsq.allocate(SeqNo(1), MemKind::Store);
        lsq.allocate(SeqNo(2), MemKind::Load);
        lsq.resolve(SeqNo(1), 0x102, 0xAB);
        assert_eq!(lsq.forward_load(SeqNo(2), 0x100), ForwardResult::Stall);

        lsq.mark_committed(SeqNo(1));
        lsq.drain_committed().unwrap();
        assert_eq!(lsq.forward_load(SeqNo(2), 0x100), ForwardResult::Miss);
    }
}
