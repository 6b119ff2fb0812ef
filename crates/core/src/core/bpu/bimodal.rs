//! Bimodal branch predictor.
//!
//! A table of 2-bit saturating counters indexed by PC bits. Each counter
//! starts weakly-not-taken (01) and predicts taken at 10 or above. Simple,
//! history-free, and effective for strongly biased branches.

/// Bimodal predictor: per-branch 2-bit saturating counters.
pub struct Bimodal {
    counters: Vec<u8>,
}

impl Bimodal {
    /// Creates a predictor with `entries` counters (power of two).
    pub fn new(entries: usize) -> Self {
        Self {
            counters: vec![1; entries],
        }
    }

    #[inline]
    fn index(&self, pc: u32) -> usize {
        ((pc >> 2) as usize) & (self.counters.len() - 1)
    }

    /// Predicts taken when the counter is 2 or 3.
    pub fn predict(&self, pc: u32) -> bool {
        self.counters[self.index(pc)] >= 2
    }

    /// Trains the counter toward the actual outcome, saturating at 0 and 3.
    pub fn update(&mut self, pc: u32, taken: bool) {
        let idx = self.index(pc);
        let c = self.counters[idx];
        self.counters[idx] = if taken {
            (c + 1).min(3)
        } else {
            c.saturating_sub(1)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_weakly_not_taken() {
        let bp = Bimodal::new(16);
        assert!(!bp.predict(0x0));
        assert!(!bp.predict(0x40));
    }

    #[test]
    fn test_trains_toward_taken() {
        let mut bp = Bimodal::new(16);
        bp.update(0x8, true);
        assert!(bp.predict(0x8));
        // Other entries unaffected.
        assert!(!bp.predict(0xC));
    }

    #[test]
    fn test_saturation() {
        let mut bp = Bimodal::new(16);
        for _ in 0..10 {
            bp.update(0x8, true);
        }
        // One not-taken does not flip a saturated counter.
        bp.update(0x8, false);
        assert!(bp.predict(0x8));

        for _ in 0..10 {
            bp.update(0x8, false);
        }
        bp.update(0x8, true);
        assert!(!bp.predict(0x8));
    }
}
