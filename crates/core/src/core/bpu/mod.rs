//! Branch prediction unit.
//!
//! Bundles a direction predictor (always-taken, bimodal, or gshare — enum
//! dispatch, no vtable in the fetch loop) with the shared branch target
//! buffer. Fetch consults `predict_branch`/`predict_jump`; commit calls
//! `update` with the resolved outcome and, on a misprediction,
//! `recover_history` with the branch's snapshot.

/// Branch target buffer.
pub mod btb;

/// Bimodal 2-bit counter predictor.
pub mod bimodal;

/// Global-history (gshare) predictor.
pub mod gshare;

use self::bimodal::Bimodal;
use self::btb::Btb;
use self::gshare::GShare;
use crate::config::{PredictorConfig, PredictorKind};
use crate::isa::Opcode;

/// A direction + target prediction, with the history snapshot needed for
/// gshare recovery.
#[derive(Clone, Copy, Debug, Default)]
pub struct Prediction {
    /// Predicted direction.
    pub taken: bool,
    /// Predicted target; `None` means fall through.
    pub target: Option<u32>,
    /// Global history register before this prediction was speculated.
    pub history: u32,
}

/// Direction predictor variants.
enum Direction {
    /// Predict every conditional branch taken.
    AlwaysTaken,
    Bimodal(Bimodal),
    GShare(GShare),
}

/// Branch prediction unit: direction predictor plus shared BTB.
pub struct BranchUnit {
    direction: Direction,
    btb: Btb,
}

impl BranchUnit {
    /// Builds the configured predictor variant.
    pub fn new(config: &PredictorConfig) -> Self {
        let direction = match config.kind {
            PredictorKind::AlwaysTaken => Direction::AlwaysTaken,
            PredictorKind::Bimodal => Direction::Bimodal(Bimodal::new(config.num_entries)),
            PredictorKind::GShare => {
                Direction::GShare(GShare::new(config.num_entries, config.history_length))
            }
        };
        Self {
            direction,
            btb: Btb::new(config.btb_entries),
        }
    }

    /// Predicts a conditional branch at `pc` whose static target is
    /// `static_target`.
    ///
    /// Direct branches carry their target in the instruction record, so a
    /// BTB miss never forces a not-taken downgrade for them; the BTB serves
    /// register jumps.
    pub fn predict_branch(&mut self, pc: u32, static_target: u32) -> Prediction {
        let (taken, history) = match &mut self.direction {
            Direction::AlwaysTaken => (true, 0),
            Direction::Bimodal(bp) => (bp.predict(pc), 0),
            Direction::GShare(bp) => bp.predict(pc),
        };
        Prediction {
            taken,
            target: taken.then_some(static_target),
            history,
        }
    }

    /// Predicts an unconditional jump. `j`/`jal` use their static target;
    /// `jr` consults the BTB and falls back to predicted not-taken (fall
    /// through) when no target is known. The history snapshot lets a jump
    /// mispredict discard wrong-path gshare speculation.
    pub fn predict_jump(&mut self, pc: u32, op: Opcode, static_target: Option<u32>) -> Prediction {
        let target = match op {
            Opcode::Jr => self.btb.lookup(pc),
            _ => static_target,
        };
        let history = match &self.direction {
            Direction::GShare(bp) => bp.history(),
            _ => 0,
        };
        Prediction {
            taken: target.is_some(),
            target,
            history,
        }
    }

    /// Trains the predictor with a resolved conditional branch and records
    /// the taken target in the BTB.
    pub fn update(&mut self, pc: u32, history: u32, taken: bool, target: u32) {
        match &mut self.direction {
            Direction::AlwaysTaken => {}
            Direction::Bimodal(bp) => bp.update(pc, taken),
            Direction::GShare(bp) => bp.update(pc, history, taken),
        }
        if taken {
            self.btb.update(pc, target);
        }
    }

    /// Records a resolved jump target in the BTB (trains `jr` prediction).
    pub fn update_jump(&mut self, pc: u32, target: u32) {
        self.btb.update(pc, target);
    }

    /// Repairs speculative global history after a conditional-branch
    /// misprediction: the snapshot plus the actual outcome.
    pub fn recover_history(&mut self, history: u32, actual_taken: bool) {
        if let Direction::GShare(bp) = &mut self.direction {
            bp.recover(history, actual_taken);
        }
    }

    /// Restores global history to a snapshot verbatim (jump mispredict).
    pub fn restore_history(&mut self, history: u32) {
        if let Direction::GShare(bp) = &mut self.direction {
            bp.restore(history);
        }
    }
}
