use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Debug, Default)]
struct GuardState {
    programmatic_move: bool,
    busy: bool,
}

/// What a settle event is allowed to do.
#[derive(Debug)]
pub enum Admission {
    /// The settle was caused by our own move; the pending flag is now consumed.
    Suppressed,
    /// A pass is already running; this settle is dropped, not queued.
    Busy,
    Pass(PassToken),
}

/// Feedback-loop and overlap protection for settle handling.
///
/// Both checks and the transition into a pass happen under one lock, so two
/// settles can never both be admitted.
#[derive(Clone, Default)]
pub struct SettleGuard {
    state: Arc<Mutex<GuardState>>,
}

impl SettleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call right before commanding the map to move.
    pub fn arm_programmatic_move(&self) {
        self.state.lock().programmatic_move = true;
    }

    pub fn programmatic_move_armed(&self) -> bool {
        self.state.lock().programmatic_move
    }

    pub fn is_busy(&self) -> bool {
        self.state.lock().busy
    }

    pub fn admit(&self) -> Admission {
        let mut state = self.state.lock();
        if state.programmatic_move {
            state.programmatic_move = false;
            return Admission::Suppressed;
        }
        if state.busy {
            return Admission::Busy;
        }
        state.busy = true;
        Admission::Pass(PassToken {
            state: Arc::clone(&self.state),
        })
    }
}

/// Holds the busy flag for one load-and-render pass; released on drop, including
/// early returns and unwinding.
#[derive(Debug)]
pub struct PassToken {
    state: Arc<Mutex<GuardState>>,
}

impl Drop for PassToken {
    fn drop(&mut self) {
        self.state.lock().busy = false;
    }
}
