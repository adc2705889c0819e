//! Two-phase "wait for the element, then observe it" watcher
//!
//! Phase 1 watches for the player root to exist; phase 2 observes the root
//! itself. Attaching phase 2 disposes phase 1, and teardown disposes
//! whichever phase is live, so no observer outlives the page.

/// Something that can be disconnected from the page.
pub trait Observation {
    fn disconnect(&mut self);
}

enum Phase<W, A> {
    Waiting(W),
    Attached(A),
    Disposed,
}

/// Owns the live observer of a two-phase watch.
pub struct TwoPhaseWatcher<W: Observation, A: Observation> {
    phase: Phase<W, A>,
}

impl<W: Observation, A: Observation> TwoPhaseWatcher<W, A> {
    /// Start in phase 1 with the existence observer already connected.
    pub fn waiting(existence: W) -> Self {
        Self {
            phase: Phase::Waiting(existence),
        }
    }

    /// Start directly in phase 2, for when the element already exists.
    pub fn attached(observer: A) -> Self {
        Self {
            phase: Phase::Attached(observer),
        }
    }

    /// Move to phase 2. The existence observer is disconnected first.
    /// Returns false (and disconnects `observer`) if already attached or
    /// torn down.
    pub fn attach(&mut self, mut observer: A) -> bool {
        match std::mem::replace(&mut self.phase, Phase::Disposed) {
            Phase::Waiting(mut existence) => {
                existence.disconnect();
                self.phase = Phase::Attached(observer);
                true
            }
            other => {
                self.phase = other;
                observer.disconnect();
                false
            }
        }
    }

    pub fn is_waiting(&self) -> bool {
        matches!(self.phase, Phase::Waiting(_))
    }

    pub fn is_attached(&self) -> bool {
        matches!(self.phase, Phase::Attached(_))
    }

    /// Disconnect whatever is live. Safe to call more than once.
    pub fn teardown(&mut self) {
        match std::mem::replace(&mut self.phase, Phase::Disposed) {
            Phase::Waiting(mut w) => w.disconnect(),
            Phase::Attached(mut a) => a.disconnect(),
            Phase::Disposed => {}
        }
    }
}

impl<W: Observation, A: Observation> Drop for TwoPhaseWatcher<W, A> {
    fn drop(&mut self) {
        self.teardown();
    }
}
