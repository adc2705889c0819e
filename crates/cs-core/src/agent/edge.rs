//! Boolean observations to edge events
//!
//! The detector knows nothing about where observations come from (a mutation
//! observer, a polling timer, a test); it only reports transitions.

/// A transition of the observed condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// false (or unknown) -> true
    Rising,
    /// true -> false
    Falling,
}

/// Turns a stream of boolean samples into edge events.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: Option<bool>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample. An initial `true` counts as a rising edge; an initial
    /// `false` produces nothing.
    pub fn observe(&mut self, value: bool) -> Option<Edge> {
        let prev = self.last.replace(value);
        match (prev.unwrap_or(false), value) {
            (false, true) => Some(Edge::Rising),
            (true, false) => Some(Edge::Falling),
            _ => None,
        }
    }

    /// Forget the last sample so the next `true` is reported again.
    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<bool> {
        self.last
    }
}
