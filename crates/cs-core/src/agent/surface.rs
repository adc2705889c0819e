//! Seams between the agent and the page it runs on

use std::time::Duration;

/// Error from a player element.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlayerError {
    #[error("Playback rate {0} rejected")]
    RateRejected(f64),
    #[error("Player detached from document")]
    Detached,
}

/// A handle to the page's video element. Handles are cheap to clone and act
/// on the live element, like DOM references do.
pub trait VideoElement {
    fn muted(&self) -> bool;
    fn set_muted(&self, muted: bool);
    fn playback_rate(&self) -> f64;
    fn set_playback_rate(&self, rate: f64) -> Result<(), PlayerError>;
}

/// The playback surface as the agent sees it.
pub trait PlayerSurface {
    type Video: VideoElement;

    /// The main video element, if the page has built it yet.
    fn video(&self) -> Option<Self::Video>;
    /// Current value of the ad-indicator condition.
    fn ad_showing(&self) -> bool;
    /// Click the native skip control. Returns false when none is present.
    fn click_skip(&self) -> bool;
}

/// The two periodic actions run while skipping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tick {
    /// Try the skip control
    ClickSkip,
    /// Sample the ad indicator again
    Recheck,
}

/// Source of periodic ticks. Handles are cancelled by passing them back.
pub trait Scheduler {
    type Handle;

    fn every(&mut self, period: Duration, tick: Tick) -> Self::Handle;
    fn cancel(&mut self, handle: Self::Handle);
}
