//! Ad-skip state machine
//!
//! IDLE -> SKIPPING on a rising ad-indicator edge: capture `muted` and
//! `playbackRate`, mute, fast-forward, and start the skip-click and re-check
//! timers as a pair. SKIPPING -> IDLE on a falling edge: cancel both timers,
//! restore the captured values and forget them.

use log::{debug, warn};

use super::edge::{Edge, EdgeDetector};
use super::surface::{PlayerSurface, Scheduler, Tick, VideoElement};
use crate::settings::AgentSettings;

/// Agent phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Skipping,
}

/// Playback values captured on entry to SKIPPING.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SavedPlayback {
    pub muted: Option<bool>,
    pub rate: Option<f64>,
}

/// Outcome of feeding the agent an observation or tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Entered,
    Exited,
    Unchanged,
}

struct MitigationTimers<H> {
    click: H,
    recheck: H,
}

/// Per-page ad-skip agent.
pub struct AdSkipAgent<S: Scheduler> {
    settings: AgentSettings,
    scheduler: S,
    detector: EdgeDetector,
    phase: Phase,
    saved: SavedPlayback,
    timers: Option<MitigationTimers<S::Handle>>,
}

impl<S: Scheduler> AdSkipAgent<S> {
    pub fn new(settings: AgentSettings, scheduler: S) -> Self {
        Self {
            settings,
            scheduler,
            detector: EdgeDetector::new(),
            phase: Phase::Idle,
            saved: SavedPlayback::default(),
            timers: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn saved(&self) -> SavedPlayback {
        self.saved
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    /// Feed one sample of the ad-indicator condition.
    pub fn observe<P: PlayerSurface>(&mut self, surface: &P, showing: bool) -> Transition {
        match self.detector.observe(showing) {
            Some(Edge::Rising) => self.enter(surface),
            Some(Edge::Falling) => self.exit(surface),
            None => Transition::Unchanged,
        }
    }

    /// Run one periodic action.
    pub fn on_tick<P: PlayerSurface>(&mut self, surface: &P, tick: Tick) -> Transition {
        match tick {
            Tick::ClickSkip => {
                if self.phase == Phase::Skipping && surface.click_skip() {
                    debug!("Clicked skip control");
                }
                Transition::Unchanged
            }
            Tick::Recheck => {
                let showing = surface.ad_showing();
                self.observe(surface, showing)
            }
        }
    }

    /// Cancel any periodic work and forget all state. Does not touch the
    /// player; the page is going away.
    pub fn teardown(&mut self) {
        self.cancel_timers();
        self.phase = Phase::Idle;
        self.saved = SavedPlayback::default();
        self.detector.reset();
    }

    fn enter<P: PlayerSurface>(&mut self, surface: &P) -> Transition {
        if self.phase == Phase::Skipping {
            return Transition::Unchanged;
        }

        // No video yet: stay idle and let the next sample retry
        let Some(video) = surface.video() else {
            debug!("Ad indicator set but no video element yet");
            self.detector.reset();
            return Transition::Unchanged;
        };

        self.phase = Phase::Skipping;
        if self.saved.muted.is_none() {
            self.saved.muted = Some(video.muted());
        }
        if self.saved.rate.is_none() {
            self.saved.rate = Some(video.playback_rate());
        }

        video.set_muted(true);
        if let Err(e) = video.set_playback_rate(self.settings.fast_rate) {
            warn!("Could not fast-forward ad: {}", e);
        }

        let click = self.scheduler.every(self.settings.skip_interval(), Tick::ClickSkip);
        let recheck = self.scheduler.every(self.settings.recheck_interval(), Tick::Recheck);
        self.timers = Some(MitigationTimers { click, recheck });

        debug!("Ad detected, skipping (saved {:?})", self.saved);
        Transition::Entered
    }

    fn exit<P: PlayerSurface>(&mut self, surface: &P) -> Transition {
        if self.phase == Phase::Idle {
            return Transition::Unchanged;
        }

        self.cancel_timers();

        if let Some(video) = surface.video() {
            let rate = self.saved.rate.unwrap_or(self.settings.fallback_rate);
            if let Err(e) = video.set_playback_rate(rate) {
                warn!("Could not restore playback rate: {}", e);
            }
            video.set_muted(self.saved.muted.unwrap_or(false));
        }

        self.saved = SavedPlayback::default();
        self.phase = Phase::Idle;
        debug!("Ad finished, playback restored");
        Transition::Exited
    }

    fn cancel_timers(&mut self) {
        if let Some(timers) = self.timers.take() {
            self.scheduler.cancel(timers.click);
            self.scheduler.cancel(timers.recheck);
        }
    }
}

impl<S: Scheduler> Drop for AdSkipAgent<S> {
    fn drop(&mut self) {
        self.cancel_timers();
    }
}
