//! Content-script agent wired to the page DOM
//!
//! The page state lives in one `Rc<RefCell<..>>`. Timer and observer
//! callbacks hold only a `Weak` to it, so dropping the [`ContentAgent`]
//! releases everything and the callbacks become no-ops.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Duration;

use gloo_timers::callback::Interval;
use log::{debug, info, warn};
use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlElement, HtmlVideoElement, MutationObserver, MutationObserverInit};

use cs_core::agent::{
    cosmetic_stylesheet, AdSkipAgent, Observation, PlayerError, PlayerSurface, Scheduler, Tick, TwoPhaseWatcher,
    VideoElement, STYLE_ELEMENT_ID,
};
use cs_core::settings::AgentSettings;

// =============================================================================
// Player Surface
// =============================================================================

/// The main video element.
pub struct DomVideo(HtmlVideoElement);

impl VideoElement for DomVideo {
    fn muted(&self) -> bool {
        self.0.muted()
    }

    fn set_muted(&self, muted: bool) {
        self.0.set_muted(muted);
    }

    fn playback_rate(&self) -> f64 {
        self.0.playback_rate()
    }

    fn set_playback_rate(&self, rate: f64) -> Result<(), PlayerError> {
        if !self.0.is_connected() {
            return Err(PlayerError::Detached);
        }
        // The setter throws for rates the media element cannot play
        js_sys::Reflect::set(&self.0, &JsValue::from_str("playbackRate"), &JsValue::from_f64(rate))
            .map_err(|_| PlayerError::RateRejected(rate))?;
        // Players clamp or ignore rates they do not support
        if (self.0.playback_rate() - rate).abs() > f64::EPSILON {
            return Err(PlayerError::RateRejected(rate));
        }
        Ok(())
    }
}

/// Player lookups against the live document.
pub struct DomPlayer {
    document: Document,
    settings: AgentSettings,
}

impl DomPlayer {
    fn root(&self) -> Option<Element> {
        self.document.query_selector(&self.settings.root_selector).ok().flatten()
    }
}

impl PlayerSurface for DomPlayer {
    type Video = DomVideo;

    fn video(&self) -> Option<DomVideo> {
        self.document
            .query_selector(&self.settings.video_selector)
            .ok()
            .flatten()
            .and_then(|el| el.dyn_into::<HtmlVideoElement>().ok())
            .map(DomVideo)
    }

    fn ad_showing(&self) -> bool {
        self.root()
            .map(|root| root.class_list().contains(&self.settings.ad_class))
            .unwrap_or(false)
    }

    fn click_skip(&self) -> bool {
        for selector in &self.settings.skip_selectors {
            let found = self.document.query_selector(selector).ok().flatten();
            if let Some(button) = found.and_then(|el| el.dyn_into::<HtmlElement>().ok()) {
                button.click();
                return true;
            }
        }
        false
    }
}

// =============================================================================
// Timers
// =============================================================================

/// Schedules agent ticks on browser intervals. Dropping the handle clears the
/// interval.
pub struct IntervalScheduler {
    page: Weak<RefCell<PageState>>,
}

impl Scheduler for IntervalScheduler {
    type Handle = Interval;

    fn every(&mut self, period: Duration, tick: Tick) -> Interval {
        let page = self.page.clone();
        let millis = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);
        Interval::new(millis, move || PageState::on_tick(&page, tick))
    }

    fn cancel(&mut self, handle: Interval) {
        drop(handle);
    }
}

// =============================================================================
// Observers
// =============================================================================

/// A connected mutation observer and the callback it calls.
pub struct DomObservation {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut()>,
}

impl DomObservation {
    fn connect(
        target: &Element,
        options: &MutationObserverInit,
        callback: impl FnMut() + 'static,
    ) -> Result<Self, JsValue> {
        let callback = Closure::<dyn FnMut()>::new(callback);
        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())?;
        observer.observe_with_options(target, options)?;
        Ok(Self {
            observer,
            _callback: callback,
        })
    }

    /// Wait for the player root to appear anywhere under `document_element`.
    fn existence(document_element: &Element, page: Weak<RefCell<PageState>>) -> Result<Self, JsValue> {
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_subtree(true);
        Self::connect(document_element, &options, move || PageState::on_tree_changed(&page))
    }

    /// Watch the root's class attribute.
    fn indicator(root: &Element, page: Weak<RefCell<PageState>>) -> Result<Self, JsValue> {
        let options = MutationObserverInit::new();
        options.set_attributes(true);
        options.set_attribute_filter(&js_sys::Array::of1(&JsValue::from_str("class")));
        Self::connect(root, &options, move || PageState::on_indicator_changed(&page))
    }
}

impl Observation for DomObservation {
    fn disconnect(&mut self) {
        self.observer.disconnect();
    }
}

// =============================================================================
// Page State
// =============================================================================

type Watcher = TwoPhaseWatcher<DomObservation, DomObservation>;

struct PageState {
    agent: AdSkipAgent<IntervalScheduler>,
    player: DomPlayer,
    watcher: Option<Watcher>,
    this: Weak<RefCell<PageState>>,
}

impl PageState {
    fn sample(&mut self) {
        let showing = self.player.ad_showing();
        self.agent.observe(&self.player, showing);
    }

    fn attach(&mut self, root: &Element) -> Result<(), JsValue> {
        let observer = DomObservation::indicator(root, self.this.clone())?;
        match self.watcher.as_mut() {
            Some(watcher) => {
                watcher.attach(observer);
            }
            None => self.watcher = Some(TwoPhaseWatcher::attached(observer)),
        }
        debug!("Watching player root");
        // The ad may already be on screen
        self.sample();
        Ok(())
    }

    fn with_page(page: &Weak<RefCell<PageState>>, f: impl FnOnce(&mut PageState)) {
        if let Some(cell) = page.upgrade() {
            if let Ok(mut state) = cell.try_borrow_mut() {
                f(&mut *state);
            }
        }
    }

    fn on_tick(page: &Weak<RefCell<PageState>>, tick: Tick) {
        Self::with_page(page, |state| {
            state.agent.on_tick(&state.player, tick);
        });
    }

    fn on_indicator_changed(page: &Weak<RefCell<PageState>>) {
        Self::with_page(page, PageState::sample);
    }

    fn on_tree_changed(page: &Weak<RefCell<PageState>>) {
        Self::with_page(page, |state| {
            if !state.watcher.as_ref().is_some_and(Watcher::is_waiting) {
                return;
            }
            if let Some(root) = state.player.root() {
                if let Err(e) = state.attach(&root) {
                    warn!("Failed to observe player root: {:?}", e);
                }
            }
        });
    }

    fn teardown(&mut self) {
        if let Some(mut watcher) = self.watcher.take() {
            watcher.teardown();
        }
        self.agent.teardown();
    }
}

/// Insert the overlay-hiding stylesheet unless it is already on the page.
fn inject_cosmetics(document: &Document, settings: &AgentSettings) -> Result<(), JsValue> {
    if document.get_element_by_id(STYLE_ELEMENT_ID).is_some() {
        return Ok(());
    }
    let css = cosmetic_stylesheet(&settings.hidden_selectors);
    if css.is_empty() {
        return Ok(());
    }
    let style = document.create_element("style")?;
    style.set_id(STYLE_ELEMENT_ID);
    style.set_text_content(Some(&css));
    let parent = document
        .document_element()
        .ok_or_else(|| JsValue::from_str("Document has no root element"))?;
    parent.append_child(&style)?;
    Ok(())
}

// =============================================================================
// Entry Point
// =============================================================================

/// The running ad-skip agent for one page.
#[wasm_bindgen]
pub struct ContentAgent {
    page: Rc<RefCell<PageState>>,
}

#[wasm_bindgen]
impl ContentAgent {
    /// Stop watching and cancel any running timers. The player is left as
    /// it is.
    pub fn stop(&self) {
        if let Ok(mut state) = self.page.try_borrow_mut() {
            state.teardown();
        }
    }

    #[wasm_bindgen(js_name = isSkipping)]
    pub fn is_skipping(&self) -> bool {
        self.page
            .try_borrow()
            .map(|state| state.agent.phase() == cs_core::Phase::Skipping)
            .unwrap_or(false)
    }
}

/// Start the agent on the current page. Returns None on unsupported hosts.
pub fn start(settings: AgentSettings) -> Result<Option<ContentAgent>, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("No window"))?;
    let host = window.location().hostname()?;
    if !settings.is_supported_host(&host) {
        debug!("Agent not started on {}", host);
        return Ok(None);
    }

    let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
    inject_cosmetics(&document, &settings)?;

    let page = Rc::new_cyclic(|this: &Weak<RefCell<PageState>>| {
        RefCell::new(PageState {
            agent: AdSkipAgent::new(settings.clone(), IntervalScheduler { page: this.clone() }),
            player: DomPlayer {
                document: document.clone(),
                settings,
            },
            watcher: None,
            this: this.clone(),
        })
    });

    {
        let mut state = page.borrow_mut();
        match state.player.root() {
            Some(root) => state.attach(&root)?,
            None => {
                let document_element = document
                    .document_element()
                    .ok_or_else(|| JsValue::from_str("Document has no root element"))?;
                let existence = DomObservation::existence(&document_element, Rc::downgrade(&page))?;
                state.watcher = Some(TwoPhaseWatcher::waiting(existence));
                debug!("Waiting for player root");
            }
        }
    }

    info!("Ad-skip agent started on {}", host);
    Ok(Some(ContentAgent { page }))
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use wasm_bindgen_test::*;

    use super::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn attached_video() -> DomVideo {
        let document = web_sys::window().and_then(|w| w.document()).unwrap();
        let video: HtmlVideoElement = document.create_element("video").unwrap().dyn_into().unwrap();
        document.body().unwrap().append_child(&video).unwrap();
        DomVideo(video)
    }

    #[wasm_bindgen_test]
    fn unplayable_rate_is_an_error() {
        let video = attached_video();
        assert!(video.set_playback_rate(2.0).is_ok());
        assert_eq!(video.set_playback_rate(-1.0), Err(PlayerError::RateRejected(-1.0)));
        assert_eq!(video.playback_rate(), 2.0);
    }

    #[wasm_bindgen_test]
    fn detached_video_is_an_error() {
        let document = web_sys::window().and_then(|w| w.document()).unwrap();
        let video: HtmlVideoElement = document.create_element("video").unwrap().dyn_into().unwrap();
        assert_eq!(DomVideo(video).set_playback_rate(2.0), Err(PlayerError::Detached));
    }
}
