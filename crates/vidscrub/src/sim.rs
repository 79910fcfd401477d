//! In-memory host: a scripted document, media element, scroll engines and
//! network, all sharing one inspectable [`SimState`].
//!
//! Used by the `vidscrub` binary to replay page lifecycles, and by tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::config::ScrubConfig;
use crate::error::{FetchError, SeekError};
use crate::events::{EventQueue, EventSender, PageEvent};
use crate::host::{
    Host, MediaElement, Network, PageLayout, PageSurface, PinTrigger, ScrollEngine, ScrollLinkage,
};
use crate::page::ScrubPage;

/// What the simulated network answers to a fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPlan {
    Succeed(Vec<u8>),
    Fail(FetchError),
    /// Never settles.
    Hang,
}

/// Starting conditions of a simulated page.
#[derive(Debug, Clone)]
pub struct SimOptions {
    pub has_media: bool,
    pub has_network: bool,
    pub source: String,
    pub duration: f64,
    /// Metadata is already available at page load.
    pub metadata_preloaded: bool,
    pub seek_supported: bool,
    pub fetch: FetchPlan,
    pub layout: PageLayout,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            has_media: true,
            has_network: true,
            source: "https://media.example/hero.mp4".to_string(),
            duration: 10.0,
            metadata_preloaded: false,
            seek_supported: true,
            fetch: FetchPlan::Succeed(vec![0; 4096]),
            layout: PageLayout::default(),
        }
    }
}

/// Everything observable about the simulated host.
#[derive(Debug)]
pub struct SimState {
    // media element
    pub source: String,
    pub duration: f64,
    pub metadata_loaded: bool,
    pub current_time: f64,
    pub seek_supported: bool,
    pub seeks: Vec<f64>,
    pub sources_assigned: Vec<String>,
    pub plays: u32,
    pub pauses: u32,
    // document surface
    pub overlay_text: Option<String>,
    pub overlay_opacity: f32,
    pub overlay_removed: bool,
    pub scroll_locked: bool,
    pub intro_style: (f64, f64),
    pub layout: PageLayout,
    // scroll engines
    pub scroll_target: f64,
    pub scroll_emitted: Option<f64>,
    pub pins: Vec<PinTrigger>,
    pub refreshes: u32,
    pub linkage_offset: Option<f64>,
    // network
    pub fetch: FetchPlan,
    pub fetched: Vec<String>,
    pub object_urls: u32,
    /// Every event the host posted, in order.
    pub posted: Vec<PageEvent>,
}

impl SimState {
    fn new(options: &SimOptions) -> Self {
        Self {
            source: options.source.clone(),
            duration: options.duration,
            metadata_loaded: options.metadata_preloaded,
            current_time: 0.0,
            seek_supported: options.seek_supported,
            seeks: Vec::new(),
            sources_assigned: Vec::new(),
            plays: 0,
            pauses: 0,
            overlay_text: None,
            overlay_opacity: 0.0,
            overlay_removed: false,
            scroll_locked: false,
            intro_style: (1.0, 1.0),
            layout: options.layout,
            scroll_target: 0.0,
            scroll_emitted: None,
            pins: Vec::new(),
            refreshes: 0,
            linkage_offset: None,
            fetch: options.fetch.clone(),
            fetched: Vec::new(),
            object_urls: 0,
            posted: Vec::new(),
        }
    }
}

pub type SimHandle = Rc<RefCell<SimState>>;

fn post(state: &SimHandle, tx: &EventSender, event: PageEvent) {
    state.borrow_mut().posted.push(event.clone());
    let _ = tx.send(event);
}

struct SimMedia {
    state: SimHandle,
    tx: EventSender,
}

impl MediaElement for SimMedia {
    fn source(&self) -> String {
        self.state.borrow().source.clone()
    }

    fn set_source(&mut self, src: &str) {
        {
            let mut s = self.state.borrow_mut();
            s.source = src.to_string();
            s.sources_assigned.push(src.to_string());
            s.current_time = 0.0;
        }
        post(&self.state, &self.tx, PageEvent::CanPlay);
    }

    fn duration(&self) -> Option<f64> {
        let s = self.state.borrow();
        s.metadata_loaded.then_some(s.duration)
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().current_time
    }

    fn seek(&mut self, position: f64) -> Result<(), SeekError> {
        {
            let mut s = self.state.borrow_mut();
            if !s.seek_supported {
                return Err(SeekError::Unsupported);
            }
            s.current_time = position.clamp(0.0, s.duration);
            s.seeks.push(position);
        }
        post(&self.state, &self.tx, PageEvent::Seeked);
        Ok(())
    }

    fn play(&mut self) {
        self.state.borrow_mut().plays += 1;
    }

    fn pause(&mut self) {
        self.state.borrow_mut().pauses += 1;
    }
}

struct SimSurface {
    state: SimHandle,
}

impl PageSurface for SimSurface {
    fn mount_overlay(&mut self, text: &str) {
        self.state.borrow_mut().overlay_text = Some(text.to_string());
    }

    fn set_overlay_opacity(&mut self, opacity: f32) {
        self.state.borrow_mut().overlay_opacity = opacity;
    }

    fn remove_overlay(&mut self) {
        self.state.borrow_mut().overlay_removed = true;
    }

    fn set_scroll_locked(&mut self, locked: bool) {
        self.state.borrow_mut().scroll_locked = locked;
    }

    fn set_intro_style(&mut self, scale: f64, alpha: f64) {
        self.state.borrow_mut().intro_style = (scale, alpha);
    }

    fn layout(&self) -> PageLayout {
        self.state.borrow().layout
    }
}

/// Emits the target offset directly; a locked page does not scroll.
struct SimScroll {
    state: SimHandle,
}

impl ScrollEngine for SimScroll {
    fn tick(&mut self, _now: Duration) -> Option<f64> {
        let mut s = self.state.borrow_mut();
        if s.scroll_locked {
            return None;
        }
        let target = s.scroll_target;
        if s.scroll_emitted == Some(target) {
            return None;
        }
        s.scroll_emitted = Some(target);
        Some(target)
    }
}

struct SimLinkage {
    state: SimHandle,
}

impl ScrollLinkage for SimLinkage {
    fn pin(&mut self, trigger: PinTrigger) {
        self.state.borrow_mut().pins.push(trigger);
    }

    fn update(&mut self, offset: f64) {
        self.state.borrow_mut().linkage_offset = Some(offset);
    }

    fn refresh(&mut self) {
        self.state.borrow_mut().refreshes += 1;
    }
}

struct SimNetwork {
    state: SimHandle,
}

impl Network for SimNetwork {
    fn begin_fetch(&mut self, url: &str, reply: EventSender) {
        let plan = {
            let mut s = self.state.borrow_mut();
            s.fetched.push(url.to_string());
            s.fetch.clone()
        };
        let result = match plan {
            FetchPlan::Succeed(bytes) => Ok(bytes),
            FetchPlan::Fail(e) => Err(e),
            FetchPlan::Hang => return,
        };
        post(&self.state, &reply, PageEvent::FetchSettled(result));
    }

    fn create_object_url(&mut self, bytes: &[u8]) -> String {
        let mut s = self.state.borrow_mut();
        s.object_urls += 1;
        format!("blob:vidscrub/{}-{}", s.object_urls, bytes.len())
    }
}

/// Build a host over fresh shared state, plus the queue its callbacks post to.
pub fn build_host(options: &SimOptions) -> (Host, SimHandle, EventQueue) {
    let state: SimHandle = Rc::new(RefCell::new(SimState::new(options)));
    let events = EventQueue::new();

    let media: Option<Box<dyn MediaElement>> = options.has_media.then(|| {
        Box::new(SimMedia {
            state: state.clone(),
            tx: events.sender(),
        }) as Box<dyn MediaElement>
    });
    let network: Option<Box<dyn Network>> = options
        .has_network
        .then(|| Box::new(SimNetwork { state: state.clone() }) as Box<dyn Network>);

    let host = Host {
        surface: Box::new(SimSurface { state: state.clone() }),
        media,
        scroll: Box::new(SimScroll { state: state.clone() }),
        linkage: Box::new(SimLinkage { state: state.clone() }),
        network,
    };
    (host, state, events)
}

/// A scripted user or host action.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// The media element finishes loading metadata.
    LoadMetadata,
    Touch,
    /// The user scrolls to an offset (ignored while the page is locked).
    ScrollTo(f64),
    /// The viewport changes to a new layout.
    Resize(PageLayout),
}

/// A page plus its simulated host, driven on a fixed frame clock.
pub struct Simulation {
    pub page: ScrubPage,
    pub state: SimHandle,
    tx: EventSender,
    script: Vec<(Duration, Step)>,
    frame_interval: Duration,
    clock: Duration,
}

impl Simulation {
    pub fn new(options: &SimOptions, config: ScrubConfig) -> Self {
        let (host, state, events) = build_host(options);
        let tx = events.sender();
        let page = ScrubPage::load(host, config, events);
        Self {
            page,
            state,
            tx,
            script: Vec::new(),
            frame_interval: Duration::from_millis(16),
            clock: Duration::ZERO,
        }
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Queue `step` to happen at page time `at`.
    pub fn at(&mut self, at: Duration, step: Step) -> &mut Self {
        self.script.push((at, step));
        self.script.sort_by_key(|(t, _)| *t);
        self
    }

    /// Run frames until page time `end`, applying scripted steps as they fall due.
    pub fn run_until(&mut self, end: Duration) {
        while self.clock < end {
            self.clock = (self.clock + self.frame_interval).min(end);
            // Timers due by now fire before the host reports what happened at now.
            self.page.advance_to(self.clock);
            self.apply_due_steps();
            self.page.frame(self.clock);
        }
    }

    fn apply_due_steps(&mut self) {
        let due = self
            .script
            .iter()
            .take_while(|(t, _)| *t <= self.clock)
            .count();
        let steps: Vec<Step> = self.script.drain(..due).map(|(_, s)| s).collect();
        for step in steps {
            self.apply(step);
        }
    }

    fn apply(&mut self, step: Step) {
        log::debug!("[{}ms] {step:?}", self.clock.as_millis());
        match step {
            Step::LoadMetadata => {
                self.state.borrow_mut().metadata_loaded = true;
                post(&self.state, &self.tx, PageEvent::MetadataLoaded);
            }
            Step::Touch => post(&self.state, &self.tx, PageEvent::TouchStart),
            Step::ScrollTo(offset) => {
                let mut s = self.state.borrow_mut();
                if s.scroll_locked {
                    log::debug!("Scroll to {offset} ignored, page locked");
                } else {
                    s.scroll_target = offset;
                }
            }
            Step::Resize(layout) => {
                self.state.borrow_mut().layout = layout;
                post(&self.state, &self.tx, PageEvent::Resize);
            }
        }
    }
}
