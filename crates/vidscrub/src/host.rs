//! Capabilities the page core needs from its host environment.
//!
//! Nothing in the core touches a document, a network stack or a real media
//! decoder directly. The host hands a [`Host`] bundle to the page at load and
//! reports what happens through the event queue (see [`crate::events`]).

use std::time::Duration;

use crate::error::SeekError;
use crate::events::EventSender;

/// The single scrubbed media element.
pub trait MediaElement {
    /// Currently assigned source URL.
    fn source(&self) -> String;
    /// Replace the source. Playback position is host-defined afterwards.
    fn set_source(&mut self, src: &str);
    /// Duration in seconds, `None` until metadata has loaded.
    fn duration(&self) -> Option<f64>;
    fn current_time(&self) -> f64;
    /// Scripted seek. May fail synchronously when the element is not seekable.
    fn seek(&mut self, position: f64) -> Result<(), SeekError>;
    fn play(&mut self);
    fn pause(&mut self);
}

/// Measured page geometry, in scroll distance units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub viewport_height: f64,
    /// Document offset of the pinned scrub wrapper's top edge.
    pub pin_wrapper_top: f64,
    /// Document offset of the intro content region's top edge.
    pub intro_top: f64,
    pub intro_height: f64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            viewport_height: 800.0,
            pin_wrapper_top: 0.0,
            intro_top: 0.0,
            intro_height: 800.0,
        }
    }
}

/// Style and structure control over the document.
pub trait PageSurface {
    /// Create the blocking overlay showing `text`, marked busy.
    fn mount_overlay(&mut self, text: &str);
    fn set_overlay_opacity(&mut self, opacity: f32);
    fn remove_overlay(&mut self);
    fn set_scroll_locked(&mut self, locked: bool);
    /// Scale and alpha of the intro content region.
    fn set_intro_style(&mut self, scale: f64, alpha: f64);
    fn layout(&self) -> PageLayout;
}

/// Continuous-scroll smoothing engine. Its smoothing is its own business;
/// the page only ticks it once per animation frame.
pub trait ScrollEngine {
    /// Advance one frame. Returns the scroll offset when it moved.
    fn tick(&mut self, now: Duration) -> Option<f64>;
}

/// Pin/trigger description handed to the scroll-linked animation engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinTrigger {
    /// Scroll offset at which the wrapper's top meets the viewport top.
    pub start: f64,
    /// Scroll offset at which the pin releases.
    pub end: f64,
    /// Drive the animation directly from scroll position.
    pub scrub: bool,
    /// Hold the wrapper fixed between `start` and `end`.
    pub pin: bool,
    /// Recompute `start`/`end` on every refresh.
    pub invalidate_on_refresh: bool,
}

/// Scroll-linked animation engine.
pub trait ScrollLinkage {
    /// Install or replace the scrub pin.
    fn pin(&mut self, trigger: PinTrigger);
    /// Scroll position hook fed by the smoothing engine.
    fn update(&mut self, offset: f64);
    /// Recompute trigger geometry.
    fn refresh(&mut self);
}

/// Byte fetching and local resource handles.
pub trait Network {
    /// Start fetching `url`. The outcome is posted to `reply` as
    /// [`crate::events::PageEvent::FetchSettled`].
    fn begin_fetch(&mut self, url: &str, reply: EventSender);
    /// Wrap fetched bytes in a locally addressable source URL.
    fn create_object_url(&mut self, bytes: &[u8]) -> String;
}

/// Everything the page core is given by its host.
pub struct Host {
    pub surface: Box<dyn PageSurface>,
    /// `None` when the page has no media element.
    pub media: Option<Box<dyn MediaElement>>,
    pub scroll: Box<dyn ScrollEngine>,
    pub linkage: Box<dyn ScrollLinkage>,
    /// `None` when the host cannot fetch.
    pub network: Option<Box<dyn Network>>,
}
