use crossbeam_channel::{Receiver, Sender};

use crate::error::FetchError;

/// Something the host reports to the page between handler runs.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// The media element knows its duration.
    MetadataLoaded,
    /// A scripted seek on the media element finished.
    Seeked,
    /// The media element can start playing its current source.
    CanPlay,
    /// A user touch anywhere in the document.
    TouchStart,
    /// Viewport or layout changed; geometry must be recomputed.
    Resize,
    /// A fetch started with `Network::begin_fetch` settled.
    FetchSettled(Result<Vec<u8>, FetchError>),
}

impl PageEvent {
    /// The one-shot signal this event delivers, if any.
    pub fn signal(&self) -> Option<Signal> {
        match self {
            PageEvent::MetadataLoaded => Some(Signal::LoadedMetadata),
            PageEvent::Seeked => Some(Signal::Seeked),
            PageEvent::CanPlay => Some(Signal::CanPlay),
            PageEvent::TouchStart => Some(Signal::TouchStart),
            PageEvent::Resize | PageEvent::FetchSettled(_) => None,
        }
    }
}

/// Signals that listeners subscribe to one-shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    LoadedMetadata,
    Seeked,
    CanPlay,
    TouchStart,
}

/// Reactions the page runs when a subscribed signal is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    /// Read the media descriptor, arm the scroll binder, satisfy metadata.
    ArmTimeline,
    /// Play-then-pause to satisfy gesture-gated autoplay.
    Unlock,
    /// The swapped resource finished its position-restoring seek.
    SwapSeeked,
    /// Fallback confirmation when the seek could not be issued.
    SwapPlayable,
}

/// Cloneable handle the host uses to post events into the page loop.
pub type EventSender = Sender<PageEvent>;

/// Unbounded FIFO between host callbacks and the page loop.
pub struct EventQueue {
    tx: Sender<PageEvent>,
    rx: Receiver<PageEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        self.tx.clone()
    }

    /// Next queued event without blocking.
    pub fn try_next(&self) -> Option<PageEvent> {
        self.rx.try_recv().ok()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}
