//! Transport swap: replace the media element's remote source with a locally
//! buffered copy so scrubbing seeks stay reliable, keeping the playback
//! position where it was.
//!
//! The swap is a step-driven state machine. Each asynchronous step (deferral
//! timer, fetch, seek confirmation) is fed back in by the page as a discrete
//! result:
//!
//! ```text
//! NotStarted --deferral--> Fetching --Ok(bytes)--> Swapped --Seeked|CanPlay--> confirmed
//!                                   \--Err-------> Failed (confirmed at once)
//! ```
//!
//! Every path ends in a [`SwapOutcome`], which marks transport readiness.

use std::time::Duration;

use crate::error::{FetchError, SeekError};
use crate::events::{EventSender, Listener, Signal};
use crate::host::{MediaElement, Network};
use crate::runtime::{OnceRegistry, Scheduler, TimerId, TimerKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapState {
    NotStarted,
    Fetching,
    Swapped,
    Failed,
}

/// How the swap settled. Every variant means transport is ready.
#[derive(Debug, Clone, PartialEq)]
pub enum SwapOutcome {
    /// Source replaced and the restoring seek completed.
    Swapped { resumed_at: f64 },
    /// Source replaced, but the seek could not be issued; confirmed by the
    /// element becoming playable instead.
    SeekFallback,
    /// Fetch failed; the original source stays authoritative.
    NetworkFailure(FetchError),
}

/// What the page must do after feeding a fetch result in.
#[derive(Debug, Clone, PartialEq)]
pub enum SwapProgress {
    /// The swap settled right away.
    Settled(SwapOutcome),
    /// Source replaced; waiting on the given one-shot signal.
    AwaitingConfirmation(Signal),
    /// The result was not expected in the current state.
    Ignored,
}

#[derive(Debug)]
pub struct MediaResourceSwapper {
    state: SwapState,
    deferral: Duration,
    epsilon: f64,
    timer: Option<TimerId>,
    /// Position captured just before the source was replaced.
    captured_at: Option<f64>,
    outcome: Option<SwapOutcome>,
}

impl MediaResourceSwapper {
    pub fn new(deferral: Duration, epsilon: f64) -> Self {
        Self {
            state: SwapState::NotStarted,
            deferral,
            epsilon,
            timer: None,
            captured_at: None,
            outcome: None,
        }
    }

    /// Schedule the deferred fetch. Only the first call schedules.
    pub fn schedule(&mut self, scheduler: &mut Scheduler, now: Duration) -> bool {
        if self.state != SwapState::NotStarted || self.timer.is_some() {
            return false;
        }
        self.timer = Some(scheduler.schedule(now + self.deferral, TimerKind::SwapDeferral));
        true
    }

    /// Deferral timer `id` fired: start fetching `source`.
    pub fn on_deferral_elapsed(
        &mut self,
        id: TimerId,
        source: &str,
        network: &mut dyn Network,
        reply: EventSender,
    ) -> bool {
        if self.timer != Some(id) || self.state != SwapState::NotStarted {
            return false;
        }
        self.timer = None;
        self.state = SwapState::Fetching;
        log::debug!("Fetching {source} for local buffering");
        network.begin_fetch(source, reply);
        true
    }

    /// Feed the fetch result. On success the element's source is replaced and
    /// a position-restoring seek to `t + epsilon` is issued; the confirmation
    /// listener is attached to `subscriptions`.
    pub fn on_fetch_settled(
        &mut self,
        result: Result<Vec<u8>, FetchError>,
        media: &mut dyn MediaElement,
        network: &mut dyn Network,
        subscriptions: &mut OnceRegistry<Signal, Listener>,
    ) -> SwapProgress {
        if self.state != SwapState::Fetching {
            return SwapProgress::Ignored;
        }

        let bytes = match result {
            Ok(bytes) if bytes.is_empty() => {
                return self.fail(FetchError::Rejected("empty response body".into()));
            }
            Ok(bytes) => bytes,
            Err(e) => return self.fail(e),
        };

        let handle = network.create_object_url(&bytes);
        let t = media.current_time();
        self.captured_at = Some(t);

        subscriptions.once(Signal::Seeked, Listener::SwapSeeked);
        media.set_source(&handle);
        self.state = SwapState::Swapped;

        match media.seek((t + self.epsilon).max(0.0)) {
            Ok(()) => {
                log::debug!("Swapped to local source, restoring position {t:.3}s");
                SwapProgress::AwaitingConfirmation(Signal::Seeked)
            }
            Err(SeekError::Unsupported) => {
                log::warn!("Seek unsupported after swap; waiting for playable signal");
                subscriptions.once(Signal::CanPlay, Listener::SwapPlayable);
                SwapProgress::AwaitingConfirmation(Signal::CanPlay)
            }
        }
    }

    /// A confirmation listener was delivered. Returns the outcome the first
    /// time only; the losing confirmation of a seek/playable race is a no-op.
    pub fn on_confirmation(
        &mut self,
        listener: Listener,
        media: &dyn MediaElement,
    ) -> Option<SwapOutcome> {
        if self.state != SwapState::Swapped || self.outcome.is_some() {
            return None;
        }
        let outcome = match listener {
            Listener::SwapSeeked => SwapOutcome::Swapped {
                resumed_at: media.current_time(),
            },
            Listener::SwapPlayable => SwapOutcome::SeekFallback,
            Listener::ArmTimeline | Listener::Unlock => return None,
        };
        log::info!("Media transport swap settled: {outcome:?}");
        self.outcome = Some(outcome.clone());
        Some(outcome)
    }

    fn fail(&mut self, error: FetchError) -> SwapProgress {
        log::warn!("Media swap fetch failed, keeping original source: {error}");
        self.state = SwapState::Failed;
        let outcome = SwapOutcome::NetworkFailure(error);
        self.outcome = Some(outcome.clone());
        SwapProgress::Settled(outcome)
    }

    pub fn state(&self) -> SwapState {
        self.state
    }

    pub fn outcome(&self) -> Option<&SwapOutcome> {
        self.outcome.as_ref()
    }

    pub fn captured_at(&self) -> Option<f64> {
        self.captured_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventQueue;

    struct Media {
        src: String,
        time: f64,
        seekable: bool,
    }

    impl Media {
        fn at(time: f64) -> Self {
            Self {
                src: "https://cdn.example/clip.mp4".into(),
                time,
                seekable: true,
            }
        }
    }

    impl MediaElement for Media {
        fn source(&self) -> String {
            self.src.clone()
        }
        fn set_source(&mut self, src: &str) {
            self.src = src.to_string();
            self.time = 0.0;
        }
        fn duration(&self) -> Option<f64> {
            Some(10.0)
        }
        fn current_time(&self) -> f64 {
            self.time
        }
        fn seek(&mut self, position: f64) -> Result<(), SeekError> {
            if !self.seekable {
                return Err(SeekError::Unsupported);
            }
            self.time = position;
            Ok(())
        }
        fn play(&mut self) {}
        fn pause(&mut self) {}
    }

    #[derive(Default)]
    struct Net {
        fetched: Vec<String>,
    }

    impl Network for Net {
        fn begin_fetch(&mut self, url: &str, _reply: EventSender) {
            self.fetched.push(url.to_string());
        }
        fn create_object_url(&mut self, bytes: &[u8]) -> String {
            format!("blob:local/{}", bytes.len())
        }
    }

    fn fetching(media: &Media) -> (MediaResourceSwapper, Net, EventQueue) {
        let mut scheduler = Scheduler::new();
        let mut swapper = MediaResourceSwapper::new(Duration::from_millis(1000), 0.01);
        let mut net = Net::default();
        let queue = EventQueue::new();
        assert!(swapper.schedule(&mut scheduler, Duration::from_millis(200)));
        assert!(scheduler.pop_due(Duration::from_millis(1199)).is_none());
        let (id, kind) = scheduler.pop_due(Duration::from_millis(1200)).unwrap();
        assert_eq!(kind, TimerKind::SwapDeferral);
        assert!(swapper.on_deferral_elapsed(id, &media.source(), &mut net, queue.sender()));
        assert_eq!(swapper.state(), SwapState::Fetching);
        (swapper, net, queue)
    }

    #[test]
    fn schedules_only_once() {
        let mut scheduler = Scheduler::new();
        let mut swapper = MediaResourceSwapper::new(Duration::from_millis(1000), 0.01);
        assert!(swapper.schedule(&mut scheduler, Duration::ZERO));
        assert!(!swapper.schedule(&mut scheduler, Duration::ZERO));
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn successful_swap_restores_position() {
        let mut media = Media::at(4.0);
        let (mut swapper, mut net, _q) = fetching(&media);
        assert_eq!(net.fetched, vec!["https://cdn.example/clip.mp4".to_string()]);
        let mut subs = OnceRegistry::new();

        let progress = swapper.on_fetch_settled(Ok(vec![1; 64]), &mut media, &mut net, &mut subs);
        assert_eq!(progress, SwapProgress::AwaitingConfirmation(Signal::Seeked));
        assert_eq!(swapper.state(), SwapState::Swapped);
        assert_eq!(media.src, "blob:local/64");
        assert!(subs.is_waiting(Signal::Seeked, &Listener::SwapSeeked));

        for listener in subs.deliver(Signal::Seeked) {
            let outcome = swapper.on_confirmation(listener, &media).unwrap();
            let SwapOutcome::Swapped { resumed_at } = outcome else {
                panic!("expected swapped outcome");
            };
            assert!((4.0..=4.0 + 0.01 + 1e-9).contains(&resumed_at));
        }
        assert_eq!(swapper.captured_at(), Some(4.0));
    }

    #[test]
    fn rejected_fetch_keeps_original_source() {
        let mut media = Media::at(2.0);
        let (mut swapper, mut net, _q) = fetching(&media);
        let mut subs = OnceRegistry::new();
        let progress = swapper.on_fetch_settled(
            Err(FetchError::Rejected("offline".into())),
            &mut media,
            &mut net,
            &mut subs,
        );
        assert!(matches!(
            progress,
            SwapProgress::Settled(SwapOutcome::NetworkFailure(FetchError::Rejected(_)))
        ));
        assert_eq!(swapper.state(), SwapState::Failed);
        assert_eq!(media.src, "https://cdn.example/clip.mp4");
        assert!((media.time - 2.0).abs() < 1e-9);
        assert_eq!(subs.waiting_count(Signal::Seeked), 0);
    }

    #[test]
    fn empty_body_counts_as_network_failure() {
        let mut media = Media::at(0.0);
        let (mut swapper, mut net, _q) = fetching(&media);
        let mut subs = OnceRegistry::new();
        let progress = swapper.on_fetch_settled(Ok(Vec::new()), &mut media, &mut net, &mut subs);
        assert!(matches!(progress, SwapProgress::Settled(SwapOutcome::NetworkFailure(_))));
        assert_eq!(media.src, "https://cdn.example/clip.mp4");
    }

    #[test]
    fn unsupported_seek_falls_back_to_playable() {
        let mut media = Media::at(3.0);
        media.seekable = false;
        let (mut swapper, mut net, _q) = fetching(&media);
        let mut subs = OnceRegistry::new();
        let progress = swapper.on_fetch_settled(Ok(vec![0; 8]), &mut media, &mut net, &mut subs);
        assert_eq!(progress, SwapProgress::AwaitingConfirmation(Signal::CanPlay));
        assert!(subs.is_waiting(Signal::CanPlay, &Listener::SwapPlayable));

        let listeners = subs.deliver(Signal::CanPlay);
        assert_eq!(
            swapper.on_confirmation(listeners[0], &media),
            Some(SwapOutcome::SeekFallback)
        );
        // a late seeked after the fallback changes nothing
        assert!(swapper.on_confirmation(Listener::SwapSeeked, &media).is_none());
    }

    #[test]
    fn stale_results_are_ignored() {
        let mut media = Media::at(0.0);
        let mut net = Net::default();
        let mut subs = OnceRegistry::new();
        let mut swapper = MediaResourceSwapper::new(Duration::from_millis(1000), 0.01);
        assert_eq!(
            swapper.on_fetch_settled(Ok(vec![1]), &mut media, &mut net, &mut subs),
            SwapProgress::Ignored
        );
        assert!(swapper.on_confirmation(Listener::SwapSeeked, &media).is_none());
        assert_eq!(swapper.state(), SwapState::NotStarted);
    }
}
