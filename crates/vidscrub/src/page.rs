//! One page lifecycle: overlay, readiness gate, scroll scrubbing and the
//! media transport swap wired to the host's event loop.
//!
//! Execution is single-threaded and cooperative. The host calls
//! [`ScrubPage::frame`] once per animation frame; timers, queued host events
//! and the scroll tick are all processed inside that call, each handler
//! running to completion before the next.

use std::time::Duration;

use crate::config::ScrubConfig;
use crate::error::FetchError;
use crate::events::{EventQueue, EventSender, Listener, PageEvent, Signal};
use crate::gate::{Completion, METADATA, ReadinessGate, ReadinessState, TRANSPORT};
use crate::host::Host;
use crate::intro::IntroFade;
use crate::overlay::{Overlay, OverlayLifecycle};
use crate::runtime::{OnceRegistry, Scheduler, TimerId, TimerKind};
use crate::swap::{MediaResourceSwapper, SwapOutcome, SwapProgress, SwapState};
use crate::timeline::{ScrollBinding, ScrollTimelineBinder};
use crate::unlock::UnlockGuard;

/// What the page knows about its media resource once metadata has loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaResourceDescriptor {
    pub original_source: String,
    pub duration: f64,
    pub current_time: f64,
}

pub struct ScrubPage {
    config: ScrubConfig,
    host: Host,
    now: Duration,
    scheduler: Scheduler,
    subscriptions: OnceRegistry<Signal, Listener>,
    events: EventQueue,
    gate: ReadinessGate,
    overlay: Overlay,
    binder: ScrollTimelineBinder,
    intro: IntroFade,
    swapper: Option<MediaResourceSwapper>,
    unlock: UnlockGuard,
    original_source: Option<String>,
    duration: Option<f64>,
    scroll_offset: f64,
    dismissals: u32,
}

impl ScrubPage {
    /// Page load at time zero: mount the overlay, start the fail-safe and
    /// wire the media pipeline (or skip it when there is no media element).
    pub fn load(mut host: Host, config: ScrubConfig, events: EventQueue) -> Self {
        let now = Duration::ZERO;
        let mut scheduler = Scheduler::new();
        let overlay = Overlay::mount(
            host.surface.as_mut(),
            &config.loader_text,
            config.fade_duration(),
        );
        let gate = ReadinessGate::new(&mut scheduler, now, config.failsafe_timeout());

        let mut page = Self {
            binder: ScrollTimelineBinder::new(config.scroll_ratio),
            intro: IntroFade::new(config.intro_min_scale, config.intro_scrub_lag_secs),
            config,
            host,
            now,
            scheduler,
            subscriptions: OnceRegistry::new(),
            events,
            gate,
            overlay,
            swapper: None,
            unlock: UnlockGuard::new(),
            original_source: None,
            duration: None,
            scroll_offset: 0.0,
            dismissals: 0,
        };
        page.start();
        page
    }

    fn start(&mut self) {
        let layout = self.host.surface.layout();
        self.intro.scroll_to(&layout, self.scroll_offset);

        let Some(media) = self.host.media.as_ref() else {
            log::info!("No media element on page, releasing overlay");
            let completion = self.gate.complete_without_media(&mut self.scheduler);
            self.on_gate_complete(completion);
            self.host.linkage.refresh();
            return;
        };
        let metadata_known = media.duration().is_some();

        self.gate.register_requirement(METADATA);
        if self.config.swap_enabled && self.host.network.is_some() {
            self.gate.register_requirement(TRANSPORT);
            self.swapper = Some(MediaResourceSwapper::new(
                self.config.swap_deferral(),
                self.config.seek_epsilon,
            ));
        } else {
            log::info!("Media swap not attempted; transport ready with original source");
        }

        self.unlock.arm(&mut self.subscriptions);
        self.subscriptions
            .once(Signal::LoadedMetadata, Listener::ArmTimeline);
        self.host.linkage.refresh();

        if metadata_known {
            // Metadata loaded before the listener could be attached.
            self.deliver(Signal::LoadedMetadata);
        }
    }

    /// Cloneable handle for host callbacks.
    pub fn event_sender(&self) -> EventSender {
        self.events.sender()
    }

    /// Post an event to be handled on the next pump.
    pub fn post(&self, event: PageEvent) {
        // The page owns the receiver, so the channel cannot be disconnected.
        let _ = self.events.sender().send(event);
    }

    /// One animation frame at page time `now`.
    pub fn frame(&mut self, now: Duration) {
        self.advance_to(now);

        if let Some(offset) = self.host.scroll.tick(self.now) {
            self.scroll_offset = offset;
            self.host.linkage.update(offset);
            self.apply_scroll();
            let layout = self.host.surface.layout();
            self.intro.scroll_to(&layout, offset);
        }
        self.intro.tick(self.host.surface.as_mut(), self.now);
        self.overlay.update(self.host.surface.as_mut(), self.now);
    }

    /// Fire every timer due by `now` in deadline order, handling queued
    /// events after each one, then move the clock to `now`.
    pub fn advance_to(&mut self, now: Duration) {
        self.pump();
        while let Some(due) = self.scheduler.next_due().filter(|due| *due <= now) {
            self.now = self.now.max(due);
            let Some((id, kind)) = self.scheduler.pop_due(self.now) else {
                break;
            };
            self.on_timer(id, kind);
            self.pump();
        }
        self.now = self.now.max(now);
        self.pump();
    }

    /// Handle every queued event, including ones posted while handling.
    pub fn pump(&mut self) {
        while let Some(event) = self.events.try_next() {
            self.handle(event);
        }
    }

    pub fn handle(&mut self, event: PageEvent) {
        match event {
            PageEvent::Resize => self.recompute_geometry(),
            PageEvent::FetchSettled(result) => self.on_fetch_settled(result),
            other => {
                if let Some(signal) = other.signal() {
                    self.deliver(signal);
                }
            }
        }
    }

    fn deliver(&mut self, signal: Signal) {
        for listener in self.subscriptions.deliver(signal) {
            match listener {
                Listener::ArmTimeline => self.on_metadata(),
                Listener::Unlock => {
                    if let Some(media) = self.host.media.as_mut() {
                        self.unlock.on_touch(media.as_mut());
                    }
                }
                Listener::SwapSeeked | Listener::SwapPlayable => {
                    self.on_swap_confirmation(listener);
                }
            }
        }
    }

    fn on_timer(&mut self, id: TimerId, kind: TimerKind) {
        match kind {
            TimerKind::FailSafe => {
                let completion = self.gate.on_failsafe(id);
                self.on_gate_complete(completion);
            }
            TimerKind::SwapDeferral => {
                let reply = self.events.sender();
                if let (Some(swapper), Some(network), Some(source)) = (
                    self.swapper.as_mut(),
                    self.host.network.as_mut(),
                    self.original_source.as_deref(),
                ) {
                    swapper.on_deferral_elapsed(id, source, network.as_mut(), reply);
                }
            }
            TimerKind::OverlayFade => {
                self.overlay.on_fade_elapsed(self.host.surface.as_mut(), id);
            }
        }
    }

    fn on_metadata(&mut self) {
        let Some(media) = self.host.media.as_ref() else {
            return;
        };
        let duration = media.duration().unwrap_or(f64::NAN);
        self.original_source = Some(media.source());
        self.duration = Some(duration);

        let layout = self.host.surface.layout();
        if self
            .binder
            .arm(duration, &layout, self.host.linkage.as_mut())
            .is_some()
        {
            self.apply_scroll();
        }

        let completion = self.gate.satisfy(METADATA, &mut self.scheduler);
        self.on_gate_complete(completion);

        if let Some(swapper) = self.swapper.as_mut() {
            swapper.schedule(&mut self.scheduler, self.now);
        }
    }

    fn on_fetch_settled(&mut self, result: Result<Vec<u8>, FetchError>) {
        let (Some(swapper), Some(media), Some(network)) = (
            self.swapper.as_mut(),
            self.host.media.as_mut(),
            self.host.network.as_mut(),
        ) else {
            log::debug!("Fetch result with no swap in progress, ignoring");
            return;
        };

        let progress = swapper.on_fetch_settled(
            result,
            media.as_mut(),
            network.as_mut(),
            &mut self.subscriptions,
        );
        match progress {
            SwapProgress::Settled(outcome) => self.on_transport_ready(&outcome),
            SwapProgress::AwaitingConfirmation(_) => {
                self.unlock.arm(&mut self.subscriptions);
            }
            SwapProgress::Ignored => log::debug!("Unexpected fetch result ignored"),
        }
    }

    fn on_swap_confirmation(&mut self, listener: Listener) {
        let (Some(swapper), Some(media)) = (self.swapper.as_mut(), self.host.media.as_ref()) else {
            return;
        };
        let outcome = swapper.on_confirmation(listener, media.as_ref());
        if let Some(outcome) = outcome {
            self.on_transport_ready(&outcome);
        }
    }

    fn on_transport_ready(&mut self, outcome: &SwapOutcome) {
        if !matches!(outcome, SwapOutcome::NetworkFailure(_)) {
            // The new source may have changed element geometry.
            self.recompute_geometry();
        }
        let completion = self.gate.satisfy(TRANSPORT, &mut self.scheduler);
        self.on_gate_complete(completion);
    }

    fn on_gate_complete(&mut self, completion: Option<Completion>) {
        let Some(completion) = completion else {
            return;
        };
        if self
            .overlay
            .dismiss(self.host.surface.as_mut(), &mut self.scheduler, self.now)
        {
            self.dismissals += 1;
            log::debug!("Gate completion {completion:?} dismissed the overlay");
        }
    }

    fn recompute_geometry(&mut self) {
        let layout = self.host.surface.layout();
        if self
            .binder
            .recompute_geometry(&layout, self.host.linkage.as_mut())
            .is_some()
        {
            self.apply_scroll();
        }
        self.intro.scroll_to(&layout, self.scroll_offset);
    }

    fn apply_scroll(&mut self) {
        if let Some(media) = self.host.media.as_mut() {
            self.binder.apply(self.scroll_offset, media.as_mut());
        }
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn overlay_state(&self) -> OverlayLifecycle {
        self.overlay.state()
    }

    pub fn dismissed_at(&self) -> Option<Duration> {
        self.overlay.dismissed_at()
    }

    /// How many times the overlay was dismissed. Never more than one.
    pub fn dismissal_count(&self) -> u32 {
        self.dismissals
    }

    pub fn readiness(&self) -> ReadinessState {
        self.gate.state()
    }

    pub fn completion(&self) -> Option<Completion> {
        self.gate.completion()
    }

    pub fn failsafe_pending(&self) -> bool {
        self.gate.failsafe_pending()
    }

    pub fn swap_state(&self) -> SwapState {
        self.swapper
            .as_ref()
            .map_or(SwapState::NotStarted, MediaResourceSwapper::state)
    }

    pub fn swap_outcome(&self) -> Option<&SwapOutcome> {
        self.swapper.as_ref().and_then(MediaResourceSwapper::outcome)
    }

    pub fn swap_captured_at(&self) -> Option<f64> {
        self.swapper.as_ref().and_then(MediaResourceSwapper::captured_at)
    }

    pub fn binding(&self) -> Option<ScrollBinding> {
        self.binder.binding()
    }

    pub fn geometry_recomputes(&self) -> u32 {
        self.binder.recompute_count()
    }

    pub fn media_descriptor(&self) -> Option<MediaResourceDescriptor> {
        let media = self.host.media.as_ref()?;
        Some(MediaResourceDescriptor {
            original_source: self.original_source.clone()?,
            duration: self.duration?,
            current_time: media.current_time(),
        })
    }

    pub fn scroll_offset(&self) -> f64 {
        self.scroll_offset
    }

    pub fn unlock_count(&self) -> u32 {
        self.unlock.unlock_count()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PageLayout;
    use crate::sim::{FetchPlan, SimOptions, Simulation, Step};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn sim(options: SimOptions) -> Simulation {
        Simulation::new(&options, ScrubConfig::default())
    }

    #[test]
    fn natural_readiness_dismisses_once() {
        let mut s = sim(SimOptions::default());
        s.at(ms(300), Step::LoadMetadata);
        s.run_until(ms(1_200));
        // metadata alone is not enough while the swap is pending
        assert_eq!(s.page.overlay_state(), OverlayLifecycle::Blocking);
        assert!(s.state.borrow().scroll_locked);

        s.run_until(ms(1_400));
        assert_eq!(s.page.completion(), Some(Completion::Natural));
        assert_eq!(s.page.overlay_state(), OverlayLifecycle::Dismissing);
        assert!(!s.state.borrow().scroll_locked);
        assert!(!s.page.failsafe_pending());

        s.run_until(ms(20_000));
        assert_eq!(s.page.dismissal_count(), 1);
        assert_eq!(s.page.overlay_state(), OverlayLifecycle::Removed);
        assert!(s.state.borrow().overlay_removed);
        assert_eq!(s.page.pending_timers(), 0);
    }

    #[test]
    fn swap_is_deferred_after_metadata() {
        let mut s = sim(SimOptions::default());
        s.at(ms(320), Step::LoadMetadata);
        s.run_until(ms(1_312));
        assert!(s.state.borrow().fetched.is_empty());
        assert_eq!(s.page.swap_state(), SwapState::NotStarted);
        s.run_until(ms(1_328));
        assert_eq!(
            s.state.borrow().fetched,
            vec!["https://media.example/hero.mp4".to_string()]
        );
        assert_eq!(s.page.swap_state(), SwapState::Swapped);
    }

    #[test]
    fn metadata_never_loads_failsafe_at_deadline() {
        let mut s = sim(SimOptions::default());
        s.run_until(ms(9_999));
        assert_eq!(s.page.overlay_state(), OverlayLifecycle::Blocking);
        s.run_until(ms(10_016));
        assert_eq!(s.page.dismissed_at(), Some(ms(10_000)));
        assert_eq!(s.page.completion(), Some(Completion::FailSafe));
        assert!(!s.page.readiness().metadata_ready);
        assert!(s.state.borrow().fetched.is_empty());
    }

    #[test]
    fn failsafe_wins_then_natural_completion_is_noop() {
        let options = SimOptions {
            fetch: FetchPlan::Hang,
            ..SimOptions::default()
        };
        let mut s = sim(options);
        s.at(ms(500), Step::LoadMetadata);
        s.run_until(ms(10_500));
        assert_eq!(s.page.completion(), Some(Completion::FailSafe));
        assert_eq!(s.page.dismissal_count(), 1);

        // the hung fetch finally rejects
        let late = Err(FetchError::Rejected("late".into()));
        s.page.post(PageEvent::FetchSettled(late));
        s.run_until(ms(11_000));
        assert!(s.page.readiness().transport_ready);
        assert_eq!(s.page.completion(), Some(Completion::FailSafe));
        assert_eq!(s.page.dismissal_count(), 1);
    }

    #[test]
    fn raced_completion_in_same_instant_dismisses_once() {
        let config = ScrubConfig {
            failsafe_timeout_ms: 1_000,
            swap_enabled: false,
            ..ScrubConfig::default()
        };
        let options = SimOptions::default();
        let mut s = Simulation::new(&options, config).with_frame_interval(ms(1_000));
        s.at(ms(1_000), Step::LoadMetadata);
        s.run_until(ms(3_000));
        assert_eq!(s.page.completion(), Some(Completion::FailSafe));
        assert!(s.page.readiness().metadata_ready);
        assert_eq!(s.page.dismissal_count(), 1);
    }

    #[test]
    fn no_media_dismisses_at_load() {
        let options = SimOptions {
            has_media: false,
            ..SimOptions::default()
        };
        let s = sim(options);
        assert_eq!(s.page.completion(), Some(Completion::NoMedia));
        assert_eq!(s.page.dismissed_at(), Some(Duration::ZERO));
        assert_eq!(s.page.pending_timers(), 1); // only the fade
        let state = s.state.borrow();
        assert!(state.posted.is_empty());
        assert!(state.fetched.is_empty());
        assert!(!state.scroll_locked);
    }

    #[test]
    fn no_network_means_transport_ready() {
        let options = SimOptions {
            has_network: false,
            ..SimOptions::default()
        };
        let mut s = sim(options);
        assert!(s.page.readiness().transport_ready);
        s.at(ms(200), Step::LoadMetadata);
        s.run_until(ms(208));
        assert_eq!(s.page.completion(), Some(Completion::Natural));
        assert_eq!(s.page.dismissed_at(), Some(ms(208)));
    }

    #[test]
    fn preloaded_metadata_arms_immediately() {
        let options = SimOptions {
            metadata_preloaded: true,
            ..SimOptions::default()
        };
        let s = sim(options);
        assert!(s.page.readiness().metadata_ready);
        assert!(s.page.binding().is_some());
    }

    #[test]
    fn zero_duration_completes_without_arming() {
        let options = SimOptions {
            duration: 0.0,
            ..SimOptions::default()
        };
        let mut s = sim(options);
        s.at(ms(100), Step::LoadMetadata)
            .at(ms(1_500), Step::ScrollTo(800.0));
        s.run_until(ms(1_200));
        assert!(s.page.readiness().metadata_ready);
        assert_eq!(s.page.completion(), Some(Completion::Natural));
        assert!(s.page.dismissed_at().is_some_and(|t| t < ms(10_000)));
        assert!(s.page.binding().is_none());
        assert_eq!(s.page.geometry_recomputes(), 0);

        s.run_until(ms(1_600));
        assert!((s.page.scroll_offset() - 800.0).abs() < 1e-9);
        assert!(s.state.borrow().pins.is_empty());
    }

    #[test]
    fn successful_swap_preserves_position() {
        let mut s = sim(SimOptions::default());
        s.at(ms(100), Step::LoadMetadata);
        s.run_until(ms(112));
        // playback drifted to 4s before the deferred swap
        s.state.borrow_mut().current_time = 4.0;
        s.run_until(ms(1_200));

        assert_eq!(s.page.swap_captured_at(), Some(4.0));
        let Some(SwapOutcome::Swapped { resumed_at }) = s.page.swap_outcome().cloned() else {
            panic!("expected a completed swap");
        };
        assert!((4.0..=4.0 + 0.01 + 1e-9).contains(&resumed_at));
        let state = s.state.borrow();
        // the element itself stays where the swap put it
        assert!((4.0..=4.0 + 0.01 + 1e-9).contains(&state.current_time));
        assert!(state.seeks.last().is_some_and(|t| (t - 4.01).abs() < 1e-9));
        assert_eq!(state.sources_assigned.len(), 1);
        assert!(state.source.starts_with("blob:vidscrub/"));
    }

    #[test]
    fn rejected_fetch_keeps_original_source() {
        let options = SimOptions {
            fetch: FetchPlan::Fail(FetchError::Rejected("offline".into())),
            ..SimOptions::default()
        };
        let mut s = sim(options);
        s.at(ms(100), Step::LoadMetadata);
        s.run_until(ms(1_200));
        assert_eq!(s.page.swap_state(), SwapState::Failed);
        assert!(s.page.readiness().transport_ready);
        assert_eq!(s.page.completion(), Some(Completion::Natural));
        let state = s.state.borrow();
        assert_eq!(state.source, "https://media.example/hero.mp4");
        assert!(state.sources_assigned.is_empty());
    }

    #[test]
    fn unsupported_seek_waits_for_playable() {
        let options = SimOptions {
            seek_supported: false,
            ..SimOptions::default()
        };
        let mut s = sim(options);
        s.at(ms(100), Step::LoadMetadata);
        s.run_until(ms(1_200));
        assert_eq!(s.page.swap_outcome(), Some(&SwapOutcome::SeekFallback));
        assert_eq!(s.page.completion(), Some(Completion::Natural));
    }

    #[test]
    fn scroll_drives_playback_in_reverse() {
        let mut s = sim(SimOptions::default());
        s.at(ms(100), Step::LoadMetadata)
            .at(ms(2_000), Step::ScrollTo(1_500.0));
        s.run_until(ms(1_500));
        let binding = s.page.binding().unwrap();
        assert!((binding.pin_distance - 3_000.0).abs() < 1e-9);
        assert!((s.state.borrow().current_time - 10.0).abs() < 1e-9);

        s.run_until(ms(2_100));
        assert!((s.page.scroll_offset() - 1_500.0).abs() < 1e-9);
        assert!((s.state.borrow().current_time - 5.0).abs() < 1e-9);
        assert_eq!(s.state.borrow().linkage_offset, Some(1_500.0));

        s.at(ms(2_200), Step::ScrollTo(3_000.0));
        s.run_until(ms(2_300));
        assert!(s.state.borrow().current_time.abs() < 1e-9);
    }

    #[test]
    fn scroll_is_ignored_while_blocking() {
        let mut s = sim(SimOptions::default());
        s.at(ms(100), Step::LoadMetadata)
            .at(ms(500), Step::ScrollTo(1_500.0));
        s.run_until(ms(900));
        assert!(s.page.scroll_offset().abs() < 1e-9);
        assert!((s.state.borrow().current_time - 10.0).abs() < 1e-9);
    }

    #[test]
    fn resize_recomputes_geometry_without_changing_distance() {
        let mut s = sim(SimOptions::default());
        s.at(ms(100), Step::LoadMetadata);
        s.run_until(ms(1_500));
        let before = s.page.geometry_recomputes();
        let refreshes = s.state.borrow().refreshes;

        s.at(
            ms(1_600),
            Step::Resize(PageLayout {
                viewport_height: 500.0,
                pin_wrapper_top: 40.0,
                ..PageLayout::default()
            }),
        );
        s.run_until(ms(1_700));
        assert_eq!(s.page.geometry_recomputes(), before + 1);
        assert_eq!(s.state.borrow().refreshes, refreshes + 1);
        let binding = s.page.binding().unwrap();
        assert!((binding.pin_distance - 3_000.0).abs() < 1e-9);
        assert!((binding.pin_start - 40.0).abs() < 1e-9);
        assert_eq!(s.page.media_descriptor().map(|m| m.duration), Some(10.0));
    }

    #[test]
    fn touch_unlocks_media_and_rearms_after_swap() {
        let mut s = sim(SimOptions::default());
        s.at(ms(50), Step::Touch).at(ms(100), Step::LoadMetadata);
        s.run_until(ms(1_500));
        assert_eq!(s.page.unlock_count(), 1);
        {
            let state = s.state.borrow();
            assert_eq!((state.plays, state.pauses), (1, 1));
        }

        s.at(ms(1_600), Step::Touch).at(ms(1_700), Step::Touch);
        s.run_until(ms(1_800));
        assert_eq!(s.page.unlock_count(), 2);
    }

    #[test]
    fn overlay_fades_out_over_fade_duration() {
        let options = SimOptions {
            has_network: false,
            ..SimOptions::default()
        };
        let mut s = sim(options).with_frame_interval(ms(1));
        s.at(ms(10), Step::LoadMetadata);
        s.run_until(ms(10));
        assert_eq!(s.page.dismissed_at(), Some(ms(10)));
        s.run_until(ms(185));
        let opacity = s.state.borrow().overlay_opacity;
        assert!((opacity - 0.25).abs() < 1e-3);
        s.run_until(ms(360));
        assert_eq!(s.page.overlay_state(), OverlayLifecycle::Removed);
    }
}
