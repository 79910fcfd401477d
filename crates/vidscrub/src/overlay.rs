use std::time::Duration;

use crate::ease;
use crate::host::PageSurface;
use crate::runtime::{Scheduler, TimerId, TimerKind};

/// Lifecycle of the readiness overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayLifecycle {
    /// Covering the page; scrolling is locked.
    Blocking,
    /// Fading out; scrolling already restored.
    Dismissing,
    /// Gone from the document.
    Removed,
}

/// The blocking overlay shown from page load until the readiness gate releases.
#[derive(Debug)]
pub struct Overlay {
    state: OverlayLifecycle,
    fade: Duration,
    dismissed_at: Option<Duration>,
    fade_timer: Option<TimerId>,
}

impl Overlay {
    /// Mount the overlay and lock page scrolling.
    pub fn mount(surface: &mut dyn PageSurface, text: &str, fade: Duration) -> Self {
        surface.set_scroll_locked(true);
        surface.mount_overlay(text);
        surface.set_overlay_opacity(1.0);
        Self {
            state: OverlayLifecycle::Blocking,
            fade,
            dismissed_at: None,
            fade_timer: None,
        }
    }

    /// Blocking → Dismissing. Restores scrolling immediately and schedules
    /// removal after the fade. Returns false if already dismissed.
    pub fn dismiss(
        &mut self,
        surface: &mut dyn PageSurface,
        scheduler: &mut Scheduler,
        now: Duration,
    ) -> bool {
        if self.state != OverlayLifecycle::Blocking {
            return false;
        }
        self.state = OverlayLifecycle::Dismissing;
        self.dismissed_at = Some(now);
        surface.set_scroll_locked(false);
        self.fade_timer = Some(scheduler.schedule(now + self.fade, TimerKind::OverlayFade));
        log::info!("Overlay dismissed at {}ms", now.as_millis());
        true
    }

    /// Per-frame fade update while dismissing.
    pub fn update(&mut self, surface: &mut dyn PageSurface, now: Duration) {
        if self.state == OverlayLifecycle::Dismissing {
            surface.set_overlay_opacity(self.opacity_at(now));
        }
    }

    /// The fade timer `id` fired: Dismissing → Removed.
    pub fn on_fade_elapsed(&mut self, surface: &mut dyn PageSurface, id: TimerId) -> bool {
        if self.fade_timer != Some(id) || self.state != OverlayLifecycle::Dismissing {
            return false;
        }
        self.fade_timer = None;
        self.state = OverlayLifecycle::Removed;
        surface.set_overlay_opacity(0.0);
        surface.remove_overlay();
        log::debug!("Overlay removed");
        true
    }

    /// Overlay opacity at page time `now`.
    pub fn opacity_at(&self, now: Duration) -> f32 {
        match (self.state, self.dismissed_at) {
            (OverlayLifecycle::Blocking, _) => 1.0,
            (OverlayLifecycle::Removed, _) => 0.0,
            (OverlayLifecycle::Dismissing, Some(start)) => {
                if self.fade.is_zero() {
                    return 0.0;
                }
                let t = now.saturating_sub(start).as_secs_f64() / self.fade.as_secs_f64();
                (1.0 - ease::power2_out(t)) as f32
            }
            (OverlayLifecycle::Dismissing, None) => 0.0,
        }
    }

    pub fn state(&self) -> OverlayLifecycle {
        self.state
    }

    pub fn dismissed_at(&self) -> Option<Duration> {
        self.dismissed_at
    }
}
