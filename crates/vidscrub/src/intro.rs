use std::time::Duration;

use crate::ease;
use crate::host::{PageLayout, PageSurface};

/// Scrubbed fade of the intro content region: as it scrolls past the top of
/// the viewport it shrinks towards `min_scale` and fades out.
///
/// The displayed progress trails the scroll position by `lag` seconds using an
/// exponential follower, so fast flicks settle smoothly.
#[derive(Debug)]
pub struct IntroFade {
    min_scale: f64,
    lag: f64,
    target: f64,
    shown: f64,
    last_tick: Option<Duration>,
}

impl IntroFade {
    pub fn new(min_scale: f64, lag: f64) -> Self {
        Self {
            min_scale,
            lag,
            target: 0.0,
            shown: 0.0,
            last_tick: None,
        }
    }

    /// Raw progress for `offset`: 0 while the region's top is below the
    /// viewport top, 1 once its bottom has left.
    pub fn progress_for(layout: &PageLayout, offset: f64) -> f64 {
        if layout.intro_height <= 0.0 {
            return if offset >= layout.intro_top { 1.0 } else { 0.0 };
        }
        ((offset - layout.intro_top) / layout.intro_height).clamp(0.0, 1.0)
    }

    /// Feed a new scroll offset.
    pub fn scroll_to(&mut self, layout: &PageLayout, offset: f64) {
        self.target = Self::progress_for(layout, offset);
    }

    /// Advance the follower to `now` and push the style to the surface.
    pub fn tick(&mut self, surface: &mut dyn PageSurface, now: Duration) {
        let dt = self
            .last_tick
            .map_or(0.0, |last| now.saturating_sub(last).as_secs_f64());
        self.last_tick = Some(now);

        if self.lag <= 0.0 {
            self.shown = self.target;
        } else {
            let alpha = 1.0 - (-dt / self.lag).exp();
            self.shown += alpha * (self.target - self.shown);
            if (self.target - self.shown).abs() < 1e-4 {
                self.shown = self.target;
            }
        }

        let (scale, alpha) = self.style();
        surface.set_intro_style(scale, alpha);
    }

    /// Current (scale, alpha).
    pub fn style(&self) -> (f64, f64) {
        let eased = ease::power2_in_out(self.shown);
        let scale = 1.0 + (self.min_scale - 1.0) * eased;
        (scale, 1.0 - eased)
    }

    pub fn shown_progress(&self) -> f64 {
        self.shown
    }
}
