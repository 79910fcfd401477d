use crate::host::{MediaElement, PageLayout, PinTrigger, ScrollLinkage};

/// Geometry of the pinned scrub region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollBinding {
    /// Scroll offset where the pin engages (wrapper top meets viewport top).
    pub pin_start: f64,
    /// Scroll distance the pin holds for: `duration * ratio`.
    pub pin_distance: f64,
    /// Seconds of media per unit of scroll distance.
    pub scrub_factor: f64,
}

impl ScrollBinding {
    pub fn new(duration: f64, ratio: f64, pin_start: f64) -> Self {
        let pin_distance = duration * ratio;
        let scrub_factor = if pin_distance > 0.0 {
            duration / pin_distance
        } else {
            0.0
        };
        Self {
            pin_start,
            pin_distance,
            scrub_factor,
        }
    }

    pub fn pin_end(&self) -> f64 {
        self.pin_start + self.pin_distance
    }

    /// Normalized progress through the pin, clamped to 0..=1.
    pub fn progress(&self, offset: f64) -> f64 {
        if self.pin_distance <= 0.0 {
            return if offset >= self.pin_start { 1.0 } else { 0.0 };
        }
        ((offset - self.pin_start) / self.pin_distance).clamp(0.0, 1.0)
    }

    /// Whether `offset` lies inside the pinned range.
    pub fn is_pinned(&self, offset: f64) -> bool {
        offset >= self.pin_start && offset <= self.pin_end()
    }

    pub fn trigger(&self) -> PinTrigger {
        PinTrigger {
            start: self.pin_start,
            end: self.pin_end(),
            scrub: true,
            pin: true,
            invalidate_on_refresh: true,
        }
    }
}

/// Playback position for progress `p`: forward scroll runs the media backwards
/// from its end to its start.
pub fn position_for_progress(duration: f64, p: f64) -> f64 {
    (duration * (1.0 - p)).clamp(0.0, duration)
}

/// Drives media playback position from scroll progress through the pin.
#[derive(Debug)]
pub struct ScrollTimelineBinder {
    ratio: f64,
    /// Read once at arming; immutable afterwards.
    duration: Option<f64>,
    binding: Option<ScrollBinding>,
    last_position: Option<f64>,
    recomputes: u32,
}

impl ScrollTimelineBinder {
    pub fn new(ratio: f64) -> Self {
        Self {
            ratio,
            duration: None,
            binding: None,
            last_position: None,
            recomputes: 0,
        }
    }

    /// Arm with the media duration. Only the first call fixes the duration;
    /// later calls just recompute geometry. Returns `None` when the duration
    /// is unusable (zero, negative, non-finite), leaving the binder unarmed.
    pub fn arm(
        &mut self,
        duration: f64,
        layout: &PageLayout,
        linkage: &mut dyn ScrollLinkage,
    ) -> Option<ScrollBinding> {
        if self.duration.is_none() {
            if !(duration.is_finite() && duration > 0.0) {
                log::warn!("Media duration {duration} cannot be scrubbed; binder stays unarmed");
                return None;
            }
            self.duration = Some(duration);
            log::info!(
                "Scroll binder armed: {duration:.2}s over {:.0} units",
                duration * self.ratio
            );
        }
        self.recompute_geometry(layout, linkage)
    }

    /// Re-measure the pin from current layout and ask the scroll-linked engine
    /// to refresh. The pin distance stays derived from the armed duration.
    /// The mapped position is only rewritten when the pin actually moved.
    pub fn recompute_geometry(
        &mut self,
        layout: &PageLayout,
        linkage: &mut dyn ScrollLinkage,
    ) -> Option<ScrollBinding> {
        let Some(duration) = self.duration else {
            linkage.refresh();
            return None;
        };
        let binding = ScrollBinding::new(duration, self.ratio, layout.pin_wrapper_top);
        // A refresh over unchanged geometry must not rewrite the element.
        if self.binding != Some(binding) {
            self.last_position = None;
        }
        self.binding = Some(binding);
        self.recomputes += 1;
        linkage.pin(binding.trigger());
        linkage.refresh();
        Some(binding)
    }

    /// Mapped playback position for a scroll offset, once armed.
    pub fn position_for_offset(&self, offset: f64) -> Option<f64> {
        let duration = self.duration?;
        let binding = self.binding?;
        Some(position_for_progress(duration, binding.progress(offset)))
    }

    /// Write the mapped position to the media element. Skips the write when the
    /// position has not changed since the last one. Returns the written position.
    pub fn apply(&mut self, offset: f64, media: &mut dyn MediaElement) -> Option<f64> {
        let position = self.position_for_offset(offset)?;
        if self
            .last_position
            .is_some_and(|last| (last - position).abs() < f64::EPSILON)
        {
            return None;
        }
        match media.seek(position) {
            Ok(()) => {
                self.last_position = Some(position);
                Some(position)
            }
            Err(e) => {
                log::debug!("Scrub write to {position:.3}s skipped: {e}");
                None
            }
        }
    }

    pub fn is_armed(&self) -> bool {
        self.binding.is_some()
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn binding(&self) -> Option<ScrollBinding> {
        self.binding
    }

    pub fn recompute_count(&self) -> u32 {
        self.recomputes
    }
}
