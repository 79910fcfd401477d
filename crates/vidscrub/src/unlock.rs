use crate::events::{Listener, Signal};
use crate::host::MediaElement;
use crate::runtime::OnceRegistry;

/// Primes the media element on the first user touch so gesture-gated
/// autoplay policies allow later programmatic seeks.
#[derive(Debug, Default)]
pub struct UnlockGuard {
    unlocks: u32,
}

impl UnlockGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for the next touch. A guard that is already waiting is not
    /// attached twice, so re-arming after a swap is safe.
    pub fn arm(&self, subscriptions: &mut OnceRegistry<Signal, Listener>) -> bool {
        subscriptions.once_unique(Signal::TouchStart, Listener::Unlock)
    }

    /// Touch delivered: play then pause straight away.
    pub fn on_touch(&mut self, media: &mut dyn MediaElement) {
        media.play();
        media.pause();
        self.unlocks += 1;
        log::debug!("Media unlocked by user gesture");
    }

    pub fn unlock_count(&self) -> u32 {
        self.unlocks
    }
}
