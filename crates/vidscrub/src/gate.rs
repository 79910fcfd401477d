use std::time::Duration;

use crate::runtime::{Scheduler, TimerId, TimerKind};

/// Requirement satisfied once media metadata has loaded.
pub const METADATA: &str = "metadata";
/// Requirement satisfied once the resource swap settled (any outcome).
pub const TRANSPORT: &str = "transport";

/// How the gate released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Every registered requirement was satisfied.
    Natural,
    /// The fail-safe deadline elapsed first.
    FailSafe,
    /// There was no media element, so nothing to wait for.
    NoMedia,
}

/// Read-only view of the two page readiness flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessState {
    pub metadata_ready: bool,
    /// True by default when no swap is attempted.
    pub transport_ready: bool,
}

#[derive(Debug, Clone)]
struct Requirement {
    name: String,
    met: bool,
}

/// Barrier that releases exactly once: when all registered requirements are
/// met, or when the fail-safe deadline elapses.
#[derive(Debug)]
pub struct ReadinessGate {
    requirements: Vec<Requirement>,
    failsafe: Option<TimerId>,
    completion: Option<Completion>,
}

impl ReadinessGate {
    /// Create the gate and schedule its fail-safe `timeout` after `now`.
    pub fn new(scheduler: &mut Scheduler, now: Duration, timeout: Duration) -> Self {
        let failsafe = scheduler.schedule(now + timeout, TimerKind::FailSafe);
        Self {
            requirements: Vec::new(),
            failsafe: Some(failsafe),
            completion: None,
        }
    }

    /// Mark `name` as pending. Registering an existing name is a no-op.
    pub fn register_requirement(&mut self, name: &str) {
        if self.requirements.iter().any(|r| r.name == name) {
            return;
        }
        self.requirements.push(Requirement {
            name: name.to_string(),
            met: false,
        });
    }

    /// Mark `name` as met. Returns the completion if this call released the gate.
    ///
    /// Flags are recorded even after completion; they never reset.
    pub fn satisfy(&mut self, name: &str, scheduler: &mut Scheduler) -> Option<Completion> {
        match self.requirements.iter_mut().find(|r| r.name == name) {
            Some(req) => req.met = true,
            None => {
                log::debug!("Readiness '{name}' satisfied without being registered");
                self.requirements.push(Requirement {
                    name: name.to_string(),
                    met: true,
                });
            }
        }

        if self.completion.is_some() || !self.all_met() {
            return None;
        }
        self.cancel_failsafe(scheduler);
        self.finish(Completion::Natural)
    }

    /// The fail-safe timer `id` fired. Forces completion unless already complete.
    pub fn on_failsafe(&mut self, id: TimerId) -> Option<Completion> {
        if self.failsafe != Some(id) {
            return None;
        }
        self.failsafe = None;
        if self.completion.is_some() {
            return None;
        }
        log::warn!("Readiness fail-safe elapsed before {:?} were met", self.pending());
        self.finish(Completion::FailSafe)
    }

    /// Release immediately because there is no media to wait for.
    pub fn complete_without_media(&mut self, scheduler: &mut Scheduler) -> Option<Completion> {
        self.cancel_failsafe(scheduler);
        if self.completion.is_some() {
            return None;
        }
        self.finish(Completion::NoMedia)
    }

    pub fn completion(&self) -> Option<Completion> {
        self.completion
    }

    pub fn is_complete(&self) -> bool {
        self.completion.is_some()
    }

    pub fn failsafe_pending(&self) -> bool {
        self.failsafe.is_some()
    }

    pub fn is_met(&self, name: &str) -> bool {
        self.requirements.iter().any(|r| r.name == name && r.met)
    }

    /// Names still pending, in registration order.
    pub fn pending(&self) -> Vec<&str> {
        self.requirements
            .iter()
            .filter(|r| !r.met)
            .map(|r| r.name.as_str())
            .collect()
    }

    pub fn state(&self) -> ReadinessState {
        let registered = |name: &str| self.requirements.iter().any(|r| r.name == name);
        ReadinessState {
            metadata_ready: self.is_met(METADATA),
            transport_ready: !registered(TRANSPORT) || self.is_met(TRANSPORT),
        }
    }

    fn all_met(&self) -> bool {
        self.requirements.iter().all(|r| r.met)
    }

    fn cancel_failsafe(&mut self, scheduler: &mut Scheduler) {
        if let Some(id) = self.failsafe.take() {
            scheduler.cancel(id);
        }
    }

    fn finish(&mut self, completion: Completion) -> Option<Completion> {
        self.completion = Some(completion);
        log::info!("Readiness gate released ({completion:?})");
        Some(completion)
    }
}
