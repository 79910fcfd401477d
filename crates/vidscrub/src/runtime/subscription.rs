use std::collections::HashMap;
use std::hash::Hash;

/// One-shot subscriptions: each listener is delivered at most once and is
/// detached as part of delivery.
///
/// Listeners are plain values (usually small enums naming the reaction), so
/// the registry stays inspectable and owns no closures.
#[derive(Debug)]
pub struct OnceRegistry<S, L> {
    listeners: HashMap<S, Vec<L>>,
}

impl<S: Eq + Hash + Copy, L: PartialEq> OnceRegistry<S, L> {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }

    /// Attach `listener` to the next delivery of `signal`.
    pub fn once(&mut self, signal: S, listener: L) {
        self.listeners.entry(signal).or_default().push(listener);
    }

    /// Attach `listener` unless an identical one is already waiting.
    /// Returns whether it was attached.
    pub fn once_unique(&mut self, signal: S, listener: L) -> bool {
        if self.is_waiting(signal, &listener) {
            return false;
        }
        self.once(signal, listener);
        true
    }

    /// Detach and return every listener waiting on `signal`, in attach order.
    pub fn deliver(&mut self, signal: S) -> Vec<L> {
        self.listeners.remove(&signal).unwrap_or_default()
    }

    pub fn is_waiting(&self, signal: S, listener: &L) -> bool {
        self.listeners
            .get(&signal)
            .is_some_and(|waiting| waiting.contains(listener))
    }

    pub fn waiting_count(&self, signal: S) -> usize {
        self.listeners.get(&signal).map_or(0, Vec::len)
    }
}

impl<S: Eq + Hash + Copy, L: PartialEq> Default for OnceRegistry<S, L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Sig {
        Touch,
        Seeked,
    }

    #[test]
    fn delivers_once_then_detaches() {
        let mut reg: OnceRegistry<Sig, &str> = OnceRegistry::new();
        reg.once(Sig::Touch, "unlock");
        assert_eq!(reg.deliver(Sig::Touch), vec!["unlock"]);
        assert!(reg.deliver(Sig::Touch).is_empty());
    }

    #[test]
    fn signals_are_independent() {
        let mut reg: OnceRegistry<Sig, &str> = OnceRegistry::new();
        reg.once(Sig::Touch, "a");
        reg.once(Sig::Seeked, "b");
        assert_eq!(reg.deliver(Sig::Seeked), vec!["b"]);
        assert_eq!(reg.waiting_count(Sig::Touch), 1);
    }

    #[test]
    fn preserves_attach_order() {
        let mut reg: OnceRegistry<Sig, u8> = OnceRegistry::new();
        reg.once(Sig::Seeked, 2);
        reg.once(Sig::Seeked, 1);
        assert_eq!(reg.deliver(Sig::Seeked), vec![2, 1]);
    }

    #[test]
    fn once_unique_skips_duplicates() {
        let mut reg: OnceRegistry<Sig, &str> = OnceRegistry::new();
        assert!(reg.once_unique(Sig::Touch, "unlock"));
        assert!(!reg.once_unique(Sig::Touch, "unlock"));
        assert_eq!(reg.waiting_count(Sig::Touch), 1);
    }
}
