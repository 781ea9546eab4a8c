//! Listener Graph
//!
//! The bidirectional index of dependency edges between signal properties
//! and reactors.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use smallvec::SmallVec;

use crate::reactive::{ReactorId, SignalId};

/// Snapshot of the reactors listening to one property.
///
/// Most properties have a handful of listeners, so the snapshot usually
/// stays on the stack.
pub type Listeners = SmallVec<[ReactorId; 4]>;

/// Dependency edges, indexed from both ends.
///
/// Forward edges map `(signal, property)` to the reactors that read it on
/// their most recent run. Back edges map a reactor to the properties it
/// read, grouped by property name. Every mutating method updates both
/// sides before returning, so they are always exact inverses.
///
/// Listener sets keep insertion order. Clearing a reactor removes it from
/// its sets, so after a re-run it is appended at the end again and
/// listeners are notified in the order they were most recently registered.
#[derive(Debug, Default)]
pub struct ListenerGraph {
    /// signal -> property -> reactors
    forward: HashMap<SignalId, HashMap<String, IndexSet<ReactorId>>>,

    /// reactor -> property -> signals
    back: HashMap<ReactorId, IndexMap<String, IndexSet<SignalId>>>,
}

impl ListenerGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `reactor` read `property` of `signal`.
    ///
    /// Returns `true` if the edge is new. Registering an existing edge is a
    /// no-op.
    pub fn register(&mut self, signal: SignalId, property: &str, reactor: ReactorId) -> bool {
        let listeners = self
            .forward
            .entry(signal)
            .or_default()
            .entry(property.to_owned())
            .or_default();

        if !listeners.insert(reactor) {
            return false;
        }

        self.back
            .entry(reactor)
            .or_default()
            .entry(property.to_owned())
            .or_default()
            .insert(signal);

        true
    }

    /// Remove every edge of `reactor`. Returns the number of edges removed.
    ///
    /// Must run before each re-run of the reactor so the graph reflects only
    /// the properties read by the latest run.
    pub fn clear(&mut self, reactor: ReactorId) -> usize {
        let Some(deps) = self.back.remove(&reactor) else {
            return 0;
        };

        let mut removed = 0;
        for (property, signals) in deps {
            for signal in signals {
                let Some(properties) = self.forward.get_mut(&signal) else {
                    continue;
                };
                if let Some(listeners) = properties.get_mut(&property) {
                    if listeners.shift_remove(&reactor) {
                        removed += 1;
                    }
                    if listeners.is_empty() {
                        properties.remove(&property);
                    }
                }
                if properties.is_empty() {
                    self.forward.remove(&signal);
                }
            }
        }

        removed
    }

    /// Snapshot of the reactors listening to `property` of `signal`.
    ///
    /// The result is a copy; callers may mutate the graph while iterating
    /// it.
    pub fn listeners(&self, signal: SignalId, property: &str) -> Listeners {
        self.forward
            .get(&signal)
            .and_then(|properties| properties.get(property))
            .map(|listeners| listeners.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Number of reactors listening to `property` of `signal`.
    pub fn listener_count(&self, signal: SignalId, property: &str) -> usize {
        self.forward
            .get(&signal)
            .and_then(|properties| properties.get(property))
            .map_or(0, IndexSet::len)
    }

    /// Whether `reactor` currently depends on anything.
    pub fn has_edges(&self, reactor: ReactorId) -> bool {
        self.back.contains_key(&reactor)
    }

    /// Every `(signal, property)` pair `reactor` currently depends on.
    pub fn dependencies(&self, reactor: ReactorId) -> Vec<(SignalId, String)> {
        self.back
            .get(&reactor)
            .map(|deps| {
                deps.iter()
                    .flat_map(|(property, signals)| {
                        signals.iter().map(move |signal| (*signal, property.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop every edge that points at `signal`.
    ///
    /// Returns the reactors that were left with no edges at all.
    pub fn forget_signal(&mut self, signal: SignalId) -> Vec<ReactorId> {
        let Some(properties) = self.forward.remove(&signal) else {
            return Vec::new();
        };

        let mut orphaned = Vec::new();
        for (property, listeners) in properties {
            for reactor in listeners {
                let Some(deps) = self.back.get_mut(&reactor) else {
                    continue;
                };
                if let Some(signals) = deps.get_mut(&property) {
                    signals.shift_remove(&signal);
                    if signals.is_empty() {
                        deps.shift_remove(&property);
                    }
                }
                if deps.is_empty() {
                    self.back.remove(&reactor);
                    orphaned.push(reactor);
                }
            }
        }

        orphaned
    }

    /// Check that forward and back edges are exact inverses.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let forward_ok = self.forward.iter().all(|(signal, properties)| {
            properties.iter().all(|(property, listeners)| {
                !listeners.is_empty()
                    && listeners.iter().all(|reactor| {
                        self.back
                            .get(reactor)
                            .and_then(|deps| deps.get(property))
                            .is_some_and(|signals| signals.contains(signal))
                    })
            })
        });

        let back_ok = self.back.iter().all(|(reactor, deps)| {
            !deps.is_empty()
                && deps.iter().all(|(property, signals)| {
                    signals.iter().all(|signal| {
                        self.forward
                            .get(signal)
                            .and_then(|properties| properties.get(property))
                            .is_some_and(|listeners| listeners.contains(reactor))
                    })
                })
        });

        forward_ok && back_ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let mut graph = ListenerGraph::new();
        let signal = SignalId::new();
        let reactor = ReactorId::new();

        assert!(graph.register(signal, "n", reactor));
        assert!(!graph.register(signal, "n", reactor));

        assert_eq!(graph.listener_count(signal, "n"), 1);
        assert_eq!(graph.dependencies(reactor), vec![(signal, "n".to_string())]);
        assert!(graph.is_consistent());
    }

    #[test]
    fn clear_removes_both_directions() {
        let mut graph = ListenerGraph::new();
        let a = SignalId::new();
        let b = SignalId::new();
        let reactor = ReactorId::new();
        let other = ReactorId::new();

        graph.register(a, "x", reactor);
        graph.register(b, "x", reactor);
        graph.register(a, "y", reactor);
        graph.register(a, "x", other);

        assert_eq!(graph.clear(reactor), 3);
        assert!(!graph.has_edges(reactor));
        assert!(graph.dependencies(reactor).is_empty());
        assert_eq!(graph.listeners(a, "x").as_slice(), &[other]);
        assert_eq!(graph.listener_count(a, "y"), 0);
        assert_eq!(graph.listener_count(b, "x"), 0);
        assert!(graph.is_consistent());

        // Clearing again is harmless
        assert_eq!(graph.clear(reactor), 0);
    }

    #[test]
    fn listeners_follow_registration_order() {
        let mut graph = ListenerGraph::new();
        let signal = SignalId::new();
        let first = ReactorId::new();
        let second = ReactorId::new();
        let third = ReactorId::new();

        graph.register(signal, "v", first);
        graph.register(signal, "v", second);
        graph.register(signal, "v", third);
        assert_eq!(graph.listeners(signal, "v").as_slice(), &[first, second, third]);

        // A re-run moves the reactor to the back
        graph.clear(first);
        graph.register(signal, "v", first);
        assert_eq!(graph.listeners(signal, "v").as_slice(), &[second, third, first]);
        assert!(graph.is_consistent());
    }

    #[test]
    fn listeners_is_a_snapshot() {
        let mut graph = ListenerGraph::new();
        let signal = SignalId::new();
        let reactor = ReactorId::new();
        graph.register(signal, "v", reactor);

        let snapshot = graph.listeners(signal, "v");
        graph.clear(reactor);

        assert_eq!(snapshot.as_slice(), &[reactor]);
        assert!(graph.listeners(signal, "v").is_empty());
    }

    #[test]
    fn forget_signal_reports_orphans() {
        let mut graph = ListenerGraph::new();
        let doomed = SignalId::new();
        let kept = SignalId::new();
        let only_doomed = ReactorId::new();
        let both = ReactorId::new();

        graph.register(doomed, "a", only_doomed);
        graph.register(doomed, "b", only_doomed);
        graph.register(doomed, "a", both);
        graph.register(kept, "a", both);

        let orphaned = graph.forget_signal(doomed);

        assert_eq!(orphaned, vec![only_doomed]);
        assert!(!graph.has_edges(only_doomed));
        assert_eq!(graph.dependencies(both), vec![(kept, "a".to_string())]);
        assert!(graph.is_consistent());
    }

    #[test]
    fn unknown_property_has_no_listeners() {
        let graph = ListenerGraph::new();
        assert!(graph.listeners(SignalId::new(), "missing").is_empty());
        assert_eq!(graph.listener_count(SignalId::new(), "missing"), 0);
    }
}
