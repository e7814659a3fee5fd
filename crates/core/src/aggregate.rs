//! Decide/apply contract for event-driven ledgers.

/// Identity and version of a state machine that evolves only through events.
pub trait AggregateRoot {
    type Id: Copy + Eq + core::hash::Hash + core::fmt::Debug;

    /// Stable name stamped on every envelope this aggregate emits.
    const AGGREGATE_TYPE: &'static str;

    fn id(&self) -> &Self::Id;

    /// Number of events applied since the empty state.
    fn version(&self) -> u64;
}

/// Pure decision step plus infallible state transition.
///
/// `handle` carries every check that can fail and must not mutate. `apply`
/// must accept any event `handle` produced (or that history recorded), so a
/// caller may run a fallible side effect between the two and simply drop the
/// events if it fails.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    /// Evolve state from one event (+1 to `version()`).
    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
