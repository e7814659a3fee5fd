/// Execute an aggregate command deterministically (no IO, no async).
///
/// 1. **Decide**: `aggregate.handle(command)` produces events without mutation.
/// 2. **Evolve**: each event is applied via `aggregate.apply(event)`.
///
/// If `handle` fails the aggregate is untouched. Callers that need a side
/// effect between the two steps (e.g. an asset transfer) call `handle` and
/// `apply` themselves instead.
pub fn execute<A>(
    aggregate: &mut A,
    command: &A::Command,
) -> Result<Vec<A::Event>, A::Error>
where
    A: forgelend_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
