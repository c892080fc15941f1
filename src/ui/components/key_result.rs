/// Outcome of offering a key to a component.
///
/// Components report back to their view with this instead of each defining
/// their own result enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Consumed, nothing for the parent to do
  Handled,
  /// Consumed, and the parent should handle this event
  Event(T),
  /// Not consumed; the parent tries its own bindings
  NotHandled,
}
