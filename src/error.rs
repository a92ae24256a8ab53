use thiserror::Error;

/// Errors surfaced by the tree, the handle layer, and the backing store.
///
/// `OutOfRange` and `UseAfterRelease` are caller contract violations reported
/// at the public boundary. `DoubleFree` and `InvariantViolation` indicate the
/// core itself is inconsistent; they are not expected to occur in correct
/// usage and are not recovered from locally.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum IntervalError {
  /// An index or slice argument fell outside the addressable range.
  #[error("index or slice out of range")]
  OutOfRange,

  /// The handle this operation targeted has already been released.
  #[error("operation on a released handle")]
  UseAfterRelease,

  /// The backing store was asked to free cells that are already free, or
  /// that lie outside its addressable range.
  #[error("double free or out-of-range free")]
  DoubleFree,

  /// A tree aggregate, a hole-transition stream, or a total-adjust delta
  /// did not match its definition. This is a programmer error, not a
  /// recoverable runtime condition.
  #[error("nesting-depth tree invariant violated")]
  InvariantViolation,
}
