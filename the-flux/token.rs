use std::{
  fmt,
  num::NonZeroU64,
};

/// Handle returned by [`Dispatcher::register`](crate::Dispatcher::register).
///
/// Tokens are minted from a per-dispatcher counter and are never reused, even
/// after the callback they name has been unregistered. They only carry meaning
/// for the dispatcher that produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchToken(NonZeroU64);

impl DispatchToken {
  pub(crate) const FIRST: Self = Self(NonZeroU64::MIN);

  /// The raw counter value behind this token.
  #[inline]
  pub const fn get(self) -> u64 {
    self.0.get()
  }

  /// # Panics
  ///
  /// Panics if the counter is exhausted; handing out `u64::MAX` again would
  /// reuse a token.
  #[inline]
  pub(crate) const fn next(self) -> Self {
    match self.0.checked_add(1) {
      Some(id) => Self(id),
      None => panic!("dispatch token counter overflowed"),
    }
  }
}

impl fmt::Display for DispatchToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "ID_{}", self.0)
  }
}
