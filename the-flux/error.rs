use thiserror::Error;

use crate::DispatchToken;

/// Result type for dispatcher operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors raised by [`Dispatcher`](crate::Dispatcher) operations.
#[derive(Debug, Error)]
pub enum DispatchError {
  #[error("cannot dispatch in the middle of a dispatch")]
  AlreadyDispatching,

  #[error("wait_for must be called while dispatching")]
  NotDispatching,

  #[error("{token} does not map to a registered callback")]
  InvalidToken { token: DispatchToken },

  #[error("circular dependency detected while waiting: {}", join_tokens(.cycle))]
  CircularDependency { cycle: Vec<DispatchToken> },

  #[error("callback {token} failed: {source}")]
  Callback {
    token:  DispatchToken,
    #[source]
    source: anyhow::Error,
  },
}

/// Fieldless discriminant of a [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchErrorKind {
  AlreadyDispatching,
  NotDispatching,
  InvalidToken,
  CircularDependency,
  Callback,
}

impl DispatchError {
  pub fn kind(&self) -> DispatchErrorKind {
    match self {
      Self::AlreadyDispatching => DispatchErrorKind::AlreadyDispatching,
      Self::NotDispatching => DispatchErrorKind::NotDispatching,
      Self::InvalidToken { .. } => DispatchErrorKind::InvalidToken,
      Self::CircularDependency { .. } => DispatchErrorKind::CircularDependency,
      Self::Callback { .. } => DispatchErrorKind::Callback,
    }
  }

  /// The error a callback returned, if this error came from one.
  pub fn callback_error(&self) -> Option<&anyhow::Error> {
    match self {
      Self::Callback { source, .. } => Some(source),
      _ => None,
    }
  }

  /// A copy of this error with the same kind, tokens and message.
  ///
  /// Callback sources cannot be cloned, so the copy carries the rendered
  /// source chain instead of the original value.
  pub(crate) fn echo(&self) -> Self {
    match self {
      Self::AlreadyDispatching => Self::AlreadyDispatching,
      Self::NotDispatching => Self::NotDispatching,
      Self::InvalidToken { token } => Self::InvalidToken { token: *token },
      Self::CircularDependency { cycle } => Self::CircularDependency {
        cycle: cycle.clone(),
      },
      Self::Callback { token, source } => Self::Callback {
        token:  *token,
        source: anyhow::anyhow!("{source:#}"),
      },
    }
  }

  /// Wrap an error returned by the callback behind `token`.
  ///
  /// Dispatcher errors forwarded out of a callback (usually a failed
  /// `wait_for` propagated with `?`) are passed through untouched so the
  /// caller of `dispatch` sees the innermost kind.
  pub(crate) fn from_callback(token: DispatchToken, err: anyhow::Error) -> Self {
    match err.downcast::<DispatchError>() {
      Ok(err) => err,
      Err(source) => Self::Callback { token, source },
    }
  }
}

fn join_tokens(tokens: &[DispatchToken]) -> String {
  tokens
    .iter()
    .map(ToString::to_string)
    .collect::<Vec<_>>()
    .join(" -> ")
}
