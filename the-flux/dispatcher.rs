use std::{
  cell::{
    Cell,
    RefCell,
  },
  fmt,
  rc::Rc,
};

use indexmap::IndexMap;

use crate::{
  DispatchError,
  DispatchToken,
  DispatcherConfig,
  Result,
};

type CallbackFn<P> = dyn FnMut(&Dispatcher<P>, &P) -> anyhow::Result<()>;

/// Callbacks are shared so the registry borrow can be released before one is
/// invoked; the callback itself may then register or unregister freely.
type CallbackSlot<P> = Rc<RefCell<CallbackFn<P>>>;

/// Per-dispatch status of a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
  Pending,
  /// Invoked and not yet returned. Waiting on a callback in this state is a
  /// cycle.
  InProgress,
  Handled,
  /// Returned an error. The dispatch is aborting.
  Failed,
}

/// Transient bookkeeping for the dispatch in flight.
struct Cycle<P> {
  payload: Rc<P>,
  /// Snapshot of the registry taken when the dispatch started. Callbacks
  /// registered later have no entry and never run in this dispatch.
  status:  IndexMap<DispatchToken, Status>,
  /// Callbacks currently on the call stack, outermost first.
  stack:   Vec<DispatchToken>,
  /// First error raised in this dispatch. Callers further up the stack only
  /// see an [`echo`](DispatchError::echo) of it, so this original is what
  /// `dispatch` returns even if a waiting callback swallows its copy.
  failure: Option<DispatchError>,
}

impl<P> Cycle<P> {
  /// The chain of in-progress callbacks that ends by waiting on `token`.
  ///
  /// `InProgress` callbacks are exactly the ones on the stack, so `token` is
  /// always found for a real cycle.
  fn chain_to(&self, token: DispatchToken) -> Vec<DispatchToken> {
    let mut chain: Vec<DispatchToken> = self
      .stack
      .iter()
      .copied()
      .skip_while(|&entry| entry != token)
      .collect();
    chain.push(token);
    chain
  }
}

/// Broadcasts payloads to registered callbacks, one dispatch at a time.
///
/// Callbacks run in registration order. A callback may call
/// [`wait_for`](Self::wait_for) with other tokens to have those callbacks run
/// first; each callback runs at most once per dispatch no matter how many
/// times it is waited on.
///
/// The dispatcher is single-threaded. Every operation takes `&self`, so a
/// callback handed the dispatcher can wait on, register and unregister other
/// callbacks while a dispatch is in flight.
///
/// ```
/// use std::{
///   cell::RefCell,
///   rc::Rc,
/// };
///
/// use the_flux::Dispatcher;
///
/// let dispatcher = Dispatcher::<u32>::new();
/// let total = Rc::new(RefCell::new(0));
/// let doubled = Rc::new(RefCell::new(0));
///
/// let sum_total = total.clone();
/// let sum = dispatcher.register(move |_, amount| {
///   *sum_total.borrow_mut() += *amount;
///   Ok(())
/// });
///
/// // Reads `total` only after `sum` has run for this payload.
/// let (read_total, write_doubled) = (total.clone(), doubled.clone());
/// dispatcher.register(move |dispatcher, _| {
///   dispatcher.wait_for([sum])?;
///   *write_doubled.borrow_mut() = *read_total.borrow() * 2;
///   Ok(())
/// });
///
/// dispatcher.dispatch(5).unwrap();
/// assert_eq!(*doubled.borrow(), 10);
/// ```
pub struct Dispatcher<P> {
  config:     DispatcherConfig,
  callbacks:  RefCell<IndexMap<DispatchToken, CallbackSlot<P>>>,
  next_token: Cell<DispatchToken>,
  cycle:      RefCell<Option<Cycle<P>>>,
}

impl<P> Default for Dispatcher<P> {
  fn default() -> Self {
    Self::new()
  }
}

impl<P> fmt::Debug for Dispatcher<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Dispatcher")
      .field("name", &self.config.name)
      .field("callbacks", &self.len())
      .field("dispatching", &self.is_dispatching())
      .finish()
  }
}

impl<P> Dispatcher<P> {
  pub fn new() -> Self {
    Self::with_config(DispatcherConfig::default())
  }

  pub fn with_config(config: DispatcherConfig) -> Self {
    Self {
      config,
      callbacks: RefCell::new(IndexMap::new()),
      next_token: Cell::new(DispatchToken::FIRST),
      cycle: RefCell::new(None),
    }
  }

  pub fn config(&self) -> &DispatcherConfig {
    &self.config
  }

  pub fn name(&self) -> &str {
    &self.config.name
  }

  /// Register a callback to be invoked with every dispatched payload.
  ///
  /// A callback registered while a dispatch is in flight first runs on the
  /// next dispatch.
  pub fn register<F>(&self, callback: F) -> DispatchToken
  where
    F: FnMut(&Dispatcher<P>, &P) -> anyhow::Result<()> + 'static,
  {
    let token = self.next_token.get();
    self.next_token.set(token.next());

    let slot: CallbackSlot<P> = Rc::new(RefCell::new(callback));
    self.callbacks.borrow_mut().insert(token, slot);
    tracing::debug!(dispatcher = %self.config.name, %token, "registered callback");
    token
  }

  /// Remove a callback. A callback removed mid-dispatch is not invoked for
  /// the rest of that dispatch.
  pub fn unregister(&self, token: DispatchToken) -> Result<()> {
    let removed = self.callbacks.borrow_mut().shift_remove(&token);
    match removed {
      Some(_) => {
        tracing::debug!(dispatcher = %self.config.name, %token, "unregistered callback");
        Ok(())
      },
      None => Err(DispatchError::InvalidToken { token }),
    }
  }

  pub fn is_registered(&self, token: DispatchToken) -> bool {
    self.callbacks.borrow().contains_key(&token)
  }

  /// Registered tokens in registration order.
  pub fn tokens(&self) -> Vec<DispatchToken> {
    self.callbacks.borrow().keys().copied().collect()
  }

  pub fn len(&self) -> usize {
    self.callbacks.borrow().len()
  }

  pub fn is_empty(&self) -> bool {
    self.callbacks.borrow().is_empty()
  }

  pub fn is_dispatching(&self) -> bool {
    self.cycle.borrow().is_some()
  }

  /// Run the callbacks behind `tokens` before continuing the current one.
  ///
  /// Must be called from inside a callback during a dispatch. Callbacks that
  /// already ran in this dispatch are skipped. Waiting on a callback that is
  /// still on the call stack (including the caller itself) fails with
  /// [`DispatchError::CircularDependency`].
  ///
  /// Every token is checked against the registry before any callback runs,
  /// so an unknown token fails the call without side effects. Tokens are
  /// checked again as they are reached, since a dependency may unregister a
  /// later one.
  ///
  /// Once a callback has failed in this dispatch, `wait_for` returns a copy
  /// of that error without running anything else.
  pub fn wait_for<I>(&self, tokens: I) -> Result<()>
  where
    I: IntoIterator<Item = DispatchToken>,
  {
    if !self.is_dispatching() {
      return Err(DispatchError::NotDispatching);
    }

    let tokens: Vec<DispatchToken> = tokens.into_iter().collect();
    if let Some(&token) = tokens.iter().find(|&&token| !self.is_registered(token)) {
      return Err(DispatchError::InvalidToken { token });
    }

    for token in tokens {
      let status = {
        let cycle = self.cycle.borrow();
        let cycle = cycle.as_ref().ok_or(DispatchError::NotDispatching)?;
        if let Some(failure) = &cycle.failure {
          return Err(failure.echo());
        }
        if !self.is_registered(token) {
          return Err(DispatchError::InvalidToken { token });
        }
        match cycle.status.get(&token).copied() {
          Some(Status::InProgress) => {
            return Err(DispatchError::CircularDependency {
              cycle: cycle.chain_to(token),
            });
          },
          status => status,
        }
      };

      match status {
        Some(Status::Pending) => self.invoke(token)?,
        Some(Status::Handled) => {
          if self.config.trace_invocations {
            tracing::trace!(dispatcher = %self.config.name, %token, "already handled");
          }
        },
        // Handled by the early returns above.
        Some(Status::InProgress | Status::Failed) => {},
        // Registered after this dispatch started.
        None => {
          if self.config.trace_invocations {
            tracing::trace!(
              dispatcher = %self.config.name,
              %token,
              "not part of the current dispatch"
            );
          }
        },
      }
    }

    Ok(())
  }

  /// Broadcast `payload` to every registered callback.
  ///
  /// Dispatching from inside a callback fails with
  /// [`DispatchError::AlreadyDispatching`]. The first callback error aborts
  /// the dispatch and is returned; the dispatcher is idle again afterwards
  /// either way.
  pub fn dispatch(&self, payload: P) -> Result<()> {
    if self.is_dispatching() {
      tracing::warn!(dispatcher = %self.config.name, "rejected re-entrant dispatch");
      return Err(DispatchError::AlreadyDispatching);
    }

    let status: IndexMap<DispatchToken, Status> = self
      .callbacks
      .borrow()
      .keys()
      .map(|&token| (token, Status::Pending))
      .collect();
    let order: Vec<DispatchToken> = status.keys().copied().collect();

    tracing::debug!(
      dispatcher = %self.config.name,
      callbacks = order.len(),
      "dispatch started"
    );

    *self.cycle.borrow_mut() = Some(Cycle {
      payload: Rc::new(payload),
      status,
      stack: Vec::new(),
      failure: None,
    });
    let _idle = IdleGuard {
      cycle: &self.cycle,
    };

    for token in order {
      if self.status_of(token) != Some(Status::Pending) || !self.is_registered(token) {
        continue;
      }
      let outcome = self.invoke(token);
      let recorded = self
        .cycle
        .borrow_mut()
        .as_mut()
        .and_then(|cycle| cycle.failure.take());
      // A recorded failure wins: the callback may have swallowed its echo, or
      // forwarded the echo instead of the original.
      let err = match (recorded, outcome) {
        (Some(err), _) | (None, Err(err)) => err,
        (None, Ok(())) => continue,
      };
      tracing::warn!(
        dispatcher = %self.config.name,
        %token,
        %err,
        "dispatch aborted"
      );
      return Err(err);
    }

    tracing::debug!(dispatcher = %self.config.name, "dispatch finished");
    Ok(())
  }

  fn status_of(&self, token: DispatchToken) -> Option<Status> {
    self
      .cycle
      .borrow()
      .as_ref()
      .and_then(|cycle| cycle.status.get(&token).copied())
  }

  fn invoke(&self, token: DispatchToken) -> Result<()> {
    let callback = self
      .callbacks
      .borrow()
      .get(&token)
      .cloned()
      .ok_or(DispatchError::InvalidToken { token })?;

    let payload = {
      let mut cycle = self.cycle.borrow_mut();
      let cycle = cycle.as_mut().ok_or(DispatchError::NotDispatching)?;
      if let Some(status) = cycle.status.get_mut(&token) {
        *status = Status::InProgress;
      }
      cycle.stack.push(token);
      Rc::clone(&cycle.payload)
    };

    if self.config.trace_invocations {
      tracing::trace!(dispatcher = %self.config.name, %token, "invoking callback");
    }

    // Cannot already be borrowed: a callback on the stack is `InProgress` and
    // `wait_for` rejects waiting on it.
    let result = {
      let mut callback = callback.borrow_mut();
      (&mut *callback)(self, &*payload)
    };

    let mut cycle = self.cycle.borrow_mut();
    let Some(cycle) = cycle.as_mut() else {
      return result.map_err(|err| DispatchError::from_callback(token, err));
    };
    cycle.stack.pop();
    let status = if result.is_ok() {
      Status::Handled
    } else {
      Status::Failed
    };
    if let Some(entry) = cycle.status.get_mut(&token) {
      *entry = status;
    }

    match result {
      Ok(()) => Ok(()),
      // The first failure is already recorded; pass this one up the stack.
      Err(err) if cycle.failure.is_some() => Err(DispatchError::from_callback(token, err)),
      Err(err) => {
        let err = DispatchError::from_callback(token, err);
        let echo = err.echo();
        cycle.failure = Some(err);
        Err(echo)
      },
    }
  }
}

/// Returns the dispatcher to idle when a dispatch ends, including by unwinding.
struct IdleGuard<'a, P> {
  cycle: &'a RefCell<Option<Cycle<P>>>,
}

impl<P> Drop for IdleGuard<'_, P> {
  fn drop(&mut self) {
    let finished = self.cycle.borrow_mut().take();
    // Dropped outside the borrow so a payload destructor may query the
    // dispatcher.
    drop(finished);
  }
}
