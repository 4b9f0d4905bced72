//! # the-flux
//!
//! A synchronous, single-threaded dispatcher that broadcasts payloads to
//! registered callbacks and lets callbacks order themselves with
//! [`Dispatcher::wait_for`].
//!
//! ## Core Concepts
//!
//! - **Callbacks**: closures registered with [`Dispatcher::register`]. Each
//!   receives the dispatcher and a reference to the payload.
//! - **Tokens**: [`DispatchToken`]s name registered callbacks for
//!   [`Dispatcher::unregister`] and as `wait_for` targets.
//! - **Dispatch**: one broadcast of a payload. Callbacks run in registration
//!   order unless `wait_for` pulls a dependency forward; each runs at most
//!   once per dispatch.
//! - **Cycles**: waiting on a callback that is still running is reported as
//!   [`DispatchError::CircularDependency`] instead of deadlocking.
//!
//! ## Basic Usage
//!
//! ```rust
//! use std::{
//!   cell::RefCell,
//!   rc::Rc,
//! };
//!
//! use the_flux::Dispatcher;
//!
//! #[derive(Debug)]
//! enum Action {
//!   Add(String),
//!   Clear,
//! }
//!
//! let dispatcher = Dispatcher::<Action>::new();
//! let items = Rc::new(RefCell::new(Vec::new()));
//! let count = Rc::new(RefCell::new(0));
//!
//! let store_items = items.clone();
//! let items_token = dispatcher.register(move |_, action| {
//!   match action {
//!     Action::Add(item) => store_items.borrow_mut().push(item.clone()),
//!     Action::Clear => store_items.borrow_mut().clear(),
//!   }
//!   Ok(())
//! });
//!
//! let (count_items, store_count) = (items.clone(), count.clone());
//! dispatcher.register(move |dispatcher, _| {
//!   dispatcher.wait_for([items_token])?;
//!   *store_count.borrow_mut() = count_items.borrow().len();
//!   Ok(())
//! });
//!
//! dispatcher.dispatch(Action::Add("a".into())).unwrap();
//! dispatcher.dispatch(Action::Add("b".into())).unwrap();
//! assert_eq!(*count.borrow(), 2);
//!
//! dispatcher.dispatch(Action::Clear).unwrap();
//! assert_eq!(*count.borrow(), 0);
//! ```
//!
//! ## Errors
//!
//! Every failure is a [`DispatchError`]. Errors returned from `wait_for` can be
//! forwarded out of a callback with `?`; `dispatch` reports the original kind
//! rather than wrapping it as a callback failure.
//!
//! ```rust
//! use the_flux::{
//!   DispatchErrorKind,
//!   Dispatcher,
//! };
//!
//! let dispatcher = Dispatcher::<()>::new();
//! let own = std::rc::Rc::new(std::cell::Cell::new(None));
//! let lookup = own.clone();
//! let token = dispatcher.register(move |dispatcher, _| {
//!   dispatcher.wait_for(lookup.get())?;
//!   Ok(())
//! });
//! own.set(Some(token));
//!
//! let err = dispatcher.dispatch(()).unwrap_err();
//! assert_eq!(err.kind(), DispatchErrorKind::CircularDependency);
//! assert!(!dispatcher.is_dispatching());
//! ```
//!
//! ## Configuration
//!
//! [`DispatcherConfig`] names the instance in log records and toggles
//! per-invocation tracing. It can be parsed from TOML:
//!
//! ```rust
//! use the_flux::{
//!   Dispatcher,
//!   DispatcherConfig,
//! };
//!
//! let config = DispatcherConfig::from_toml_str(
//!   r#"
//!   name = "stores"
//!   trace-invocations = true
//!   "#,
//! )
//! .unwrap();
//! let dispatcher = Dispatcher::<()>::with_config(config);
//! assert_eq!(dispatcher.name(), "stores");
//! ```

mod config;
mod dispatcher;
mod error;
mod token;

pub use config::{
  ConfigError,
  DispatcherConfig,
};
pub use dispatcher::Dispatcher;
pub use error::{
  DispatchError,
  DispatchErrorKind,
  Result,
};
pub use token::DispatchToken;
