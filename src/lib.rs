//! Promises whose continuations run synchronously.
//!
//! A [`SyncPromise`] behaves like a JavaScript promise except that nothing is
//! deferred to a later turn of an event loop: handlers run on the caller's
//! stack, in registration order, as soon as the promise they wait on has
//! settled. Propagation through a chain is eager and transitive. The one way
//! to hold it back is [`SyncPromise::pause`], undone by
//! [`SyncPromise::resume`].
//!
//! Handlers report failure by returning `Err`, which rejects the next promise
//! in the chain. Returning a promise instead of a `Result` flattens it.
//!
//! ```
//! use synchronous_promise::{Status, SyncPromise};
//!
//! let promise = SyncPromise::<&str, String>::resolve("123")
//!     .then(|_| SyncPromise::resolve("abc"))
//!     .then(|s| Ok(s.len()));
//! assert_eq!(promise.status(), Status::Resolved);
//! assert_eq!(promise.value(), Some(3));
//! ```
use std::fmt;

use thiserror::Error;

mod factories;
mod node;
mod promise;
mod settle;

pub use factories::Unresolved;
pub use promise::SyncPromise;
pub use settle::{IntoSettlement, Rejecter, Resolver, Settlement, Thenable};

/// Where a promise is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Pending,
    Resolved,
    Rejected,
}

impl Status {
    /// The lowercase name, as shown by `Display`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Resolved => "resolved",
            Status::Rejected => "rejected",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a promise has no value to hand over.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error<E> {
    #[error("promise has not settled")]
    Pending,
    #[error("promise was rejected: {0:?}")]
    Rejected(E),
    /// Every handle able to settle the promise was dropped first.
    #[error("promise can never settle")]
    Abandoned,
}
