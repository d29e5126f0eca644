//! The vocabulary of settlement: what a setup routine or a handler can hand
//! back to a promise, and the callbacks a setup routine settles it through.
use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use log::trace;

use crate::node::{Node, SettleOnce};
use crate::SyncPromise;

/// A promise-like value: something that eventually delivers a `Result<T, E>`.
///
/// A promise resolved with a `Thenable` adopts its outcome instead of storing
/// it, to any depth of nesting. `SyncPromise` implements this trait; other
/// deferred types can implement it to interoperate.
///
/// # Examples
///
/// ```
/// use synchronous_promise::{SyncPromise, Thenable};
///
/// /// An outcome computed on first subscription.
/// struct Lazy(fn() -> Result<u8, String>);
///
/// impl Thenable<u8, String> for Lazy {
///     fn subscribe(self: Box<Self>, on_settled: Box<dyn FnOnce(Result<u8, String>)>) {
///         on_settled((self.0)())
///     }
/// }
///
/// let promise = SyncPromise::resolve_with(Lazy(|| Ok(42)));
/// assert_eq!(promise.value(), Some(42));
/// ```
pub trait Thenable<T, E> {
    /// Delivers the outcome to `on_settled` at most once.
    ///
    /// Dropping `on_settled` without calling it abandons whatever adopted
    /// this thenable.
    fn subscribe(self: Box<Self>, on_settled: Box<dyn FnOnce(Result<T, E>)>);

    /// The promise behind this thenable, when it is a `SyncPromise`.
    ///
    /// Used to catch a promise being resolved with itself.
    fn as_sync_promise(&self) -> Option<&SyncPromise<T, E>> {
        None
    }
}

/// How a promise should settle.
pub enum Settlement<T, E> {
    /// Resolve with a plain value.
    Resolve(T),
    /// Reject with an error.
    Reject(E),
    /// Follow a promise-like value and take its eventual outcome.
    Adopt(Box<dyn Thenable<T, E>>),
}

impl<T, E> Settlement<T, E> {
    pub fn adopt<P>(thenable: P) -> Self
    where
        P: Thenable<T, E> + 'static,
    {
        Settlement::Adopt(Box::new(thenable))
    }
}

impl<T: Debug, E: Debug> Debug for Settlement<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Settlement::Resolve(value) => f.debug_tuple("Resolve").field(value).finish(),
            Settlement::Reject(error) => f.debug_tuple("Reject").field(error).finish(),
            Settlement::Adopt(_) => f.write_str("Adopt(..)"),
        }
    }
}

/// Anything a handler may return.
///
/// `Ok` resolves, `Err` rejects (the way a thrown error would), and a
/// `SyncPromise` is flattened into the outcome.
pub trait IntoSettlement<T, E> {
    fn into_settlement(self) -> Settlement<T, E>;
}

impl<T, E> IntoSettlement<T, E> for Settlement<T, E> {
    fn into_settlement(self) -> Settlement<T, E> {
        self
    }
}

impl<T, E> IntoSettlement<T, E> for Result<T, E> {
    fn into_settlement(self) -> Settlement<T, E> {
        match self {
            Ok(value) => Settlement::Resolve(value),
            Err(error) => Settlement::Reject(error),
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> IntoSettlement<T, E> for SyncPromise<T, E> {
    fn into_settlement(self) -> Settlement<T, E> {
        Settlement::adopt(self)
    }
}

type SharedRight<T, E> = Rc<RefCell<Option<SettleOnce<T, E>>>>;

/// The success callback handed to a promise's setup routine.
///
/// A `Resolver` and its `Rejecter` share a single right to settle: whichever
/// call comes first wins and every later call on either is ignored. Dropping
/// every clone of both without settling abandons the promise.
pub struct Resolver<T, E> {
    right: SharedRight<T, E>,
}

/// The failure callback handed to a promise's setup routine.
pub struct Rejecter<T, E> {
    right: SharedRight<T, E>,
}

pub(crate) fn pair<T, E>(node: Rc<Node<T, E>>) -> (Resolver<T, E>, Rejecter<T, E>) {
    let right = Rc::new(RefCell::new(Some(SettleOnce::new(node))));
    (
        Resolver {
            right: right.clone(),
        },
        Rejecter { right },
    )
}

fn take_right<T, E>(right: &SharedRight<T, E>) -> Option<SettleOnce<T, E>> {
    let taken = right.borrow_mut().take();
    if taken.is_none() {
        trace!("promise already settled; ignoring");
    }
    taken
}

impl<T: Clone + 'static, E: Clone + 'static> Resolver<T, E> {
    pub fn resolve(&self, value: T) {
        self.settle(Settlement::Resolve(value));
    }

    /// Resolves with a promise-like value, following it to its outcome.
    pub fn adopt<P>(&self, thenable: P)
    where
        P: Thenable<T, E> + 'static,
    {
        self.settle(Settlement::adopt(thenable));
    }

    pub fn settle<S>(&self, settlement: S)
    where
        S: IntoSettlement<T, E>,
    {
        if let Some(right) = take_right(&self.right) {
            right.apply(settlement.into_settlement());
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Rejecter<T, E> {
    pub fn reject(&self, error: E) {
        if let Some(right) = take_right(&self.right) {
            right.complete(Err(error));
        }
    }
}

impl<T, E> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            right: self.right.clone(),
        }
    }
}

impl<T, E> Clone for Rejecter<T, E> {
    fn clone(&self) -> Self {
        Self {
            right: self.right.clone(),
        }
    }
}

impl<T, E> Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("spent", &self.right.borrow().is_none())
            .finish()
    }
}

impl<T, E> Debug for Rejecter<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rejecter")
            .field("spent", &self.right.borrow().is_none())
            .finish()
    }
}
