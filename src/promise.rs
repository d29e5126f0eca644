use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use log::debug;

use crate::node::{Chain, Lineage, Node, SettleOnce};
use crate::settle::{self, IntoSettlement, Rejecter, Resolver, Thenable};
use crate::{Error, Status};

/// A promise whose continuations run on the caller's stack.
///
/// Registering a handler on a settled promise runs it before `then` returns;
/// settling a promise runs every handler already registered before the settle
/// call returns. The only way to defer work is [`pause`](Self::pause).
///
/// `SyncPromise` is a cheap handle: clones refer to the same promise.
///
/// # Examples
///
/// ```
/// use synchronous_promise::SyncPromise;
///
/// let doubled = SyncPromise::<i32, String>::resolve(21).then(|n| Ok(n * 2));
/// assert_eq!(doubled.value(), Some(42));
///
/// let recovered = SyncPromise::<i32, String>::reject("nope".into())
///     .then(|n| Ok(n + 1))
///     .catch(|e| Ok(e.len() as i32));
/// assert_eq!(recovered.value(), Some(4));
/// ```
pub struct SyncPromise<T, E> {
    pub(crate) node: Rc<Node<T, E>>,
    lineage: Option<Rc<Lineage>>,
}

impl<T: Clone + 'static, E: Clone + 'static> SyncPromise<T, E> {
    /// Creates a promise, running `setup` immediately with its settle
    /// callbacks.
    ///
    /// # Examples
    ///
    /// ```
    /// use synchronous_promise::{Status, SyncPromise};
    ///
    /// let promise = SyncPromise::<&str, ()>::new(|resolve, _reject| {
    ///     resolve.resolve("done");
    /// });
    /// assert_eq!(promise.status(), Status::Resolved);
    /// ```
    pub fn new<F>(setup: F) -> Self
    where
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>),
    {
        let node = Node::new();
        let (resolver, rejecter) = settle::pair(node.clone());
        setup(resolver, rejecter);
        SyncPromise::root(node)
    }

    /// Like [`new`](Self::new), but an `Err` returned by `setup` rejects the
    /// promise unless it was already settled.
    pub fn try_new<F>(setup: F) -> Self
    where
        F: FnOnce(Resolver<T, E>, Rejecter<T, E>) -> Result<(), E>,
    {
        Self::new(|resolve, reject| {
            let fallback = reject.clone();
            if let Err(error) = setup(resolve, reject) {
                debug!("promise setup failed, rejecting");
                fallback.reject(error);
            }
        })
    }

    /// Registers a success handler and returns the promise of its result.
    ///
    /// A rejection skips `on_resolve` and passes through unchanged.
    pub fn then<U, R, F>(&self, on_resolve: F) -> SyncPromise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        R: IntoSettlement<U, E>,
    {
        self.chain(move |outcome, child| match outcome {
            Ok(value) => child.apply(on_resolve(value).into_settlement()),
            Err(error) => child.complete(Err(error)),
        })
    }

    /// Registers both handlers; exactly one of them runs.
    pub fn then_catch<U, R, S, F, G>(&self, on_resolve: F, on_reject: G) -> SyncPromise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        G: FnOnce(E) -> S + 'static,
        R: IntoSettlement<U, E>,
        S: IntoSettlement<U, E>,
    {
        self.chain(move |outcome, child| match outcome {
            Ok(value) => child.apply(on_resolve(value).into_settlement()),
            Err(error) => child.apply(on_reject(error).into_settlement()),
        })
    }

    /// Registers a failure handler. A resolved value passes through unchanged.
    pub fn catch<R, G>(&self, on_reject: G) -> SyncPromise<T, E>
    where
        G: FnOnce(E) -> R + 'static,
        R: IntoSettlement<T, E>,
    {
        self.chain(move |outcome, child| match outcome {
            Ok(value) => child.complete(Ok(value)),
            Err(error) => child.apply(on_reject(error).into_settlement()),
        })
    }

    fn chain<U, F>(&self, react: F) -> SyncPromise<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(Result<T, E>, SettleOnce<U, E>) + 'static,
    {
        let child = Node::new();
        let right = SettleOnce::new(child.clone());
        self.node.react(Box::new(move |outcome| react(outcome, right)));
        let parent: Rc<dyn Chain> = self.node.clone();
        SyncPromise {
            node: child,
            lineage: Some(Lineage::extend(parent, self.lineage.clone())),
        }
    }

    /// Stops dispatch at this promise until [`resume`](Self::resume).
    ///
    /// Returns this same promise. Settlement still happens while paused; only
    /// the handlers wait.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    /// use synchronous_promise::SyncPromise;
    ///
    /// let calls = Rc::new(Cell::new(0));
    /// let (first, second) = (calls.clone(), calls.clone());
    /// let tail = SyncPromise::<(), ()>::resolve(())
    ///     .then(move |_| Ok(first.set(first.get() + 1)))
    ///     .pause()
    ///     .then(move |_| Ok(second.set(second.get() + 1)));
    /// assert_eq!(calls.get(), 1);
    ///
    /// tail.resume();
    /// assert_eq!(calls.get(), 2);
    /// ```
    pub fn pause(&self) -> Self {
        self.node.pause();
        self.clone()
    }

    /// Resumes the nearest paused promise, starting from this one and walking
    /// up the chain it was derived from, then dispatches whatever it settled
    /// as. Does nothing if no such promise is paused.
    ///
    /// Returns this same promise.
    pub fn resume(&self) -> Self {
        if self.node.is_paused() {
            self.node.unpause();
        } else if let Some(lineage) = &self.lineage {
            lineage.resume_nearest();
        }
        self.clone()
    }

    /// The resolved value, if this promise has resolved.
    pub fn value(&self) -> Option<T> {
        self.node.value()
    }

    /// The rejection error, if this promise has rejected.
    pub fn error(&self) -> Option<E> {
        self.node.error()
    }

    /// The settled outcome, or why there is none yet.
    ///
    /// Unlike awaiting, this reports a settlement even while paused.
    pub fn outcome(&self) -> Result<T, Error<E>> {
        self.node.outcome()
    }
}

impl<T, E> SyncPromise<T, E> {
    /// A handle on a node that was not derived from another promise.
    pub(crate) fn root(node: Rc<Node<T, E>>) -> Self {
        SyncPromise {
            node,
            lineage: None,
        }
    }

    pub fn status(&self) -> Status {
        self.node.status()
    }

    pub fn is_paused(&self) -> bool {
        self.node.paused()
    }

    /// Whether every way of settling this promise is gone while it is pending.
    pub fn is_abandoned(&self) -> bool {
        self.node.is_abandoned()
    }

    /// Whether both handles refer to the same promise.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl<T: Clone + 'static, E: Clone + 'static> SyncPromise<SyncPromise<T, E>, E> {
    /// Removes one level of nesting.
    pub fn flatten(&self) -> SyncPromise<T, E> {
        self.then(|inner| inner)
    }
}

impl<T, E> Clone for SyncPromise<T, E> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            lineage: self.lineage.clone(),
        }
    }
}

impl<T, E> fmt::Debug for SyncPromise<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncPromise")
            .field("status", &self.status())
            .field("paused", &self.is_paused())
            .field("abandoned", &self.is_abandoned())
            .finish()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Thenable<T, E> for SyncPromise<T, E> {
    fn subscribe(self: Box<Self>, on_settled: Box<dyn FnOnce(Result<T, E>)>) {
        self.node.react(on_settled);
    }

    fn as_sync_promise(&self) -> Option<&SyncPromise<T, E>> {
        Some(self)
    }
}

/// Awaiting a promise completes once it has settled and is not paused.
impl<T: Clone + 'static, E: Clone + 'static> Future for SyncPromise<T, E> {
    type Output = Result<T, Error<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.node.poll_outcome(cx.waker())
    }
}
