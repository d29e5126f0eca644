//! Constructors layered on the promise core.
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use log::trace;

use crate::node::Node;
use crate::settle::{self, IntoSettlement, Rejecter, Resolver, Thenable};
use crate::SyncPromise;

impl<T: Clone + 'static, E: Clone + 'static> SyncPromise<T, E> {
    /// A promise already resolved with `value`.
    pub fn resolve(value: T) -> Self {
        Self::new(|resolve, _| resolve.resolve(value))
    }

    /// A promise already rejected with `error`.
    pub fn reject(error: E) -> Self {
        Self::new(|_, reject| reject.reject(error))
    }

    /// A new promise that follows `thenable` to its outcome.
    ///
    /// Always a new promise, even when `thenable` is itself a `SyncPromise`.
    ///
    /// # Examples
    ///
    /// ```
    /// use synchronous_promise::SyncPromise;
    ///
    /// let inner = SyncPromise::<&str, ()>::resolve("v");
    /// let outer = SyncPromise::resolve_with(SyncPromise::resolve_with(inner.clone()));
    /// assert!(!outer.ptr_eq(&inner));
    /// assert_eq!(outer.value(), Some("v"));
    /// ```
    pub fn resolve_with<P>(thenable: P) -> Self
    where
        P: Thenable<T, E> + 'static,
    {
        Self::new(|resolve, _| resolve.adopt(thenable))
    }

    /// A promise settled according to `settlement`.
    pub fn from_settlement<S>(settlement: S) -> Self
    where
        S: IntoSettlement<T, E>,
    {
        Self::new(|resolve, _| resolve.settle(settlement))
    }

    /// A pending promise settled from the outside.
    ///
    /// # Examples
    ///
    /// ```
    /// use synchronous_promise::SyncPromise;
    ///
    /// let deferred = SyncPromise::<u32, String>::unresolved();
    /// let doubled = deferred.then(|n| Ok(n * 2));
    /// assert_eq!(doubled.value(), None);
    ///
    /// deferred.resolve(21);
    /// assert_eq!(doubled.value(), Some(42));
    /// ```
    pub fn unresolved() -> Unresolved<T, E> {
        let node = Node::new();
        let (resolver, rejecter) = settle::pair(node.clone());
        Unresolved {
            promise: SyncPromise::root(node),
            resolver,
            rejecter,
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> SyncPromise<Vec<T>, E> {
    /// Resolves with every input's value, in input order, once all have
    /// resolved. Rejects with the first rejection to happen; later ones are
    /// ignored.
    ///
    /// Inputs may be promises or plain `Result`s, which are wrapped first. No
    /// inputs resolves immediately with an empty `Vec`.
    ///
    /// # Examples
    ///
    /// ```
    /// use synchronous_promise::SyncPromise;
    ///
    /// let all = SyncPromise::all([
    ///     SyncPromise::<_, String>::resolve("abc"),
    ///     SyncPromise::resolve("123"),
    /// ]);
    /// assert_eq!(all.value(), Some(vec!["abc", "123"]));
    /// ```
    pub fn all<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: IntoSettlement<T, E>,
    {
        let inputs: Vec<SyncPromise<T, E>> = items
            .into_iter()
            .map(SyncPromise::from_settlement)
            .collect();
        if inputs.is_empty() {
            return Self::resolve(vec![]);
        }
        trace!("waiting on {} promise(s)", inputs.len());
        Self::new(move |resolve, reject| {
            let slots: Rc<RefCell<Vec<Option<T>>>> =
                Rc::new(RefCell::new(inputs.iter().map(|_| None).collect()));
            let remaining = Rc::new(Cell::new(inputs.len()));
            for (index, input) in inputs.into_iter().enumerate() {
                let slots = slots.clone();
                let remaining = remaining.clone();
                let resolve = resolve.clone();
                let reject = reject.clone();
                input.node.react(Box::new(move |outcome| match outcome {
                    Ok(value) => {
                        slots.borrow_mut()[index] = Some(value);
                        remaining.set(remaining.get() - 1);
                        if remaining.get() == 0 {
                            let values = slots.borrow_mut().drain(..).flatten().collect();
                            resolve.resolve(values);
                        }
                    }
                    Err(error) => reject.reject(error),
                }));
            }
        })
    }
}

/// A pending promise together with the callbacks that settle it.
///
/// Dereferences to the promise, so `then`, `catch`, `pause` and the rest are
/// available directly. Dropping it without settling abandons the promise
/// unless the resolver or rejecter was kept through [`into_parts`](Self::into_parts).
pub struct Unresolved<T, E> {
    promise: SyncPromise<T, E>,
    resolver: Resolver<T, E>,
    rejecter: Rejecter<T, E>,
}

impl<T: Clone + 'static, E: Clone + 'static> Unresolved<T, E> {
    /// Resolves the promise with `value`.
    pub fn resolve(&self, value: T) {
        self.resolver.resolve(value);
    }

    /// Resolves the promise by following `thenable` to its outcome.
    pub fn adopt<P>(&self, thenable: P)
    where
        P: Thenable<T, E> + 'static,
    {
        self.resolver.adopt(thenable);
    }

    /// Rejects the promise with `error`.
    pub fn reject(&self, error: E) {
        self.rejecter.reject(error);
    }
}

impl<T, E> Unresolved<T, E> {
    /// Another handle on the promise.
    pub fn promise(&self) -> SyncPromise<T, E> {
        self.promise.clone()
    }

    /// Splits into the promise and its callbacks, keeping it settleable.
    pub fn into_parts(self) -> (SyncPromise<T, E>, Resolver<T, E>, Rejecter<T, E>) {
        (self.promise, self.resolver, self.rejecter)
    }
}

impl<T, E> Deref for Unresolved<T, E> {
    type Target = SyncPromise<T, E>;

    fn deref(&self) -> &Self::Target {
        &self.promise
    }
}

impl<T, E> fmt::Debug for Unresolved<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Unresolved").field(&self.promise).finish()
    }
}
