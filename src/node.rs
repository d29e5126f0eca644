//! The state machine behind every `SyncPromise` handle.
//!
//! A node is shared through `Rc` and mutated through a `RefCell`. No borrow is
//! ever held while user code runs: reactions are drained out of the node
//! before they are invoked, so a handler may freely register, pause or settle
//! anything, including the node it is being dispatched from.
use std::cell::RefCell;
use std::mem;
use std::rc::Rc;
use std::task::{Poll, Waker};

use log::{debug, trace};

use crate::settle::Settlement;
use crate::{Error, Status};

/// A continuation waiting for a node's outcome.
pub(crate) type Reaction<T, E> = Box<dyn FnOnce(Result<T, E>)>;

enum State<T, E> {
    Pending,
    Resolved(T),
    Rejected(E),
}

impl<T, E> State<T, E> {
    fn status(&self) -> Status {
        match self {
            State::Pending => Status::Pending,
            State::Resolved(_) => Status::Resolved,
            State::Rejected(_) => Status::Rejected,
        }
    }
}

struct Inner<T, E> {
    state: State<T, E>,
    paused: bool,
    abandoned: bool,
    reactions: Vec<Reaction<T, E>>,
    wakers: Vec<Waker>,
}

/// A node owns the nodes derived from it, through the reactions that will
/// settle them, and nothing upstream. The path back up lives in the handles,
/// see [`Lineage`].
pub(crate) struct Node<T, E> {
    inner: RefCell<Inner<T, E>>,
}

/// Type-erased view of a node, used when walking a chain's ancestors.
///
/// A child's value type usually differs from its parent's, so an ancestor
/// cannot be named as `Node<T, E>`.
pub(crate) trait Chain {
    fn is_paused(&self) -> bool;
    fn unpause(&self);
}

/// The ancestors of a handle's node, nearest first.
///
/// Held by `SyncPromise` handles only, so a paused ancestor stays reachable
/// for `resume` exactly as long as some handle below it exists. Links are
/// shared between a handle and the handles derived from it.
pub(crate) struct Lineage {
    node: Rc<dyn Chain>,
    up: Option<Rc<Lineage>>,
}

impl Lineage {
    pub(crate) fn extend(node: Rc<dyn Chain>, up: Option<Rc<Lineage>>) -> Rc<Self> {
        Rc::new(Lineage { node, up })
    }

    /// Resumes the nearest paused ancestor, if any.
    pub(crate) fn resume_nearest(&self) -> bool {
        let mut cursor = Some(self);
        while let Some(link) = cursor {
            if link.node.is_paused() {
                link.node.unpause();
                return true;
            }
            cursor = link.up.as_deref();
        }
        false
    }
}

impl Drop for Lineage {
    // Unlinks iteratively; a long chain would otherwise drop recursively.
    fn drop(&mut self) {
        let mut up = self.up.take();
        while let Some(link) = up {
            match Rc::try_unwrap(link) {
                Ok(mut link) => up = link.up.take(),
                Err(_) => break,
            }
        }
    }
}

impl<T, E> Node<T, E> {
    pub(crate) fn new() -> Rc<Self> {
        Rc::new(Node {
            inner: RefCell::new(Inner {
                state: State::Pending,
                paused: false,
                abandoned: false,
                reactions: vec![],
                wakers: vec![],
            }),
        })
    }

    pub(crate) fn status(&self) -> Status {
        self.inner.borrow().state.status()
    }

    pub(crate) fn paused(&self) -> bool {
        self.inner.borrow().paused
    }

    pub(crate) fn is_abandoned(&self) -> bool {
        self.inner.borrow().abandoned
    }

    pub(crate) fn pause(&self) {
        self.inner.borrow_mut().paused = true;
        trace!("paused node");
    }

    /// Marks a pending node as impossible to settle.
    ///
    /// Queued reactions are dropped, which abandons the nodes they would have
    /// settled in turn.
    pub(crate) fn abandon(&self) {
        let (reactions, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if inner.abandoned || !matches!(inner.state, State::Pending) {
                return;
            }
            inner.abandoned = true;
            (
                mem::take(&mut inner.reactions),
                mem::take(&mut inner.wakers),
            )
        };
        trace!(
            "abandoned pending node with {} continuation(s)",
            reactions.len()
        );
        for waker in wakers {
            waker.wake()
        }
        drop(reactions);
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Node<T, E> {
    pub(crate) fn value(&self) -> Option<T> {
        match &self.inner.borrow().state {
            State::Resolved(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub(crate) fn error(&self) -> Option<E> {
        match &self.inner.borrow().state {
            State::Rejected(error) => Some(error.clone()),
            _ => None,
        }
    }

    pub(crate) fn outcome(&self) -> Result<T, Error<E>> {
        let inner = self.inner.borrow();
        match &inner.state {
            State::Resolved(value) => Ok(value.clone()),
            State::Rejected(error) => Err(Error::Rejected(error.clone())),
            State::Pending if inner.abandoned => Err(Error::Abandoned),
            State::Pending => Err(Error::Pending),
        }
    }

    /// Settles a pending node and dispatches its queue. Ignored once settled.
    pub(crate) fn settle(&self, outcome: Result<T, E>) {
        {
            let mut inner = self.inner.borrow_mut();
            if !matches!(inner.state, State::Pending) {
                trace!("ignoring settlement of a {} node", inner.state.status());
                return;
            }
            inner.state = match outcome {
                Ok(value) => State::Resolved(value),
                Err(error) => State::Rejected(error),
            };
            trace!("node {}", inner.state.status());
        }
        self.flush();
    }

    /// Queues a reaction and dispatches right away if the node allows it.
    pub(crate) fn react(&self, reaction: Reaction<T, E>) {
        let abandoned = {
            let mut inner = self.inner.borrow_mut();
            if !inner.abandoned {
                inner.reactions.push(reaction);
                None
            } else {
                Some(reaction)
            }
        };
        match abandoned {
            // Dropping it abandons whatever it would have settled.
            Some(reaction) => drop(reaction),
            None => self.flush(),
        }
    }

    /// Dispatches every queued reaction if the node is settled and unpaused.
    ///
    /// The queue is taken out of the node before the first reaction runs. A
    /// reaction that pauses this node stops the drain; the reactions not yet
    /// run go back to the front of the queue.
    pub(crate) fn flush(&self) {
        let (outcome, reactions, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if inner.paused {
                return;
            }
            let outcome = match &inner.state {
                State::Pending => return,
                State::Resolved(value) => Ok(value.clone()),
                State::Rejected(error) => Err(error.clone()),
            };
            (
                outcome,
                mem::take(&mut inner.reactions),
                mem::take(&mut inner.wakers),
            )
        };
        for waker in wakers {
            waker.wake()
        }
        if reactions.is_empty() {
            return;
        }
        trace!("dispatching {} continuation(s)", reactions.len());
        let mut queue = reactions.into_iter();
        while let Some(reaction) = queue.next() {
            reaction(outcome.clone());
            let mut inner = self.inner.borrow_mut();
            if inner.paused {
                let mut rest: Vec<_> = queue.collect();
                trace!("paused mid-dispatch, re-queueing {}", rest.len());
                rest.append(&mut inner.reactions);
                inner.reactions = rest;
                return;
            }
        }
    }

    pub(crate) fn poll_outcome(&self, waker: &Waker) -> Poll<Result<T, Error<E>>> {
        let mut inner = self.inner.borrow_mut();
        match &inner.state {
            State::Pending if inner.abandoned => return Poll::Ready(Err(Error::Abandoned)),
            State::Resolved(value) if !inner.paused => return Poll::Ready(Ok(value.clone())),
            State::Rejected(error) if !inner.paused => {
                return Poll::Ready(Err(Error::Rejected(error.clone())))
            }
            _ => {}
        }
        if !inner.wakers.iter().any(|w| w.will_wake(waker)) {
            inner.wakers.push(waker.clone());
        }
        Poll::Pending
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Chain for Node<T, E> {
    fn is_paused(&self) -> bool {
        self.paused()
    }

    fn unpause(&self) {
        self.inner.borrow_mut().paused = false;
        trace!("resumed node ({})", self.status());
        self.flush();
    }
}

/// The exclusive right to settle one node.
///
/// Dropping it without settling abandons the node: nothing else can ever
/// settle it.
pub(crate) struct SettleOnce<T, E> {
    node: Rc<Node<T, E>>,
    armed: bool,
}

impl<T, E> SettleOnce<T, E> {
    pub(crate) fn new(node: Rc<Node<T, E>>) -> Self {
        SettleOnce { node, armed: true }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> SettleOnce<T, E> {
    pub(crate) fn complete(mut self, outcome: Result<T, E>) {
        self.armed = false;
        self.node.settle(outcome);
    }

    /// Settles the node as `settlement` says.
    ///
    /// A node told to adopt itself can never settle, so it is abandoned.
    pub(crate) fn apply(self, settlement: Settlement<T, E>) {
        match settlement {
            Settlement::Resolve(value) => self.complete(Ok(value)),
            Settlement::Reject(error) => self.complete(Err(error)),
            Settlement::Adopt(thenable)
                if thenable
                    .as_sync_promise()
                    .is_some_and(|promise| Rc::ptr_eq(&promise.node, &self.node)) =>
            {
                debug!("promise resolved with itself; abandoning it");
                drop(self);
            }
            Settlement::Adopt(thenable) => {
                trace!("bridging node to a nested thenable");
                thenable.subscribe(Box::new(move |outcome| self.complete(outcome)))
            }
        }
    }
}

impl<T, E> Drop for SettleOnce<T, E> {
    fn drop(&mut self) {
        if self.armed {
            self.node.abandon();
        }
    }
}
