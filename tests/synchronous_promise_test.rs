mod utils;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use synchronous_promise::{Status, SyncPromise};
use utils::init_logger;

type Promise<T> = SyncPromise<T, String>;

fn create_resolved(value: &str) -> Promise<String> {
    Promise::resolve(value.to_string())
}

fn create_rejected(error: &str) -> Promise<String> {
    Promise::reject(error.to_string())
}

fn counter() -> (Rc<Cell<u32>>, impl Fn() + Clone) {
    let calls = Rc::new(Cell::new(0));
    let bump = calls.clone();
    (calls, move || bump.set(bump.get() + 1))
}

fn capture<T: 'static>() -> (Rc<RefCell<Option<T>>>, impl Fn(T) + Clone) {
    let slot: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
    let sink = slot.clone();
    (slot, move |value: T| *sink.borrow_mut() = Some(value))
}

mod then {
    use super::*;

    #[test]
    fn test_brings_the_resolve_value_into_the_first_then() {
        init_logger();
        let (captured, store) = capture();
        create_resolved("123").then(move |data| Ok(store(data)));
        assert_eq!(captured.borrow().as_deref(), Some("123"));
    }

    #[test]
    fn test_calls_catch_when_the_handler_fails() {
        init_logger();
        let (captured, store) = capture();
        create_resolved("123")
            .then(|_| Err::<(), _>("oh noes!".to_string()))
            .catch(move |e| Ok(store(e)));
        assert_eq!(captured.borrow().as_deref(), Some("oh noes!"));
    }

    #[test]
    fn test_resolves_when_the_first_resolution_is_a_resolved_promise() {
        init_logger();
        let (captured, store) = capture();
        Promise::resolve_with(create_resolved("123")).then(move |data| Ok(store(data)));
        assert_eq!(captured.borrow().as_deref(), Some("123"));
    }

    #[test]
    fn test_catches_when_the_first_resolution_is_a_rejected_promise() {
        init_logger();
        let (captured, store) = capture();
        Promise::resolve_with(create_rejected("123")).catch(move |e| {
            store(e);
            Ok(String::new())
        });
        assert_eq!(captured.borrow().as_deref(), Some("123"));
    }

    #[test]
    fn test_runs_a_chain_that_returns_a_promise() {
        init_logger();
        let (captured, store) = capture();
        create_resolved("123")
            .then(|_| create_resolved("abc"))
            .then(move |data| Ok(store(data)));
        assert_eq!(captured.borrow().as_deref(), Some("abc"));
    }

    #[test]
    fn test_runs_a_longer_chain() {
        init_logger();
        let (captured, store) = capture();
        create_resolved("123")
            .then(|_| Ok("456".to_string()))
            .then(|data| create_resolved(&format!("{data}789")))
            .then(|data| Ok(format!("{data}0")))
            .then(move |data| Ok(store(data)));
        assert_eq!(captured.borrow().as_deref(), Some("4567890"));
    }

    #[test]
    fn test_resolves_when_the_setup_routine_resolves_later() {
        init_logger();
        let (captured, store) = capture();
        let deferred = Promise::<String>::unresolved();
        deferred.then(move |data| Ok(store(data)));
        assert!(captured.borrow().is_none());

        deferred.resolve("123".into());
        assert_eq!(captured.borrow().as_deref(), Some("123"));
    }

    #[test]
    fn test_chains_off_one_promise_dispatch_in_order() {
        init_logger();
        let order = Rc::new(RefCell::new(vec![]));
        let deferred = Promise::<u32>::unresolved();
        for n in 0..3 {
            let order = order.clone();
            deferred.then(move |value| Ok(order.borrow_mut().push(value + n)));
        }
        deferred.resolve(10);
        assert_eq!(*order.borrow(), vec![10, 11, 12]);
    }

    #[test]
    fn test_flattens_any_depth_of_nesting() {
        init_logger();
        let nested = Promise::resolve_with(Promise::resolve_with(Promise::resolve_with(
            create_resolved("deep"),
        )));
        assert_eq!(nested.status(), Status::Resolved);
        assert_eq!(nested.value().as_deref(), Some("deep"));
    }
}

mod catch {
    use super::*;

    #[test]
    fn test_called_if_the_initial_reject_is_called() {
        init_logger();
        let (captured, store) = capture();
        create_rejected("123").catch(move |e| {
            store(e);
            Ok(String::new())
        });
        assert_eq!(captured.borrow().as_deref(), Some("123"));
    }

    #[test]
    fn test_called_on_a_delayed_rejection() {
        init_logger();
        let (captured, store) = capture();
        let deferred = Promise::<String>::unresolved();
        deferred.catch(move |e| {
            store(e);
            Ok(String::new())
        });
        assert!(captured.borrow().is_none());

        deferred.reject("123".into());
        assert_eq!(captured.borrow().as_deref(), Some("123"));
    }

    #[test]
    fn test_returns_a_new_promise() {
        init_logger();
        let promise = create_rejected("123");
        let caught = promise.catch(|_| Ok(String::new()));
        assert!(!caught.ptr_eq(&promise));
    }

    #[test]
    fn test_does_not_interfere_with_a_later_then_if_there_is_no_error() {
        init_logger();
        let (calls, bump) = counter();
        let (captured, store) = capture();
        create_resolved("123")
            .catch(move |e| {
                bump();
                Ok(e)
            })
            .then(move |data| Ok(store(data)));
        assert_eq!(calls.get(), 0);
        assert_eq!(captured.borrow().as_deref(), Some("123"));
    }

    #[test]
    fn test_prevents_then_handlers_after_the_error_from_being_called() {
        init_logger();
        let (calls, bump) = counter();
        create_resolved("123")
            .then(|_| Err::<String, _>("foo".to_string()))
            .then(move |data| {
                bump();
                Ok(data)
            });
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_rejection_passes_through_a_then_without_a_reject_handler() {
        init_logger();
        let (handled, bump_handled) = counter();
        let (intermediate, bump_intermediate) = counter();
        let (captured, store) = capture();
        create_resolved("v")
            .then(|_| Err::<String, _>("e".to_string()))
            .then(move |data| {
                bump_intermediate();
                Ok(data)
            })
            .catch(move |e| {
                bump_handled();
                store(e);
                Ok(String::new())
            });
        assert_eq!(intermediate.get(), 0);
        assert_eq!(handled.get(), 1);
        assert_eq!(captured.borrow().as_deref(), Some("e"));
    }

    #[test]
    fn test_unhandled_rejection_surfaces_once_a_handler_attaches() {
        init_logger();
        let tail = create_rejected("late").then(|data| Ok(data.len()));
        assert_eq!(tail.status(), Status::Rejected);

        let (captured, store) = capture();
        tail.catch(move |e| {
            store(e);
            Ok(0)
        });
        assert_eq!(captured.borrow().as_deref(), Some("late"));
    }

    #[test]
    fn test_catch_can_recover_with_a_promise() {
        init_logger();
        let recovered = create_rejected("e").catch(|_| create_resolved("fine"));
        assert_eq!(recovered.value().as_deref(), Some("fine"));
    }
}

mod pause {
    use super::*;

    #[test]
    fn test_returns_the_promise() {
        init_logger();
        let promise = create_resolved("123");
        let result = promise.pause();
        assert!(result.ptr_eq(&promise));
        assert!(promise.is_paused());
    }

    #[test]
    fn test_prevents_resolution_from_continuing_at_that_point() {
        init_logger();
        let (calls, bump) = counter();
        let second = bump.clone();
        create_resolved("123")
            .then(move |_| Ok(bump()))
            .pause()
            .then(move |_| Ok(second()));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_prevents_rejection_from_being_caught_at_that_point() {
        init_logger();
        let (calls, bump) = counter();
        create_rejected("123").pause().catch(move |e| {
            bump();
            Ok(e)
        });
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_prevents_rejection_from_continuing_past_that_point() {
        init_logger();
        let (calls, bump) = counter();
        let later = bump.clone();
        let (captured, store) = capture();
        create_rejected("123")
            .then(move |_| Ok(bump()))
            .catch(move |e| Ok(store(e)))
            .pause()
            .then(move |_| Ok(later()));
        assert_eq!(captured.borrow().as_deref(), Some("123"));
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_settlement_during_pause_is_dispatched_on_resume() {
        init_logger();
        let (captured, store) = capture();
        let deferred = Promise::<String>::unresolved();
        let paused = deferred.pause();
        let tail = paused.catch(move |e| {
            store(e);
            Ok(String::new())
        });

        deferred.reject("while paused".into());
        assert_eq!(deferred.status(), Status::Rejected);
        assert!(captured.borrow().is_none());

        tail.resume();
        assert_eq!(captured.borrow().as_deref(), Some("while paused"));
    }
}

mod resume {
    use super::*;

    #[test]
    fn test_returns_the_promise() {
        init_logger();
        let promise = create_resolved("123").pause();
        let result = promise.resume();
        assert!(result.ptr_eq(&promise));
    }

    #[test]
    fn test_does_not_barf_if_the_promise_is_not_paused() {
        init_logger();
        let promise = create_resolved("123");
        promise.resume();
        assert_eq!(promise.status(), Status::Resolved);
    }

    #[test]
    fn test_resumes_resolution_after_the_last_pause() {
        init_logger();
        let (calls, bump) = counter();
        let second = bump.clone();
        let (captured, store) = capture();
        let promise = create_resolved("123")
            .then(move |_| {
                bump();
                Ok("first".to_string())
            })
            .pause()
            .then(move |data| {
                second();
                store(data);
                Ok(())
            });
        assert_eq!(calls.get(), 1);

        promise.resume();
        assert_eq!(calls.get(), 2);
        assert_eq!(captured.borrow().as_deref(), Some("first"));

        promise.resume();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_resumes_rejection_after_the_last_pause() {
        init_logger();
        let (calls, bump) = counter();
        let (captured, store) = capture();
        let expected = "die, scum!";
        let promise = create_resolved("123")
            .then(move |_| Err::<String, _>(expected.to_string()))
            .pause()
            .then(move |_| Ok(bump()))
            .catch(move |e| Ok(store(e)));
        assert_eq!(calls.get(), 0);
        assert!(captured.borrow().is_none());

        promise.resume();
        assert_eq!(calls.get(), 0);
        assert_eq!(captured.borrow().as_deref(), Some(expected));
    }
}

mod statics {
    use super::*;

    #[test]
    fn test_resolve_returns_a_resolved_promise() {
        init_logger();
        let result = create_resolved("foo");
        assert_eq!(result.status(), Status::Resolved);
        assert_eq!(result.status().to_string(), "resolved");
        let (captured, store) = capture();
        result.then(move |data| Ok(store(data)));
        assert_eq!(captured.borrow().as_deref(), Some("foo"));
    }

    #[test]
    fn test_reject_returns_a_rejected_promise() {
        init_logger();
        let result = create_rejected("moo");
        assert_eq!(result.status().to_string(), "rejected");
        let (captured, store) = capture();
        result.catch(move |e| {
            store(e);
            Ok(String::new())
        });
        assert_eq!(captured.borrow().as_deref(), Some("moo"));
    }

    #[test]
    fn test_unresolved_starts_pending() {
        init_logger();
        let deferred = Promise::<String>::unresolved();
        assert_eq!(deferred.status().to_string(), "pending");
        deferred.resolve("x".into());
        deferred.reject("y".into());
        assert_eq!(deferred.value().as_deref(), Some("x"));
    }

    #[test]
    fn test_all_resolves_with_all_values() {
        init_logger();
        let (captured, store) = capture();
        SyncPromise::all([create_resolved("abc"), create_resolved("123")])
            .then(move |data| Ok(store(data)));
        assert_eq!(
            captured.borrow().clone(),
            Some(vec!["abc".to_string(), "123".to_string()])
        );
    }

    #[test]
    fn test_all_rejects_if_any_promise_rejects() {
        init_logger();
        let (data, store_data) = capture();
        let (error, store_error) = capture();
        SyncPromise::all([create_resolved("abc"), create_rejected("123")])
            .then(move |values| Ok(store_data(values)))
            .catch(move |e| Ok(store_error(e)));
        assert!(data.borrow().is_none());
        assert_eq!(error.borrow().as_deref(), Some("123"));
    }

    #[test]
    fn test_all_reports_the_first_rejection_once() {
        init_logger();
        let (calls, bump) = counter();
        let (error, store) = capture();
        SyncPromise::all([create_rejected("E1"), create_rejected("E2")]).catch(move |e| {
            bump();
            store(e);
            Ok(vec![])
        });
        assert_eq!(calls.get(), 1);
        assert_eq!(error.borrow().as_deref(), Some("E1"));
    }

    #[test]
    fn test_all_of_an_empty_collection_resolves_immediately() {
        init_logger();
        let all = SyncPromise::<Vec<String>, String>::all(Vec::<Promise<String>>::new());
        assert_eq!(all.value(), Some(vec![]));
    }
}

#[test]
fn test_first_settlement_wins() {
    init_logger();
    let promise = Promise::<u32>::new(|resolve, reject| {
        resolve.resolve(1);
        resolve.resolve(2);
        reject.reject("3".into());
    });
    assert_eq!(promise.value(), Some(1));
    assert_eq!(promise.error(), None);
}

#[test]
fn test_settling_from_inside_its_own_continuation_is_ignored() {
    init_logger();
    let (promise, resolver, _) = Promise::<u32>::unresolved().into_parts();
    let again = resolver.clone();
    let tail = promise.then(move |n| {
        again.resolve(n + 100);
        Ok(n)
    });
    resolver.resolve(1);
    assert_eq!(promise.value(), Some(1));
    assert_eq!(tail.value(), Some(1));
}

#[test]
fn test_dropping_a_long_chain() {
    let n = 100_000;
    let mut promise = SyncPromise::<u64, ()>::resolve(0);
    for _ in 0..n {
        promise = promise.then(|v| Ok(v + 1));
    }
    assert_eq!(promise.value(), Some(n));
    drop(promise);
}

#[test]
fn test_dropping_a_paused_chain_frees_its_handlers() {
    init_logger();
    let marker = Rc::new(());
    let held = marker.clone();
    let tail = SyncPromise::<i32, ()>::resolve(1).pause().then(move |v| {
        let _held = &held;
        Ok(v)
    });
    assert_eq!(Rc::strong_count(&marker), 2);
    assert_eq!(tail.status(), Status::Pending);

    drop(tail);
    assert_eq!(Rc::strong_count(&marker), 1);
}

#[test]
fn test_resume_reaches_a_pause_held_only_by_the_tail() {
    init_logger();
    let (calls, count) = counter();
    let tail = Promise::<u32>::resolve(1)
        .then(|n| Ok(n + 1))
        .pause()
        .then(move |n| {
            count();
            Ok(n * 10)
        });
    assert_eq!(calls.get(), 0);

    tail.resume();
    assert_eq!(calls.get(), 1);
    assert_eq!(tail.value(), Some(20));
}
