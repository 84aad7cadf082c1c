//! Store integration tests
//!
//! Drive a real `Store` through dispatch sequences and compare what
//! subscribers see against the pure reducer.

use std::sync::{Arc, Mutex};

use libviewstate::config::StoreConfig;
use libviewstate::store::{derive, reduce, Action, DerivedContext, Store, StoreState};
use libviewstate::types::{AuthInfo, User};
use serde_json::json;

fn user_u() -> User {
    User {
        uid: 1,
        login: "u".to_string(),
        betas: vec!["code-intel".to_string()],
        beta_registered: true,
    }
}

fn record_contexts(store: &Store) -> (libviewstate::Subscription, Arc<Mutex<Vec<DerivedContext>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = store.subscribe(move |context| sink.lock().unwrap().push(context.clone()));
    (subscription, seen)
}

#[test]
fn test_sign_in_scenario() {
    let store = Store::default();
    let (_subscription, seen) = record_contexts(&store);

    store.dispatch(Action::set_active_token(None));
    assert_eq!(store.context(), DerivedContext::default());

    store.dispatch(Action::set_active_token(Some("t")));
    assert_eq!(
        store.context(),
        DerivedContext {
            auth_info: None,
            user: None,
            signed_in: true,
        }
    );

    store.dispatch(Action::fetched_auth_info("t", AuthInfo::new(1, "u")));
    store.dispatch(Action::fetched_user(1, Some(user_u())));
    assert_eq!(
        store.context(),
        DerivedContext {
            auth_info: Some(AuthInfo::new(1, "u")),
            user: Some(user_u()),
            signed_in: true,
        }
    );

    store.dispatch(Action::fetched_auth_info("t", AuthInfo::default()));
    assert!(!store.context().signed_in);
    assert_eq!(store.context(), DerivedContext::default());

    // initial, signed in, auth info, user, empty auth info
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 5);
    assert_eq!(seen.first(), Some(&DerivedContext::default()));
    assert_eq!(seen.last(), Some(&DerivedContext::default()));
}

#[test]
fn test_replay_matches_reducer_fold() {
    let actions = vec![
        Action::set_active_token(Some("a")),
        Action::fetched_auth_info("a", AuthInfo::new(1, "ada")),
        Action::set_active_token(Some("b")),
        Action::fetched_user(1, Some(User::new(1, "ada"))),
        Action::fetched_auth_info("a", AuthInfo::new(9, "late")),
        Action::Unrecognized,
        Action::fetched_auth_info("b", AuthInfo::new(2, "bob")),
        Action::fetched_user(2, None),
        Action::set_active_token(None),
        Action::set_active_token(Some("a")),
    ];

    let store = Store::default();
    for (i, action) in actions.iter().enumerate() {
        store.dispatch(action.clone());

        let folded = actions[..=i]
            .iter()
            .fold(StoreState::new(), |state, action| reduce(state, action));
        assert_eq!(store.context(), derive(&folded), "after action {}", i);
    }

    // The store also applied reconciliation follow-ups; folding its own
    // history reproduces its state exactly.
    let replayed = store
        .history()
        .iter()
        .fold(StoreState::new(), |state, record| reduce(state, &record.action));
    assert_eq!(&replayed, store.state().as_ref());
}

#[test]
fn test_signed_in_follows_latest_token_action() {
    let store = Store::default();

    store.dispatch(Action::set_active_token(Some("a")));
    assert!(store.context().signed_in);

    store.dispatch(Action::WantUser { uid: 3 });
    store.dispatch(Action::FetchFailed {
        resource: libviewstate::store::Resource::User { uid: 3 },
        message: "Transport error: reset".to_string(),
    });
    assert!(store.context().signed_in);

    store.dispatch(Action::set_active_token(None));
    assert!(!store.context().signed_in);
}

#[test]
fn test_unknown_kind_from_json_is_a_noop() {
    let store = Store::default();
    store.dispatch(Action::set_active_token(Some("t")));
    let state_before = store.state();
    let context_before = store.context();

    let action: Action = serde_json::from_value(json!({"kind": "open_panel", "panel": "refs"})).unwrap();
    store.dispatch(action);

    assert_eq!(store.state().as_ref(), state_before.as_ref());
    assert_eq!(store.context(), context_before);
}

#[test]
fn test_stale_token_answer_never_reaches_context() {
    let store = Store::default();
    store.dispatch(Action::set_active_token(Some("old")));
    store.dispatch(Action::set_active_token(Some("new")));

    store.dispatch(Action::fetched_auth_info("old", AuthInfo::new(1, "old-user")));
    assert_eq!(store.context().auth_info, None);
    assert!(store.context().signed_in);

    store.dispatch(Action::fetched_auth_info("new", AuthInfo::new(2, "new-user")));
    assert_eq!(store.context().auth_info, Some(AuthInfo::new(2, "new-user")));
}

#[test]
fn test_want_auth_info_requested_once_per_token() {
    let store = Store::default();
    store.dispatch(Action::set_active_token(Some("t")));
    store.dispatch(Action::set_active_token(Some("t")));
    store.dispatch(Action::Unrecognized);

    let wants = store
        .history()
        .iter()
        .filter(|record| matches!(record.action, Action::WantAuthInfo { .. }))
        .count();
    assert_eq!(wants, 1);
}

#[test]
fn test_history_limit_drops_oldest() {
    let store = Store::new(&StoreConfig {
        event_capacity: 16,
        history_limit: 3,
    });
    for _ in 0..5 {
        store.dispatch(Action::Unrecognized);
    }
    store.dispatch(Action::set_active_token(None));

    let history = store.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history.last().unwrap().action, Action::set_active_token(None));
    assert!(history.windows(2).all(|pair| pair[0].seq < pair[1].seq));
}

#[test]
fn test_listener_dispatch_is_queued_not_recursive() {
    let store = Store::default();
    let inner = store.clone();
    let depth = Arc::new(Mutex::new(0usize));
    let max_depth = Arc::new(Mutex::new(0usize));
    let (d, m) = (Arc::clone(&depth), Arc::clone(&max_depth));

    let _subscription = store.subscribe(move |context| {
        let mut current = d.lock().unwrap();
        *current += 1;
        let mut max = m.lock().unwrap();
        *max = (*max).max(*current);
        drop(max);
        drop(current);

        if context.signed_in && context.auth_info.is_none() {
            inner.dispatch(Action::fetched_auth_info("t", AuthInfo::new(1, "u")));
        }

        *d.lock().unwrap() -= 1;
    });

    store.dispatch(Action::set_active_token(Some("t")));

    assert_eq!(*max_depth.lock().unwrap(), 1);
    assert_eq!(store.context().auth_info, Some(AuthInfo::new(1, "u")));
}

#[test]
fn test_dropped_subscription_stops_notifications() {
    let store = Store::default();
    let (subscription, seen) = record_contexts(&store);
    assert_eq!(store.listener_count(), 1);

    drop(subscription);
    assert_eq!(store.listener_count(), 0);

    store.dispatch(Action::set_active_token(Some("t")));
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[test]
fn test_store_usable_after_listener_panic() {
    let store = Store::default();
    let subscription = store.subscribe(|context| {
        if context.signed_in {
            panic!("listener failed");
        }
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        store.dispatch(Action::set_active_token(Some("t")));
    }));
    assert!(result.is_err());
    assert_eq!(store.state().active_token.as_deref(), Some("t"));

    drop(subscription);
    store.dispatch(Action::set_active_token(None));
    assert_eq!(store.state().active_token, None);
    assert_eq!(store.context(), DerivedContext::default());

    // the follow-up queued before the panic was drained by the next cycle
    let kinds: Vec<&str> = store.history().iter().map(|r| r.action.kind()).collect();
    assert_eq!(kinds, vec!["set_active_token", "want_auth_info", "set_active_token"]);
}

#[test]
fn test_dispatch_from_other_thread_applied_on_return() {
    let store = Store::default();
    let (started_tx, started_rx) = std::sync::mpsc::channel::<()>();
    let started_tx = Mutex::new(Some(started_tx));

    let _subscription = store.subscribe(move |context| {
        if context.signed_in {
            if let Some(tx) = started_tx.lock().unwrap().take() {
                tx.send(()).unwrap();
                // keep the cycle running while the other thread dispatches
                std::thread::sleep(std::time::Duration::from_millis(50));
            }
        }
    });

    let other = store.clone();
    let dispatcher = std::thread::spawn(move || {
        started_rx.recv().unwrap();
        other.dispatch(Action::set_active_token(Some("x")));
        other.state().active_token.clone()
    });

    store.dispatch(Action::set_active_token(Some("a")));
    let seen_on_return = dispatcher.join().unwrap();

    assert_eq!(seen_on_return.as_deref(), Some("x"));
    assert_eq!(store.state().active_token.as_deref(), Some("x"));
    assert!(store.state().pending_auth_info.contains("x"));
}
