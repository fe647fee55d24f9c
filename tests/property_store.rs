mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::record_changes;
use parking_lot::Mutex;
use uibind::property::{ListenerFn, ObservableValue, Property, WritableValue};
use uibind::{BindingViolation, PropertyError};

#[test]
fn listeners_see_each_change_once() {
    let p = Property::new(0);
    let changes = record_changes(&p);

    p.set(1).unwrap();
    p.set(2).unwrap();

    assert_eq!(*changes.lock(), vec![(0, 1), (1, 2)]);
}

#[test]
fn setting_same_value_twice_fires_once() {
    let p = Property::new(0);
    let changes = record_changes(&p);

    p.set(1).unwrap();
    p.set(1).unwrap();

    assert_eq!(*changes.lock(), vec![(0, 1)]);
}

#[test]
fn listeners_run_in_registration_order() {
    let p = Property::new(0);
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second", "third"] {
        let order = Arc::clone(&order);
        p.add_listener(move |_, _| order.lock().push(tag));
    }

    p.set(5).unwrap();

    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
}

#[test]
fn removed_listener_stops_firing() {
    let p = Property::new(0);
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let id = p.add_listener(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    p.set(1).unwrap();
    assert!(p.remove_listener(id));
    assert!(!p.remove_listener(id));
    p.set(2).unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn listener_id_from_other_property_is_ignored() {
    let a = Property::new(0);
    let b = Property::new(0);
    let id = a.add_listener(|_, _| {});
    b.add_listener(|_, _| {});

    assert!(!b.remove_listener(id));
    assert_eq!(b.listener_count(), 1);
    assert_eq!(a.listener_count(), 1);
}

#[test]
fn bound_property_tracks_source() {
    let a = Property::new(String::from("a"));
    let b = Property::new(String::from("b"));
    let changes = record_changes(&a);

    a.bind(&b).unwrap();
    assert_eq!(a.get(), "b");
    assert!(a.is_bound());

    b.set("x".to_string()).unwrap();
    assert_eq!(a.get(), "x");
    assert_eq!(
        *changes.lock(),
        vec![
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "x".to_string()),
        ]
    );
}

#[test]
fn bind_to_equal_source_fires_nothing() {
    let a = Property::new(3);
    let b = Property::new(3);
    let changes = record_changes(&a);

    a.bind(&b).unwrap();

    assert!(changes.lock().is_empty());
}

#[test]
fn bound_property_rejects_direct_writes() {
    let a = Property::new(0);
    let b = Property::new(1);
    a.bind(&b).unwrap();

    let err = a.set(9).unwrap_err();

    assert_eq!(
        err,
        PropertyError::IllegalBindingState(BindingViolation::WriteToBound)
    );
    assert_eq!(a.get(), 1);
}

#[test]
fn unbind_is_idempotent_and_detaches() {
    let a = Property::new(0);
    let b = Property::new(1);
    a.bind(&b).unwrap();

    a.unbind().unwrap();
    a.unbind().unwrap();
    assert!(!a.is_bound());

    a.set(7).unwrap();
    b.set(2).unwrap();

    assert_eq!(a.get(), 7);
    assert_eq!(b.listener_count(), 0);
}

#[test]
fn unbind_on_unbound_property_is_noop() {
    let a = Property::new(0);
    assert!(a.unbind().is_ok());
}

#[test]
fn self_binding_fails() {
    let a = Property::new(0);
    let err = a.bind(&a.clone()).unwrap_err();
    assert_eq!(
        err,
        PropertyError::IllegalBindingState(BindingViolation::SelfBinding)
    );
    assert!(!a.is_bound());
}

#[test]
fn binding_cycle_is_rejected() {
    let a = Property::new(0);
    let b = Property::new(0);
    let c = Property::new(0);
    b.bind(&a).unwrap();
    c.bind(&b).unwrap();

    let err = a.bind(&c).unwrap_err();

    assert_eq!(
        err,
        PropertyError::IllegalBindingState(BindingViolation::BindingCycle)
    );
    assert!(!a.is_bound());
}

#[test]
fn rebinding_switches_source() {
    let a = Property::new(0);
    let first = Property::new(1);
    let second = Property::new(2);

    a.bind(&first).unwrap();
    a.bind(&second).unwrap();
    assert_eq!(a.get(), 2);
    assert_eq!(first.listener_count(), 0);
    assert!(a.bound_source().unwrap().ptr_eq(&second));

    first.set(10).unwrap();
    assert_eq!(a.get(), 2);
    second.set(20).unwrap();
    assert_eq!(a.get(), 20);
}

#[test]
fn chained_bindings_propagate() {
    let root = Property::new(0);
    let middle = Property::new(0);
    let leaf = Property::new(0);
    middle.bind(&root).unwrap();
    leaf.bind(&middle).unwrap();

    root.set(42).unwrap();

    assert_eq!(middle.get(), 42);
    assert_eq!(leaf.get(), 42);
}

#[test]
fn dropping_dependent_removes_forwarder() {
    let source = Property::new(0);
    {
        let dependent = Property::new(0);
        dependent.bind(&source).unwrap();
        assert_eq!(source.listener_count(), 1);
    }
    assert_eq!(source.listener_count(), 0);
    source.set(1).unwrap();
}

#[test]
fn capability_traits_work_through_trait_objects() {
    let p = Property::new(String::from("hi"));
    let observable: &dyn ObservableValue<String> = &p;
    let writable: &dyn WritableValue<String> = &p;

    let seen = Arc::new(Mutex::new(String::new()));
    let sink = Arc::clone(&seen);
    let listener: ListenerFn<String> =
        Arc::new(move |_: &String, new: &String| *sink.lock() = new.clone());
    let id = observable.add_change_listener(listener);

    writable.set_value("there".to_string()).unwrap();
    assert_eq!(observable.value(), "there");
    assert_eq!(*seen.lock(), "there");
    assert!(observable.remove_change_listener(id));
}

#[test]
fn with_borrows_without_clone() {
    let p = Property::new(vec![1, 2, 3]);
    let sum: i32 = p.with(|values| values.iter().sum());
    assert_eq!(sum, 6);
}
