use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use hymemo::{Blueprint, EvaluatorKind, MemoError, select};

#[derive(Debug)]
struct Person {
    first_name: String,
    last_name: String,
}

impl Person {
    fn new(first_name: &str, last_name: &str) -> Self {
        Person {
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
        }
    }
}

#[test]
fn full_name_is_populated_by_construction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut person = Blueprint::<Person>::attach("Person", select(true));
    person.declare("full_name", move |p| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} {}", p.first_name, p.last_name))
    });

    let joe = person.construct(Person::new("Joe", "Doe")).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1, "computed during construction");
    assert_eq!(
        joe.peek::<String>("full_name").as_deref().map(String::as_str),
        Some("Joe Doe"),
        "slot should be populated before any accessor call"
    );

    assert_eq!(*joe.get::<String>("full_name").unwrap(), "Joe Doe");
    assert_eq!(*joe.get::<String>("full_name").unwrap(), "Joe Doe");
    assert_eq!(calls.load(Ordering::SeqCst), 1, "reads never compute");
}

#[test]
fn every_slot_is_populated_after_construction() {
    let mut person = Blueprint::<Person>::attach("Person", EvaluatorKind::Immutable);
    person
        .declare("full_name", |p| Ok(format!("{} {}", p.first_name, p.last_name)))
        .declare("initials", |p| {
            let first = p.first_name.chars().next().unwrap_or('?');
            let last = p.last_name.chars().next().unwrap_or('?');
            Ok(format!("{first}{last}"))
        })
        .declare("name_length", |p| Ok(p.first_name.len() + p.last_name.len()));

    let joe = person.construct(Person::new("Joe", "Doe")).unwrap();
    assert_eq!(joe.computed(), ["full_name", "initials", "name_length"]);
    assert_eq!(*joe.get::<String>("initials").unwrap(), "JD");
    assert_eq!(*joe.get::<usize>("name_length").unwrap(), 6);
}

#[test]
fn computations_run_in_declaration_order() {
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let mut person = Blueprint::<Person>::attach("Person", EvaluatorKind::Immutable);
    for name in ["c", "a", "b"] {
        let order = Arc::clone(&order);
        person.declare(name, move |_| {
            order.lock().push(name);
            Ok(())
        });
    }

    person.construct(Person::new("Joe", "Doe")).unwrap();
    assert_eq!(*order.lock(), ["c", "a", "b"]);
}

#[test]
fn later_attributes_can_read_earlier_ones() {
    let mut person = Blueprint::<Person>::attach("Person", EvaluatorKind::Immutable);
    person
        .declare("full_name", |p| Ok(format!("{} {}", p.first_name, p.last_name)))
        .declare("greeting", |p| {
            Ok(format!("Hello, {}!", p.get::<String>("full_name")?))
        });

    let joe = person.construct(Person::new("Joe", "Doe")).unwrap();
    assert_eq!(*joe.get::<String>("greeting").unwrap(), "Hello, Joe Doe!");
}

#[test]
fn reading_a_later_attribute_fails_construction() {
    let mut person = Blueprint::<Person>::attach("Person", EvaluatorKind::Immutable);
    person
        .declare("greeting", |p| {
            Ok(format!("Hello, {}!", p.get::<String>("full_name")?))
        })
        .declare("full_name", |p| Ok(format!("{} {}", p.first_name, p.last_name)));

    match person.construct(Person::new("Joe", "Doe")) {
        Err(MemoError::Computation { name, source }) => {
            assert_eq!(name, "greeting");
            let inner = source
                .downcast_ref::<MemoError>()
                .expect("inner error should be a MemoError");
            assert!(inner.is_unset(), "unexpected inner error: {inner}");
        }
        other => panic!("expected construction to fail, got {other:?}"),
    }
}

#[test]
fn failing_computation_aborts_construction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut person = Blueprint::<Person>::attach("Person", EvaluatorKind::Immutable);
    person
        .declare("initial", |p| {
            p.first_name
                .chars()
                .next()
                .ok_or_else(|| "empty first name".into())
        })
        .declare("full_name", move |p| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{} {}", p.first_name, p.last_name))
        });

    let err = person.construct(Person::new("", "Doe")).unwrap_err();
    assert!(err.is_computation(), "unexpected error: {err}");
    assert_eq!(
        calls.load(Ordering::SeqCst),
        0,
        "construction stops at the first failure"
    );

    let joe = person.construct(Person::new("Joe", "Doe")).unwrap();
    assert_eq!(*joe.get::<char>("initial").unwrap(), 'J');
}

#[test]
fn constructed_instance_can_always_be_frozen() {
    let mut person = Blueprint::<Person>::attach("Person", EvaluatorKind::Immutable);
    person.declare("full_name", |p| Ok(format!("{} {}", p.first_name, p.last_name)));

    let joe = person
        .construct(Person::new("Joe", "Doe"))
        .unwrap()
        .freeze()
        .unwrap();
    assert_eq!(*joe.get::<String>("full_name").unwrap(), "Joe Doe");
    assert_eq!(joe.fields().first_name, "Joe");
    assert_eq!(joe.blueprint_name(), "Person");

    fn assert_shareable<S: Send + Sync>(_: &S) {}
    assert_shareable(&joe);

    let shared = Arc::new(joe);
    std::thread::scope(|s| {
        for _ in 0..4 {
            let shared = Arc::clone(&shared);
            s.spawn(move || {
                assert_eq!(*shared.get::<String>("full_name").unwrap(), "Joe Doe");
            });
        }
    });
}

#[test]
fn registry_lists_declarations_in_order() {
    let mut person = Blueprint::<Person>::attach("Person", EvaluatorKind::Immutable);
    person
        .declare("a", |_| Ok(1u8))
        .declare("b", |_| Ok(2u8))
        .declare("c", |_| Ok(3u8));

    assert_eq!(person.list_declared(), ["a", "b", "c"]);
}

#[test]
fn redeclaration_wins_during_construction() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let mut person = Blueprint::<Person>::attach("Person", EvaluatorKind::Immutable);
    person
        .declare("full_name", move |p| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("{} {}", p.first_name, p.last_name))
        })
        .declare("initial", |p| Ok(p.first_name.chars().next()))
        .declare("full_name", |p| Ok(format!("{}, {}", p.last_name, p.first_name)));

    assert_eq!(person.list_declared(), ["full_name", "initial"]);
    let joe = person.construct(Person::new("Joe", "Doe")).unwrap();
    assert_eq!(joe.computed(), ["full_name", "initial"]);
    assert_eq!(*joe.get::<String>("full_name").unwrap(), "Doe, Joe");
    assert_eq!(
        calls.load(Ordering::SeqCst),
        0,
        "the replaced computation never runs"
    );
}
