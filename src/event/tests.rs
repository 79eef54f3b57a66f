use super::*;
use std::cell::RefCell;
use std::rc::Rc;

#[test]
fn test_subscribe_and_dispatch() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut list: EventList<u32> = EventList::new();

    let seen2 = seen.clone();
    list.subscribe(move |v| seen2.borrow_mut().push(*v));

    list.dispatch(&1);
    list.dispatch(&2);
    assert_eq!(*seen.borrow(), vec![1, 2]);
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let seen = Rc::new(RefCell::new(0u32));
    let mut list: EventList<u32> = EventList::new();

    let seen2 = seen.clone();
    let token = list.subscribe(move |_| *seen2.borrow_mut() += 1);

    list.dispatch(&0);
    list.unsubscribe(token);
    list.dispatch(&0);
    assert_eq!(*seen.borrow(), 1);
}

#[test]
fn test_multiple_subscribers_in_order() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let mut list: EventList<()> = EventList::new();

    for id in 0..3 {
        let seen2 = seen.clone();
        list.subscribe(move |_| seen2.borrow_mut().push(id));
    }
    list.dispatch(&());
    assert_eq!(*seen.borrow(), vec![0, 1, 2]);
}

#[test]
fn test_tokens_are_distinct() {
    let mut list: EventList<()> = EventList::new();
    let a = list.subscribe(|_| {});
    let b = list.subscribe(|_| {});
    assert_ne!(a, b);
    list.unsubscribe(a);
    assert_eq!(list.len(), 1);
}
