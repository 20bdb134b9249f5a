#![forbid(unsafe_code)]

//! Integration tests: producers on other threads.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use hookbind_harness::{Fixture, NotificationLog, Counter};
use hookbind_runtime::{
    BindingOptions, Coordinator, DebounceInterval, EventLoop, GatedControl, StateCell,
};
use hookbind_widgets::TextEntry;

#[test]
fn background_sets_are_applied_on_loop_thread() {
    let fx = Fixture::new(0, Counter::default(), 10);
    let cell = fx.cell.clone();
    let producer = thread::spawn(move || {
        for v in 1..=100 {
            cell.set(v);
        }
    });
    producer.join().unwrap();

    assert_eq!(fx.control.value(), 0);
    fx.settle();
    assert_eq!(fx.control.value(), 100);
    assert_eq!(fx.binding.stats().commits, 0);
}

#[test]
fn concurrent_producers_converge_to_cell_value() {
    let fx = Fixture::new(0, Counter::default(), 10);
    let log = NotificationLog::attach(&fx.cell);
    let producers: Vec<_> = (0..4)
        .map(|t| {
            let cell = fx.cell.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    cell.set(t * 1_000 + i);
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    fx.settle();

    let last = *log.values().last().unwrap();
    assert_eq!(fx.cell.get(), last);
    assert_eq!(fx.control.value(), fx.cell.get());
}

#[test]
fn run_for_wakes_on_background_set() {
    let event_loop = EventLoop::new();
    let cell = StateCell::new(String::new());
    let control = GatedControl::new(TextEntry::default());
    let _binding = Coordinator::bind(
        &event_loop,
        cell.clone(),
        control.clone(),
        BindingOptions::new().debounce(DebounceInterval::millis(20)),
    )
    .unwrap();

    let producer = {
        let cell = cell.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            cell.set(String::from("from worker"));
        })
    };
    event_loop.run_for(Duration::from_millis(100));
    producer.join().unwrap();
    event_loop.run_until_idle();

    assert_eq!(control.value(), "from worker");
}

#[test]
fn invoke_marshals_closure_onto_loop() {
    let event_loop = EventLoop::new();
    let handle = event_loop.handle();
    let ran = Arc::new(AtomicUsize::new(0));

    let worker = {
        let ran = Arc::clone(&ran);
        thread::spawn(move || {
            assert!(handle.invoke(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            }));
        })
    };
    worker.join().unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 0);

    event_loop.run_until_idle();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[test]
fn dispose_races_with_background_producer() {
    let fx = Fixture::new(0, Counter::default(), 10);
    let cell = fx.cell.clone();
    let producer = thread::spawn(move || {
        for v in 1..=1_000 {
            cell.set(v);
        }
    });
    fx.settle();
    fx.binding.dispose();
    let frozen = fx.control.value();
    producer.join().unwrap();
    fx.settle();

    assert_eq!(fx.control.value(), frozen);
    assert_eq!(fx.cell.get(), 1_000);
}
