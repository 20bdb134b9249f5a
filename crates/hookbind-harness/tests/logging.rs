#![forbid(unsafe_code)]

//! Log output of bindings. Kept in its own binary: `traced_test` installs a
//! global subscriber.

use hookbind_harness::{Fixture, Counter};
use hookbind_runtime::{BindingOptions, DebounceInterval};
use tracing_test::traced_test;

#[traced_test]
#[test]
fn refused_mutation_is_logged_as_warning() {
    let fx = Fixture::new(4, Counter::default(), 10);
    assert!(fx.control.call(Counter::RESET, Counter::reset).is_err());
    assert!(logs_contain("direct mutation of a bound control refused"));
    assert!(logs_contain("reset"));
}

#[traced_test]
#[test]
fn commit_and_dispose_are_traced() {
    let fx = Fixture::new(0, Counter::default(), 5);
    fx.control.user_input(|p| p.type_value(3));
    fx.advance(5);
    assert_eq!(fx.cell.get(), 3);
    assert!(logs_contain("committed edit to state"));

    fx.binding.dispose();
    assert!(logs_contain("binding disposed"));
}

#[traced_test]
#[test]
fn rejection_names_the_label() {
    let fx = Fixture::with_options(
        0,
        Counter::default(),
        BindingOptions::new()
            .debounce(DebounceInterval::millis(10))
            .validate(|v: &i64| *v < 10)
            .label("volume"),
    );
    fx.control.user_input(|p| p.type_value(50));
    assert_eq!(fx.control.value(), 0);
    assert!(logs_contain("validation rejected candidate"));
    assert!(logs_contain("volume"));
}
