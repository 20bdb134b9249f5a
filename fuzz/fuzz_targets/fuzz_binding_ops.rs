#![no_main]

use std::sync::Arc;
use std::time::Duration;

use arbitrary::Arbitrary;
use hookbind_runtime::{
    BindingOptions, Coordinator, DebounceInterval, EventLoop, GatedControl, ManualClock, OpId,
    StateCell,
};
use hookbind_widgets::{ComboBox, ComboBoxOps};
use libfuzzer_sys::fuzz_target;

#[derive(Arbitrary, Debug)]
enum Op {
    SelectIndex(u8),
    SelectNone,
    CellSet(Option<u8>),
    Advance(u8),
    Tick,
    Flush,
    Invalidate,
    DirectAdd(u8),
    ApplyAdd(u8),
    ApplyRemove(u8),
    Dispose,
}

#[derive(Arbitrary, Debug)]
struct Input {
    debounce_ms: u8,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let clock = ManualClock::new();
    let event_loop = EventLoop::with_clock(Arc::new(clock.clone()));
    let cell = StateCell::new(None::<u8>);
    let control = GatedControl::new(ComboBox::new([1_u8, 2, 3]));
    let Ok(binding) = Coordinator::bind(
        &event_loop,
        cell.clone(),
        control.clone(),
        BindingOptions::new().debounce(DebounceInterval::millis(u64::from(input.debounce_ms))),
    ) else {
        return;
    };

    for op in input.ops.iter().take(512) {
        match *op {
            Op::SelectIndex(i) => {
                control.user_input(|c| {
                    c.select_index(usize::from(i));
                });
            }
            Op::SelectNone => {
                control.user_input(ComboBox::select_none);
            }
            Op::CellSet(v) => cell.set(v),
            Op::Advance(ms) => {
                clock.advance(Duration::from_millis(u64::from(ms)));
                event_loop.run_until_idle();
            }
            Op::Tick => {
                event_loop.tick();
            }
            Op::Flush => {
                let _ = binding.flush();
            }
            Op::Invalidate => {
                let _ = binding.invalidate();
            }
            Op::DirectAdd(v) => {
                // Outside the update scope of a bound control this must fail.
                let result = control.add_item(v);
                assert!(binding.is_disposed() || result.is_err());
            }
            Op::ApplyAdd(v) => {
                let _ = binding.apply(ComboBox::<u8>::ADD_ITEM, |c| c.add_item(v));
            }
            Op::ApplyRemove(i) => {
                let _ = binding.apply(ComboBox::<u8>::REMOVE_ITEM, |c| {
                    c.remove_item(usize::from(i))
                });
            }
            Op::Dispose => binding.dispose(),
        }
    }

    event_loop.run_until_idle();
    clock.advance(Duration::from_millis(1_000));
    event_loop.run_until_idle();

    if !binding.is_disposed() {
        assert!(!binding.has_pending());
        assert_eq!(control.value(), cell.get());
        assert!(!binding.is_pushing());
        assert!(control.gate().is_gated(OpId::WRITE));
    }
});
