#![forbid(unsafe_code)]

//! Property tests: random interleavings of user edits, state changes and
//! time.

use hookbind_harness::{Fixture, NoisyCounter, Counter};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    UserEdit(i64),
    CellSet(i64),
    Advance(u64),
    Settle,
    Flush,
    Invalidate,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0_i64..6).prop_map(Op::UserEdit),
        3 => (0_i64..6).prop_map(Op::CellSet),
        3 => (0_u64..30).prop_map(Op::Advance),
        1 => Just(Op::Settle),
        1 => Just(Op::Flush),
        1 => Just(Op::Invalidate),
    ]
}

fn run<C>(fx: &Fixture<C>, ops: &[Op], edit: impl Fn(&mut C, i64))
where
    C: hookbind_runtime::Control<Value = i64>,
{
    for op in ops {
        match *op {
            Op::UserEdit(v) => {
                fx.control.user_input(|c| edit(c, v));
            }
            Op::CellSet(v) => fx.cell.set(v),
            Op::Advance(ms) => fx.advance(ms),
            Op::Settle => fx.settle(),
            Op::Flush => {
                let _ = fx.binding.flush();
            }
            Op::Invalidate => {
                let _ = fx.binding.invalidate();
            }
        }
    }
    fx.settle();
    fx.advance(1_000);
}

proptest! {
    #[test]
    fn quiet_control_always_converges(ops in prop::collection::vec(op(), 0..60)) {
        let fx = Fixture::new(0, Counter::default(), 10);
        run(&fx, &ops, Counter::type_value);

        prop_assert_eq!(fx.control.value(), fx.cell.get());
        prop_assert!(!fx.binding.has_pending());
        prop_assert_eq!(fx.control.gate().violations(), 0);
        let stats = fx.binding.stats();
        prop_assert_eq!(stats.failed_pushes, 0);
        prop_assert!(stats.commits <= stats.user_edits);
    }

    #[test]
    fn noisy_control_always_converges(ops in prop::collection::vec(op(), 0..60)) {
        let fx = Fixture::new(0, NoisyCounter::default(), 10);
        run(&fx, &ops, NoisyCounter::type_value);

        prop_assert_eq!(fx.control.value(), fx.cell.get());
        prop_assert!(!fx.binding.has_pending());
        let stats = fx.binding.stats();
        prop_assert!(stats.commits <= stats.user_edits);
    }

    #[test]
    fn one_commit_per_burst(gaps in prop::collection::vec(0_u64..25, 1..40)) {
        let fx = Fixture::new(0, Counter::default(), 10);
        for (i, gap) in gaps.iter().enumerate() {
            let value = i64::try_from(i).unwrap() + 1;
            fx.control.user_input(|p| p.type_value(value));
            fx.advance(*gap);
        }
        fx.advance(100);

        let bursts_closed_early = gaps[..gaps.len() - 1].iter().filter(|g| **g >= 10).count();
        let expected = u64::try_from(bursts_closed_early).unwrap() + 1;
        prop_assert_eq!(fx.binding.stats().commits, expected);
        prop_assert_eq!(fx.cell.get(), i64::try_from(gaps.len()).unwrap());
    }
}
