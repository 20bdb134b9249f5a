#![forbid(unsafe_code)]

//! Control protocol and the gated control wrapper.
//!
//! A concrete control (a text field, a check box, a combo box, ...) implements
//! [`Control`]: it reports the value it displays and applies programmatic
//! writes. It is never handed out mutably on its own; [`GatedControl`] owns it
//! and exposes three doors:
//!
//! - [`read`](GatedControl::read): shared access, never gated.
//! - [`user_input`](GatedControl::user_input): a user interaction. If it
//!   changes the displayed value, user-change listeners fire.
//! - [`call`](GatedControl::call): a programmatic operation, checked by the
//!   [`MutationGate`] when the operation is gated.
//!
//! Listeners always run after the control borrow is released, so a listener
//! may write back into the same control (e.g. to revert a rejected edit).
//! A panicking listener is logged and skipped; the others still run.

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

use super::gate::{MutationGate, OpId};
use crate::error::BindingError;
use crate::panic_message;

/// A control that can be bound to a state cell.
pub trait Control: 'static {
    /// The value the control displays.
    type Value: Clone + PartialEq + Send + Sync + 'static;

    /// Model-mutating operations, besides [`OpId::WRITE`], that must only run
    /// inside the owning coordinator's update scope.
    const GATED_OPS: &'static [OpId] = &[];

    /// Whether programmatic mutations emit change signals, as many toolkits
    /// do. Such signals fire inside the coordinator's guard and are treated
    /// as echoes.
    const EMITS_ON_WRITE: bool = false;

    /// The value currently displayed.
    fn value(&self) -> Self::Value;

    /// Display `value`. Must not emit a user change.
    fn write(&mut self, value: &Self::Value);
}

/// Identifier of a user-change listener.
pub type ListenerId = u64;

type Listener<V> = Rc<dyn Fn(&V)>;

struct GatedInner<C: Control> {
    control: RefCell<C>,
    gate: MutationGate,
    listeners: RefCell<Vec<(ListenerId, Listener<C::Value>)>>,
    next_listener: Cell<ListenerId>,
    emitted: Cell<u64>,
}

/// A control behind a [`MutationGate`]. Cloning shares the same control.
pub struct GatedControl<C: Control> {
    inner: Rc<GatedInner<C>>,
}

impl<C: Control> Clone for GatedControl<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C: Control> GatedControl<C> {
    /// Wrap `control`. Its gate trusts no guard until a coordinator binds it.
    #[must_use]
    pub fn new(control: C) -> Self {
        Self {
            inner: Rc::new(GatedInner {
                control: RefCell::new(control),
                gate: MutationGate::new(C::GATED_OPS.iter().copied()),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(1),
                emitted: Cell::new(0),
            }),
        }
    }

    /// Shared access to the control.
    pub fn read<R>(&self, f: impl FnOnce(&C) -> R) -> R {
        f(&self.inner.control.borrow())
    }

    /// Borrow the control immutably.
    #[must_use]
    pub fn borrow(&self) -> Ref<'_, C> {
        self.inner.control.borrow()
    }

    /// The value currently displayed.
    #[must_use]
    pub fn value(&self) -> C::Value {
        self.inner.control.borrow().value()
    }

    /// The control's mutation gate.
    #[must_use]
    pub fn gate(&self) -> &MutationGate {
        &self.inner.gate
    }

    /// Run a programmatic operation `op` on the control.
    ///
    /// If `C::EMITS_ON_WRITE` is set and the displayed value changed,
    /// listeners fire once the operation completes.
    ///
    /// # Errors
    ///
    /// [`BindingError::GuardViolation`] if `op` is gated and no update scope
    /// of the trusted coordinator is open. `f` does not run in that case.
    pub fn call<R>(&self, op: OpId, f: impl FnOnce(&mut C) -> R) -> Result<R, BindingError> {
        self.inner.gate.check(op)?;
        let (result, changed) = {
            let mut control = self.inner.control.borrow_mut();
            if C::EMITS_ON_WRITE {
                let before = control.value();
                let result = f(&mut control);
                let after = control.value();
                (result, (before != after).then_some(after))
            } else {
                (f(&mut control), None)
            }
        };
        if let Some(value) = changed {
            self.emit(&value);
        }
        Ok(result)
    }

    /// Apply a user interaction. Returns `true` if the displayed value changed
    /// (and listeners fired).
    pub fn user_input(&self, f: impl FnOnce(&mut C)) -> bool {
        let changed = {
            let mut control = self.inner.control.borrow_mut();
            let before = control.value();
            f(&mut control);
            let after = control.value();
            (before != after).then_some(after)
        };
        match changed {
            Some(value) => {
                self.emit(&value);
                true
            }
            None => false,
        }
    }

    /// Register a user-change listener.
    pub fn on_user_change(&self, listener: impl Fn(&C::Value) + 'static) -> ListenerId {
        let id = self.inner.next_listener.get();
        self.inner.next_listener.set(id + 1);
        self.inner
            .listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.inner.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }

    /// Number of change events emitted so far (user and programmatic).
    #[must_use]
    pub fn emitted_changes(&self) -> u64 {
        self.inner.emitted.get()
    }

    /// Whether two handles wrap the same control.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn emit(&self, value: &C::Value) {
        self.inner.emitted.set(self.inner.emitted.get() + 1);
        let listeners: Vec<Listener<C::Value>> = self
            .inner
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        for listener in listeners {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| listener(value))) {
                tracing::error!(
                    panic = %panic_message(payload.as_ref()),
                    "user-change listener panicked"
                );
            }
        }
    }
}

impl<C: Control + fmt::Debug> fmt::Debug for GatedControl<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatedControl")
            .field("control", &*self.inner.control.borrow())
            .field("gate", &self.inner.gate)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::guard::ReentrancyGuard;

    #[derive(Debug, Default)]
    struct Slider {
        pos: i32,
        ticks: Vec<i32>,
    }

    impl Slider {
        const SET_TICKS: OpId = OpId::new("set_ticks");
    }

    impl Control for Slider {
        type Value = i32;
        const GATED_OPS: &'static [OpId] = &[Slider::SET_TICKS];

        fn value(&self) -> i32 {
            self.pos
        }

        fn write(&mut self, value: &i32) {
            self.pos = *value;
        }
    }

    #[derive(Debug, Default)]
    struct Noisy(i32);

    impl Control for Noisy {
        type Value = i32;
        const EMITS_ON_WRITE: bool = true;

        fn value(&self) -> i32 {
            self.0
        }

        fn write(&mut self, value: &i32) {
            self.0 = *value;
        }
    }

    fn recorder<C: Control>(control: &GatedControl<C>) -> Rc<RefCell<Vec<C::Value>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        control.on_user_change(move |v| s.borrow_mut().push(v.clone()));
        seen
    }

    #[test]
    fn user_input_emits_only_on_change() {
        let control = GatedControl::new(Slider::default());
        let seen = recorder(&control);

        assert!(control.user_input(|s| s.pos = 3));
        assert!(!control.user_input(|s| s.pos = 3));
        assert_eq!(*seen.borrow(), vec![3]);
        assert_eq!(control.emitted_changes(), 1);
    }

    #[test]
    fn gated_call_refused_without_guard() {
        let control = GatedControl::new(Slider::default());
        let err = control
            .call(Slider::SET_TICKS, |s| s.ticks = vec![1, 2])
            .unwrap_err();
        assert_eq!(err, BindingError::GuardViolation(Slider::SET_TICKS));
        assert!(control.read(|s| s.ticks.is_empty()));
    }

    #[test]
    fn gated_call_allowed_inside_guard() {
        let control = GatedControl::new(Slider::default());
        let guard = ReentrancyGuard::new();
        control.gate().attach(&guard).unwrap();

        guard
            .run_guarded(|| control.call(OpId::WRITE, |s| s.write(&9)))
            .unwrap();
        assert_eq!(control.value(), 9);
    }

    #[test]
    fn quiet_control_does_not_emit_on_programmatic_write() {
        let control = GatedControl::new(Slider::default());
        let seen = recorder(&control);
        let guard = ReentrancyGuard::new();
        control.gate().attach(&guard).unwrap();
        guard
            .run_guarded(|| control.call(OpId::WRITE, |s| s.write(&4)))
            .unwrap();
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn noisy_control_emits_on_programmatic_write() {
        let control = GatedControl::new(Noisy::default());
        let seen = recorder(&control);
        let guard = ReentrancyGuard::new();
        control.gate().attach(&guard).unwrap();
        guard
            .run_guarded(|| control.call(OpId::WRITE, |c| c.write(&4)))
            .unwrap();
        assert_eq!(*seen.borrow(), vec![4]);
    }

    #[test]
    fn listener_may_write_back_into_control() {
        let control = GatedControl::new(Slider::default());
        let guard = ReentrancyGuard::new();
        control.gate().attach(&guard).unwrap();

        let handle = control.clone();
        let g = guard.clone();
        control.on_user_change(move |v| {
            if *v > 10 {
                g.run_guarded(|| handle.call(OpId::WRITE, |s| s.write(&10)))
                    .unwrap();
            }
        });

        control.user_input(|s| s.pos = 50);
        assert_eq!(control.value(), 10);
    }

    #[test]
    fn panicking_listener_does_not_starve_later_ones() {
        let control = GatedControl::new(Slider::default());
        control.on_user_change(|v| {
            if *v == 7 {
                panic!("listener failed");
            }
        });
        let seen = recorder(&control);

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| control.user_input(|s| s.pos = 7)));
        assert_eq!(result.ok(), Some(true));
        assert_eq!(*seen.borrow(), vec![7]);
        assert_eq!(control.value(), 7);
    }

    #[test]
    fn remove_listener() {
        let control = GatedControl::new(Slider::default());
        let id = control.on_user_change(|_| {});
        assert_eq!(control.listener_count(), 1);
        assert!(control.remove_listener(id));
        assert!(!control.remove_listener(id));
        assert_eq!(control.listener_count(), 0);
    }
}
