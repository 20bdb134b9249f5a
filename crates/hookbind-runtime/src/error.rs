#![forbid(unsafe_code)]

//! Error taxonomy for bindings.
//!
//! | Error | Raised by | Recovery |
//! |-------|-----------|----------|
//! | [`BindingError::GuardViolation`] | gated control call outside an update scope | none, programming error |
//! | [`BindingError::ValidationRejected`] | validator refused a candidate | control reverted to committed value |
//! | [`BindingError::DisposedBindingUsed`] | explicit API call after `dispose()` | none |
//! | [`BindingError::ControlAlreadyBound`] | binding a control twice | dispose the first binding |

use crate::reactive::gate::OpId;

/// Errors surfaced by the binding runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindingError {
    /// A gated control operation was called while the trusted guard was
    /// inactive. The control was not touched.
    #[error("gated operation `{0}` called outside the binding's update scope")]
    GuardViolation(OpId),

    /// The validator rejected a control-originated candidate value.
    #[error("value rejected by validator: {reason}")]
    ValidationRejected {
        /// Human-readable rejection reason.
        reason: String,
    },

    /// An explicit operation was attempted on a disposed coordinator.
    #[error("binding has been disposed")]
    DisposedBindingUsed,

    /// The control's mutation gate already trusts another coordinator.
    #[error("control is already bound to another coordinator")]
    ControlAlreadyBound,
}

impl BindingError {
    /// Shorthand for a [`BindingError::ValidationRejected`] with `reason`.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::ValidationRejected {
            reason: reason.into(),
        }
    }

    /// Whether this error is recovered locally (the control was reverted).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ValidationRejected { .. })
    }
}
