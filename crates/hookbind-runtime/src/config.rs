#![forbid(unsafe_code)]

//! Debounce configuration: the process-wide default and per-binding intervals.
//!
//! The process-wide default starts at [`BUILTIN_DEBOUNCE`] (50 ms) unless the
//! `HOOKBIND_DEBOUNCE_MS` environment variable holds a valid millisecond
//! count. It can be changed at runtime with [`set_default_debounce`] or
//! temporarily with [`DebounceOverride`].
//!
//! Bindings pick their interval through [`DebounceInterval`]:
//!
//! - `Default`: read the process-wide default at each proposal.
//! - `Fixed(d)`: always `d`.
//! - `Dynamic(f)`: evaluate `f` at each proposal.
//!
//! A zero interval means "commit synchronously, no coalescing".

use std::env;
use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Built-in default debounce interval.
pub const BUILTIN_DEBOUNCE: Duration = Duration::from_millis(50);

/// Environment variable consulted once for the initial default.
pub const DEBOUNCE_ENV_VAR: &str = "HOOKBIND_DEBOUNCE_MS";

fn global_ms() -> &'static AtomicU64 {
    static DEFAULT_MS: OnceLock<AtomicU64> = OnceLock::new();
    DEFAULT_MS.get_or_init(|| {
        let raw = env::var(DEBOUNCE_ENV_VAR).ok();
        let initial = debounce_from_env(raw.as_deref()).unwrap_or(BUILTIN_DEBOUNCE);
        AtomicU64::new(duration_to_ms(initial))
    })
}

/// Current process-wide default debounce interval.
#[must_use]
pub fn default_debounce() -> Duration {
    Duration::from_millis(global_ms().load(Ordering::Acquire))
}

/// Replace the process-wide default debounce interval.
///
/// Bindings configured with [`DebounceInterval::Default`] observe the new
/// value at their next proposal.
pub fn set_default_debounce(interval: Duration) {
    let ms = duration_to_ms(interval);
    let prev = global_ms().swap(ms, Ordering::AcqRel);
    tracing::debug!(prev_ms = prev, new_ms = ms, "default debounce changed");
}

/// Temporarily replace the default debounce. Dropping the guard restores the
/// previous default.
#[must_use = "dropping this guard restores the previous default"]
pub fn override_default_debounce(interval: Duration) -> DebounceOverride {
    let prev = default_debounce();
    set_default_debounce(interval);
    DebounceOverride { prev }
}

/// RAII guard returned by [`override_default_debounce`].
#[must_use = "dropping this guard restores the previous default"]
#[derive(Debug)]
pub struct DebounceOverride {
    prev: Duration,
}

impl Drop for DebounceOverride {
    fn drop(&mut self) {
        set_default_debounce(self.prev);
    }
}

/// Parse the environment override. Whitespace is trimmed; anything that is
/// not a non-negative integer is ignored.
#[must_use]
pub fn debounce_from_env(raw: Option<&str>) -> Option<Duration> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<u64>().ok().map(Duration::from_millis)
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// How a binding chooses its debounce interval.
#[derive(Clone, Default)]
pub enum DebounceInterval {
    /// Follow the process-wide default.
    #[default]
    Default,
    /// A fixed interval.
    Fixed(Duration),
    /// Evaluated at every proposal.
    Dynamic(Arc<dyn Fn() -> Duration + Send + Sync>),
}

impl DebounceInterval {
    /// A fixed interval in milliseconds.
    #[must_use]
    pub fn millis(ms: u64) -> Self {
        Self::Fixed(Duration::from_millis(ms))
    }

    /// Synchronous commits (no coalescing).
    #[must_use]
    pub fn immediate() -> Self {
        Self::Fixed(Duration::ZERO)
    }

    /// An interval computed by `f` at each proposal.
    pub fn dynamic(f: impl Fn() -> Duration + Send + Sync + 'static) -> Self {
        Self::Dynamic(Arc::new(f))
    }

    /// The interval in effect right now.
    #[must_use]
    pub fn resolve(&self) -> Duration {
        match self {
            Self::Default => default_debounce(),
            Self::Fixed(d) => *d,
            Self::Dynamic(f) => f(),
        }
    }
}

impl From<Duration> for DebounceInterval {
    fn from(d: Duration) -> Self {
        Self::Fixed(d)
    }
}

impl fmt::Debug for DebounceInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::Fixed(d) => f.debug_tuple("Fixed").field(d).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}
