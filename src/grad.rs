//! Gradient mode.
//!
//! This module holds the switch that decides whether differentiable
//! operations record a backward node. The mode is a thread-local `bool`
//! that starts out enabled on every thread.
//!
//! The mode is never copied onto tensors. An output's `requires_grad` flag
//! is fixed by the mode active *when it was computed*; toggling the mode
//! later does not change tensors that already exist.
//!
//! # Scopes
//!
//! - [`no_grad`] / [`NoGradGuard`] — suspend tracking for a region.
//! - [`enable_grad`] / [`EnableGradGuard`] — force tracking back on inside a
//!   suspended region.
//! - [`set_grad_enabled`] — set the mode explicitly for a region.
//!
//! Every guard remembers the mode it replaced and puts it back on drop, so
//! scopes nest like a stack and are restored during unwinding too.
//!
//! # Example
//!
//! ```
//! use gradmode::grad::{is_grad_enabled, no_grad};
//!
//! assert!(is_grad_enabled());
//! no_grad(|| assert!(!is_grad_enabled()));
//! assert!(is_grad_enabled());
//! ```

use core::cell::Cell;

thread_local! {
    static GRAD_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// Returns whether gradient tracking is enabled on the current thread.
pub fn is_grad_enabled() -> bool {
    GRAD_ENABLED.with(Cell::get)
}

/// Swaps in `enabled` and returns the mode it replaced.
fn replace_mode(enabled: bool) -> bool {
    let prev = GRAD_ENABLED.with(|mode| mode.replace(enabled));
    log::trace!("grad mode {prev} -> {enabled}");
    prev
}

/// Restores the mode that was active when the guard was created.
///
/// Returned by [`set_grad_enabled`]; [`NoGradGuard`] and [`EnableGradGuard`]
/// are thin wrappers around it.
#[must_use = "the previous grad mode is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct GradModeGuard {
    prev: bool,
}

impl GradModeGuard {
    /// The mode that will be restored on drop.
    pub fn prev(&self) -> bool {
        self.prev
    }
}

impl Drop for GradModeGuard {
    fn drop(&mut self) {
        replace_mode(self.prev);
    }
}

/// Sets gradient tracking to `enabled` until the returned guard is dropped.
///
/// # Example
/// ```
/// use gradmode::grad::{is_grad_enabled, set_grad_enabled};
///
/// {
///     let _guard = set_grad_enabled(false);
///     assert!(!is_grad_enabled());
/// }
/// assert!(is_grad_enabled());
/// ```
pub fn set_grad_enabled(enabled: bool) -> GradModeGuard {
    GradModeGuard {
        prev: replace_mode(enabled),
    }
}

/// Disables gradient tracking while alive.
#[must_use = "tracking is re-enabled as soon as the guard is dropped"]
#[derive(Debug)]
pub struct NoGradGuard {
    _inner: GradModeGuard,
}

impl NoGradGuard {
    pub fn new() -> Self {
        Self {
            _inner: set_grad_enabled(false),
        }
    }
}

impl Default for NoGradGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Enables gradient tracking while alive, even inside a [`NoGradGuard`].
#[must_use = "the outer mode is restored as soon as the guard is dropped"]
#[derive(Debug)]
pub struct EnableGradGuard {
    _inner: GradModeGuard,
}

impl EnableGradGuard {
    pub fn new() -> Self {
        Self {
            _inner: set_grad_enabled(true),
        }
    }
}

impl Default for EnableGradGuard {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `f` with gradient tracking disabled and returns its result.
///
/// The previous mode is restored when `f` returns or unwinds.
pub fn no_grad<R>(f: impl FnOnce() -> R) -> R {
    let _guard = NoGradGuard::new();
    f()
}

/// Runs `f` with gradient tracking enabled and returns its result.
pub fn enable_grad<R>(f: impl FnOnce() -> R) -> R {
    let _guard = EnableGradGuard::new();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_by_default() {
        assert!(is_grad_enabled());
    }

    #[test]
    fn no_grad_restores_on_exit() {
        let inner = no_grad(is_grad_enabled);
        assert!(!inner);
        assert!(is_grad_enabled());
    }

    #[test]
    fn nested_scopes_restore_in_order() {
        no_grad(|| {
            assert!(!is_grad_enabled());
            enable_grad(|| {
                assert!(is_grad_enabled());
                no_grad(|| assert!(!is_grad_enabled()));
                assert!(is_grad_enabled());
            });
            assert!(!is_grad_enabled());
        });
        assert!(is_grad_enabled());
    }

    #[test]
    fn guard_records_previous_mode() {
        let outer = set_grad_enabled(false);
        assert!(outer.prev());
        let inner = set_grad_enabled(false);
        assert!(!inner.prev());
        drop(inner);
        assert!(!is_grad_enabled());
        drop(outer);
        assert!(is_grad_enabled());
    }

    #[test]
    fn restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            no_grad(|| panic!("boom"));
        });
        assert!(result.is_err());
        assert!(is_grad_enabled());
    }

    #[test]
    fn mode_is_per_thread() {
        let _guard = NoGradGuard::new();
        let other = std::thread::spawn(is_grad_enabled).join().unwrap();
        assert!(other);
        assert!(!is_grad_enabled());
    }
}
