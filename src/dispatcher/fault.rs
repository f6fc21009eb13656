//! Failure capture for the dispatch boundary.
//!
//! Panics are caught with `catch_unwind`, but by the time the unwind returns the panicking
//! frame is gone. A process-wide panic hook records the location and backtrace on the
//! panicking thread while a dispatch is in progress; other panics go to the previous hook.

use std::any::{type_name, Any};
use std::backtrace::{Backtrace, BacktraceStatus};
use std::cell::{Cell, RefCell};
use std::error::Error as StdError;
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::Once;

use crate::app::DefinitionError;
use crate::config::ConfigError;
use crate::order::OrderingError;
use crate::router::RouteError;

thread_local! {
    static CAPTURE_DEPTH: Cell<usize> = const { Cell::new(0) };
    static LAST_PANIC: RefCell<Option<PanicSite>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

struct PanicSite {
    location: String,
    backtrace: String,
}

/// A panic caught at the dispatch boundary.
#[derive(Debug, Clone)]
pub(crate) struct CaughtPanic {
    pub(crate) message: String,
    /// `file:line:column` of the `panic!` call
    pub(crate) location: Option<String>,
    /// Taken inside the hook, so it starts at the panicking frame
    pub(crate) backtrace: Option<String>,
}

struct DepthGuard;

impl DepthGuard {
    fn enter() -> Self {
        CAPTURE_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        CAPTURE_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURE_DEPTH.with(Cell::get) == 0 {
                previous(info);
                return;
            }
            let site = PanicSite {
                location: info
                    .location()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string),
                backtrace: Backtrace::force_capture().to_string(),
            };
            LAST_PANIC.with(|slot| {
                if let Ok(mut slot) = slot.try_borrow_mut() {
                    *slot = Some(site);
                }
            });
        }));
    });
}

/// Run `f`, turning a panic into a [`CaughtPanic`] with its origin.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, CaughtPanic> {
    install_hook();
    let _depth = DepthGuard::enter();
    LAST_PANIC.with(|slot| slot.borrow_mut().take());
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let site = LAST_PANIC.with(|slot| slot.borrow_mut().take());
        CaughtPanic {
            message: panic_message(payload.as_ref()),
            location: site.as_ref().map(|s| s.location.clone()),
            backtrace: site.map(|s| s.backtrace),
        }
    })
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn named<T: StdError + 'static>(root: &(dyn StdError + 'static)) -> Option<&'static str> {
    root.is::<T>().then(type_name::<T>)
}

/// Type of the innermost error in the chain, for the error log.
///
/// Ad hoc `anyhow!` messages have no public type and are reported as `anyhow::Error`.
pub(crate) fn error_class(err: &anyhow::Error) -> &'static str {
    let root = err.root_cause();
    named::<std::io::Error>(root)
        .or_else(|| named::<serde_json::Error>(root))
        .or_else(|| named::<serde_yaml::Error>(root))
        .or_else(|| named::<std::num::ParseIntError>(root))
        .or_else(|| named::<std::str::Utf8Error>(root))
        .or_else(|| named::<std::string::FromUtf8Error>(root))
        .or_else(|| named::<ConfigError>(root))
        .or_else(|| named::<RouteError>(root))
        .or_else(|| named::<OrderingError>(root))
        .or_else(|| named::<DefinitionError>(root))
        .unwrap_or("anyhow::Error")
}

/// The error's backtrace when one was captured (`RUST_BACKTRACE` or `RUST_LIB_BACKTRACE`).
pub(crate) fn error_backtrace(err: &anyhow::Error) -> Option<String> {
    let backtrace = err.backtrace();
    (backtrace.status() == BacktraceStatus::Captured).then(|| backtrace.to_string())
}
