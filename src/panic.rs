//! Panic hook for backtrace capture.
//!
//! Backtraces are only available while a panic is unwinding, but the
//! manager observes worker panics after the fact through `catch_unwind`.
//! This module installs a chained panic hook that records the message,
//! location and a captured backtrace per thread, so the worker can attach
//! a real stack trace to the failure it stores.
//!
//! The hook is process-global because panic hooks must be `'static`; it
//! is installed once and chains to whatever hook was set before it.

use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::panic::{self, PanicHookInfo};
use std::sync::{Mutex, Once, OnceLock};
use std::thread::{self, ThreadId};

/// Per-thread captures of the most recent panic.
static PANIC_CAPTURES: OnceLock<Mutex<HashMap<ThreadId, CapturedPanic>>> = OnceLock::new();

/// Details recorded by the hook while a panic unwinds.
#[derive(Debug)]
pub struct CapturedPanic {
    /// The panic message, if it was a string payload.
    pub message: String,
    /// `file:line:column` of the panic site, when known.
    pub location: Option<String>,
    /// Backtrace captured inside the hook.
    pub backtrace: Backtrace,
}

/// Installs the capturing panic hook.
///
/// Idempotent; only the first call installs anything. The previous hook
/// keeps running after the capture, so default panic output is preserved.
pub fn init() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let _ = PANIC_CAPTURES.get_or_init(|| Mutex::new(HashMap::new()));
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            record_panic(info);
            previous(info);
        }));
    });
}

/// Takes the capture recorded for the current thread, if any.
///
/// `catch_unwind` returns on the thread the panic unwound on, so calling
/// this right after a catch yields the matching capture.
pub fn take_captured() -> Option<CapturedPanic> {
    let captures = PANIC_CAPTURES.get()?;
    let mut map = captures.lock().ok()?;
    map.remove(&thread::current().id())
}

fn record_panic(info: &PanicHookInfo<'_>) {
    let message = if let Some(msg) = info.payload().downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = info.payload().downcast_ref::<String>() {
        msg.clone()
    } else {
        "panic with non-string payload".to_string()
    };

    let location = info
        .location()
        .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()));

    let captured = CapturedPanic {
        message,
        location,
        backtrace: Backtrace::force_capture(),
    };

    if let Some(captures) = PANIC_CAPTURES.get() {
        if let Ok(mut map) = captures.lock() {
            map.insert(thread::current().id(), captured);
        }
    }
}
