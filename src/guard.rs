/*
 * guard.rs
 *
 * Signal handlers must not take the supervisor down. If a restart blows up
 * halfway - kill() fails, a panic somewhere in the pidfile code - the old
 * arbiter is still serving and we still need to be around for the next
 * SIGHUP or SIGTERM.
 *
 * So every transition runs inside signal_safe(): errors and panics are
 * reported once, with the handler's name and a backtrace, and swallowed.
 * The report goes to stderr as well as the trace log; the trace log may not
 * exist at all.
 * Panics need panic=unwind (see Cargo.toml release profile).
 */

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};

use crate::error::Result;
use crate::io::write_stderr;

/// How a guarded handler finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    Completed,
    /// Returned an error; logged and dropped.
    Failed,
    /// Panicked; logged and dropped.
    Panicked,
}

/// Wrap `handler` so that faults are logged and suppressed.
///
/// The returned closure has the same shape as the handler minus the
/// `Result`: it can't fail.
pub fn signal_safe<F>(name: &'static str, handler: F) -> impl Fn() -> HandlerOutcome
where
    F: Fn() -> Result<()>,
{
    move || run_guarded(name, &handler)
}

/// Run `handler` once under the guard.
pub fn run_guarded(name: &str, handler: &dyn Fn() -> Result<()>) -> HandlerOutcome {
    match panic::catch_unwind(AssertUnwindSafe(handler)) {
        Ok(Ok(())) => HandlerOutcome::Completed,
        Ok(Err(err)) => {
            report_fault(name, &err.to_string());
            HandlerOutcome::Failed
        }
        Err(payload) => {
            report_fault(name, panic_message(payload.as_ref()));
            HandlerOutcome::Panicked
        }
    }
}

/* one entry in the trace log, one on stderr */
fn report_fault(name: &str, fault: &str) {
    let backtrace = Backtrace::force_capture();
    tracing::error!(
        handler = name,
        fault,
        "uncaught fault in signal handler {name}\n{backtrace}"
    );
    write_stderr(render_fault(name, fault, &backtrace).as_bytes());
}

/// Operator-facing text for a swallowed handler fault.
#[must_use]
pub fn render_fault(name: &str, fault: &str, backtrace: &dyn Display) -> String {
    format!("uncaught fault in signal handler {name}: {fault}\n{backtrace}\n")
}

/* best-effort text out of a panic payload */
fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}
