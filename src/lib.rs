/*
 * lib.rs
 *
 * Exists mostly for testing. Integration tests need our types, doc tests
 * need a lib. You could embed the Supervisor, but the binary is the product.
 */

//! # rainbow-saddle
//!
//! Keeps a pre-forking arbiter (gunicorn and friends) alive across graceful
//! restarts, while presenting one stable pid to whatever supervises us.
//!
//! ## Quick Start
//!
//! ```rust
//! use rainbow_saddle::{parse_duration, parse_signal, signal::Signal};
//! use rainbow_saddle::pidfile::{old_pidfile_path, parse_pid, PidRead};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
//! assert_eq!(parse_signal("USR2").unwrap(), Signal::SIGUSR2);
//! assert_eq!(parse_pid("5678\n"), PidRead::Pid(5678));
//! assert_eq!(
//!     old_pidfile_path(Path::new("/tmp/app.pid")),
//!     Path::new("/tmp/app.pid.oldbin"),
//! );
//! ```

pub mod args;
pub mod config;
pub mod duration;
pub mod error;
pub mod guard;
pub mod io;
pub mod logging;
pub mod pidfile;
pub mod proc_info;
pub mod process;
pub mod signal;
pub mod supervisor;
pub mod traps;
pub mod wait;

pub use args::Args;
pub use config::{Pacing, SupervisorConfig};
pub use duration::parse_duration;
pub use error::{Result, SupervisorError, exit_codes};
pub use guard::{HandlerOutcome, signal_safe};
pub use pidfile::{await_old_pidfile, await_stable_pid};
pub use signal::{parse_signal, send_signal, signal_name};
pub use supervisor::{Phase, Supervisor, TRANSITIONS, Transition};
pub use traps::SignalTraps;
pub use wait::{ExitObservation, wait_for_exit};
