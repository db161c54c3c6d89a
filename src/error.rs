/*
 * error.rs
 *
 * Everything that can go wrong, and the exit status each one maps to.
 * 126/127 follow the shell convention for "can't run the arbiter", so init
 * systems and wrappers can tell a bad command line from a crash.
 *
 * Transient pidfile states (missing, half-written) are NOT errors. They
 * live in pidfile::PidRead and get polled away.
 */

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// exit codes. scripts and unit files check these.
pub mod exit_codes {
    /// Arbiter stopped cleanly after SIGTERM/SIGINT
    pub const SUCCESS: u8 = 0;
    /// rainbow-saddle itself failed
    pub const INTERNAL_ERROR: u8 = 1;
    /// Arbiter found but couldn't be executed (permissions)
    pub const CANNOT_INVOKE: u8 = 126;
    /// Arbiter command not found
    pub const NOT_FOUND: u8 = 127;
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid duration: {0}")]
    InvalidDuration(String),
    #[error("invalid duration: negative values not allowed")]
    NegativeDuration,
    #[error("invalid duration: value too large")]
    DurationOverflow,
    #[error("invalid signal: {0}")]
    InvalidSignal(String),
    #[error("missing arbiter command")]
    MissingCommand,
    #[error("command not found: {0}")]
    CommandNotFound(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("argument contains a NUL byte: {0:?}")]
    InvalidArgument(String),
    #[error("path is not valid UTF-8: {}", .0.display())]
    NonUtf8Path(PathBuf),
    #[error("failed to spawn arbiter: errno {0}")]
    Spawn(i32),
    #[error("no such process: {0}")]
    NoSuchProcess(i32),
    #[error("failed to signal pid {pid}: errno {errno}")]
    Signal { pid: i32, errno: i32 },
    #[error("failed to wait for pid {pid}: errno {errno}")]
    Wait { pid: i32, errno: i32 },
    #[error("failed to install signal handlers: errno {0}")]
    SignalSetup(i32),
    #[error("pidfile {}: {source}", path.display())]
    Pidfile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("trace log {}: {source}", path.display())]
    TraceLog {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl SupervisorError {
    /* 126 vs 127 matters to whoever wraps us */
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::CommandNotFound(_) => exit_codes::NOT_FOUND,
            Self::PermissionDenied(_) => exit_codes::CANNOT_INVOKE,
            Self::InvalidDuration(_)
            | Self::NegativeDuration
            | Self::DurationOverflow
            | Self::InvalidSignal(_)
            | Self::MissingCommand
            | Self::InvalidArgument(_)
            | Self::NonUtf8Path(_)
            | Self::Spawn(_)
            | Self::NoSuchProcess(_)
            | Self::Signal { .. }
            | Self::Wait { .. }
            | Self::SignalSetup(_)
            | Self::Pidfile { .. }
            | Self::TraceLog { .. } => exit_codes::INTERNAL_ERROR,
        }
    }

    pub(crate) fn pidfile(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Pidfile {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = core::result::Result<T, SupervisorError>;

/* errno of the last failed libc call on this thread */
#[inline]
pub(crate) fn errno() -> i32 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_failures_map_to_shell_codes() {
        assert_eq!(
            SupervisorError::CommandNotFound("gunicorn".into()).exit_code(),
            exit_codes::NOT_FOUND
        );
        assert_eq!(
            SupervisorError::PermissionDenied("./app".into()).exit_code(),
            exit_codes::CANNOT_INVOKE
        );
        assert_eq!(
            SupervisorError::Spawn(libc::EAGAIN).exit_code(),
            exit_codes::INTERNAL_ERROR
        );
    }

    #[test]
    fn test_pidfile_error_display_includes_path() {
        let err = SupervisorError::pidfile(
            "/run/app.pid",
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        let msg = err.to_string();
        assert!(msg.contains("/run/app.pid"), "message should name the path: {msg}");
    }

    #[test]
    fn test_signal_error_display() {
        let err = SupervisorError::Signal {
            pid: 42,
            errno: libc::EPERM,
        };
        assert!(err.to_string().contains("pid 42"));
    }
}
