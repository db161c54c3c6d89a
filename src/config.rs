/*
 * config.rs
 *
 * Typed supervisor settings. Args are strings; this is where they become
 * signals and durations, and where bad ones get rejected before anything
 * is spawned.
 */

use std::path::PathBuf;
use std::time::Duration;

use crate::args::Args;
use crate::duration::parse_duration;
use crate::error::{Result, SupervisorError};
use crate::signal::{Signal, parse_signal};

/// Poll intervals. Defaults suit a real gunicorn; tests shrink them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Between liveness checks of an arbiter we can't waitpid on.
    pub exit_poll: Duration,
    /// Between pidfile reads during a restart.
    pub pidfile_poll: Duration,
    /// Main loop wake-up when no signal arrives.
    pub tick: Duration,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            exit_poll: Duration::from_millis(100),
            pidfile_poll: Duration::from_millis(300),
            tick: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Arbiter argv, without the pid flag.
    pub command: Vec<String>,
    pub pid_flag: String,
    pub restart_signal: Signal,
    pub stop_signal: Signal,
    pub pacing: Pacing,
    /// Where the private pidfile is created. `None` means the system temp dir.
    pub pidfile_dir: Option<PathBuf>,
}

impl SupervisorConfig {
    /// gunicorn defaults for `command`.
    #[must_use]
    pub fn new(command: Vec<String>) -> Self {
        Self {
            command,
            pid_flag: "--pid".to_string(),
            restart_signal: Signal::SIGUSR2,
            stop_signal: Signal::SIGTERM,
            pacing: Pacing::default(),
            pidfile_dir: None,
        }
    }

    /// # Errors
    /// `MissingCommand`, or the parse error of the first bad signal/duration.
    pub fn from_args(args: &Args) -> Result<Self> {
        if args.command.is_empty() {
            return Err(SupervisorError::MissingCommand);
        }
        Ok(Self {
            command: args.command.clone(),
            pid_flag: args.pid_flag.clone(),
            restart_signal: parse_signal(&args.restart_signal)?,
            stop_signal: parse_signal(&args.stop_signal)?,
            pacing: Pacing {
                exit_poll: parse_duration(&args.exit_poll)?,
                pidfile_poll: parse_duration(&args.pidfile_poll)?,
                tick: parse_duration(&args.tick)?,
            },
            pidfile_dir: None,
        })
    }

    #[must_use]
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    #[must_use]
    pub fn with_pidfile_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pidfile_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(argv: &[&str]) -> Args {
        let mut full = vec!["rainbow-saddle"];
        full.extend_from_slice(argv);
        Args::try_parse_from(full).unwrap()
    }

    #[test]
    fn test_defaults_match_gunicorn() {
        let config = SupervisorConfig::from_args(&args(&["gunicorn", "app:wsgi"])).unwrap();
        assert_eq!(config.command, vec!["gunicorn", "app:wsgi"]);
        assert_eq!(config.pid_flag, "--pid");
        assert_eq!(config.restart_signal, Signal::SIGUSR2);
        assert_eq!(config.stop_signal, Signal::SIGTERM);
        assert_eq!(config.pacing, Pacing::default());
        assert!(config.pidfile_dir.is_none());
    }

    #[test]
    fn test_new_equals_parsed_defaults() {
        let parsed = SupervisorConfig::from_args(&args(&["gunicorn"])).unwrap();
        let built = SupervisorConfig::new(vec!["gunicorn".into()]);
        assert_eq!(parsed.pid_flag, built.pid_flag);
        assert_eq!(parsed.restart_signal, built.restart_signal);
        assert_eq!(parsed.stop_signal, built.stop_signal);
        assert_eq!(parsed.pacing, built.pacing);
    }

    #[test]
    fn test_custom_pacing_and_signals() {
        let config = SupervisorConfig::from_args(&args(&[
            "--restart-signal",
            "SIGHUP",
            "--stop-signal",
            "3",
            "--exit-poll",
            "5ms",
            "--pidfile-poll",
            "0.5",
            "--tick",
            "1m",
            "uwsgi",
        ]))
        .unwrap();
        assert_eq!(config.restart_signal, Signal::SIGHUP);
        assert_eq!(config.stop_signal, Signal::SIGQUIT);
        assert_eq!(config.pacing.exit_poll, Duration::from_millis(5));
        assert_eq!(config.pacing.pidfile_poll, Duration::from_millis(500));
        assert_eq!(config.pacing.tick, Duration::from_secs(60));
    }

    #[test]
    fn test_bad_values_rejected() {
        assert!(matches!(
            SupervisorConfig::from_args(&args(&["--restart-signal", "SIGFOO", "x"])),
            Err(SupervisorError::InvalidSignal(_))
        ));
        assert!(matches!(
            SupervisorConfig::from_args(&args(&["--tick", "soon", "x"])),
            Err(SupervisorError::InvalidDuration(_))
        ));
        assert!(SupervisorConfig::from_args(&args(&["--exit-poll", "0", "x"])).is_err());
    }

    #[test]
    fn test_builders() {
        let pacing = Pacing {
            exit_poll: Duration::from_millis(1),
            pidfile_poll: Duration::from_millis(2),
            tick: Duration::from_millis(3),
        };
        let config = SupervisorConfig::new(vec!["x".into()])
            .with_pacing(pacing)
            .with_pidfile_dir("/tmp");
        assert_eq!(config.pacing, pacing);
        assert_eq!(config.pidfile_dir, Some(PathBuf::from("/tmp")));
    }
}
