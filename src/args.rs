/*
 * args.rs
 *
 * Clap derive macros handle parsing. Life's too short to do this by hand.
 *
 * Everything here stays a raw string; config.rs turns them into signals and
 * durations so bad values get our own error messages and exit codes.
 *
 * trailing_var_arg grabs everything after ARBITER so
 * `rainbow-saddle gunicorn -w 4 app:wsgi` doesn't try to parse gunicorn's
 * flags.
 */

use clap::Parser;

/* where the trace log goes unless told otherwise */
pub const DEFAULT_TRACE_LOG: &str = "/tmp/rainbow-saddle_debug.log";

#[derive(Parser, Debug)]
#[command(
    name = "rainbow-saddle",
    version,
    about = "Graceful restarts for pre-forking arbiters such as gunicorn",
    long_about = "Start ARBITER with `--pid <tempfile>` appended and keep it running.\n\n\
                  SIGHUP:  ask the arbiter for a graceful hand-off (USR2), wait for the\n\
                  \x20        new master to take over, then retire the old one (TERM).\n\
                  SIGTERM/SIGINT: stop the arbiter and exit.\n\n\
                  The arbiter's pid changes on every restart, which is what breaks\n\
                  supervisord and friends. rainbow-saddle keeps a stable pid for them\n\
                  to watch.\n\n\
                  DURATION is a number with optional suffix:\n\
                  'ms' for milliseconds, 's' for seconds (default), 'm' for minutes,\n\
                  'h' for hours, 'd' for days.",
    after_help = "Exit status:\n\
                  0   if the arbiter was stopped via SIGTERM/SIGINT\n\
                  1   if rainbow-saddle itself fails\n\
                  126 if ARBITER is found but cannot be invoked\n\
                  127 if ARBITER cannot be found"
)]
pub struct Args {
    /// Write rainbow-saddle's own pid to PATH, removed on exit.
    ///
    /// Point your process manager here - unlike the arbiter's pid, this one
    /// survives restarts.
    #[arg(long = "pid", value_name = "PATH", env = "RAINBOW_SADDLE_PID")]
    pub pid: Option<String>,

    /// Append debug traces to PATH.
    #[arg(
        long = "trace-log",
        value_name = "PATH",
        default_value = DEFAULT_TRACE_LOG,
        env = "RAINBOW_SADDLE_TRACE_LOG"
    )]
    pub trace_log: String,

    /// Flag that tells the arbiter where to write its pidfile.
    #[arg(long = "pid-flag", value_name = "FLAG", default_value = "--pid", allow_hyphen_values = true)]
    pub pid_flag: String,

    /// Signal asking the arbiter to fork a successor.
    #[arg(long = "restart-signal", value_name = "SIGNAL", default_value = "USR2")]
    pub restart_signal: String,

    /// Signal asking an arbiter to shut down gracefully.
    #[arg(long = "stop-signal", value_name = "SIGNAL", default_value = "TERM")]
    pub stop_signal: String,

    /// How often to check whether a non-child arbiter has exited.
    #[arg(long = "exit-poll", value_name = "DURATION", default_value = "100ms")]
    pub exit_poll: String,

    /// How often to re-read the pidfile during a restart.
    #[arg(long = "pidfile-poll", value_name = "DURATION", default_value = "300ms")]
    pub pidfile_poll: String,

    /// Idle wake-up interval of the main loop.
    #[arg(long = "tick", value_name = "DURATION", default_value = "1s")]
    pub tick: String,

    /// Arbiter command line.
    #[arg(
        value_name = "ARBITER",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl Args {
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_args() {
        let args = Args::try_parse_from(["rainbow-saddle", "gunicorn", "app:wsgi"]).unwrap();
        assert_eq!(args.command, vec!["gunicorn", "app:wsgi"]);
        assert!(args.pid.is_none());
        assert_eq!(args.pid_flag, "--pid");
        assert_eq!(args.restart_signal, "USR2");
        assert_eq!(args.stop_signal, "TERM");
        assert_eq!(args.exit_poll, "100ms");
        assert_eq!(args.pidfile_poll, "300ms");
        assert_eq!(args.tick, "1s");
    }

    #[test]
    fn test_all_options() {
        let args = Args::try_parse_from([
            "rainbow-saddle",
            "--pid",
            "/run/saddle.pid",
            "--trace-log",
            "/var/log/saddle.log",
            "--pid-flag=-p",
            "--restart-signal",
            "HUP",
            "--stop-signal",
            "QUIT",
            "--exit-poll",
            "50ms",
            "--pidfile-poll",
            "1s",
            "--tick",
            "2s",
            "gunicorn",
            "-w",
            "4",
        ])
        .unwrap();

        assert_eq!(args.pid.as_deref(), Some("/run/saddle.pid"));
        assert_eq!(args.trace_log, "/var/log/saddle.log");
        assert_eq!(args.pid_flag, "-p");
        assert_eq!(args.restart_signal, "HUP");
        assert_eq!(args.stop_signal, "QUIT");
        assert_eq!(args.exit_poll, "50ms");
        assert_eq!(args.pidfile_poll, "1s");
        assert_eq!(args.tick, "2s");
        assert_eq!(args.command, vec!["gunicorn", "-w", "4"]);
    }

    #[test]
    fn test_arbiter_flags_not_parsed_as_ours() {
        /* --pid after ARBITER belongs to the arbiter */
        let args = Args::try_parse_from(["rainbow-saddle", "gunicorn", "--pid", "x", "--tick", "9"]).unwrap();
        assert!(args.pid.is_none());
        assert_eq!(args.tick, "1s");
        assert_eq!(args.command, vec!["gunicorn", "--pid", "x", "--tick", "9"]);
    }

    #[test]
    fn test_double_dash_separator() {
        let args = Args::try_parse_from(["rainbow-saddle", "--", "-weird-name", "arg"]).unwrap();
        assert_eq!(args.command, vec!["-weird-name", "arg"]);
    }

    #[test]
    fn test_missing_command_is_an_error() {
        assert!(Args::try_parse_from(["rainbow-saddle"]).is_err());
        assert!(Args::try_parse_from(["rainbow-saddle", "--pid", "/tmp/x.pid"]).is_err());
    }
}
