/*
 * main.rs
 *
 * Parse args, set up the trace log and our own pidfile, start the arbiter,
 * loop until stopped. Boring on purpose. The interesting stuff is in
 * supervisor.rs.
 *
 * Order matters a little: traps go in before our pidfile is written and
 * before the arbiter is spawned. Once the pidfile exists, a SIGTERM is
 * queued instead of killing us and orphaning the arbiter.
 */

use core::fmt::Write as FmtWrite;
use std::path::Path;
use std::process::ExitCode;

use rainbow_saddle::args::Args;
use rainbow_saddle::config::SupervisorConfig;
use rainbow_saddle::error::{SupervisorError, exit_codes};
use rainbow_saddle::io::StderrWriter;
use rainbow_saddle::logging::init_trace_log;
use rainbow_saddle::pidfile::OwnPidfile;
use rainbow_saddle::supervisor::{Supervisor, TRANSITIONS};
use rainbow_saddle::traps::SignalTraps;

fn report(err: &SupervisorError) {
    let _ = writeln!(StderrWriter, "rainbow-saddle: {err}");
}

fn main() -> ExitCode {
    let args = Args::parse_args();

    if let Err(e) = init_trace_log(Path::new(&args.trace_log)) {
        /* no trace log is not a reason to refuse to run */
        let _ = writeln!(StderrWriter, "rainbow-saddle: warning: {e}");
    }

    match run(&args) {
        Ok(()) => ExitCode::from(exit_codes::SUCCESS),
        Err(e) => {
            tracing::error!(error = %e, "exiting");
            report(&e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(args: &Args) -> Result<(), SupervisorError> {
    let config = SupervisorConfig::from_args(args)?;

    let traps = SignalTraps::install(&TRANSITIONS)?;

    /* removed when this goes out of scope, after the arbiter is gone */
    let _own_pidfile = args.pid.as_deref().map(OwnPidfile::create).transpose()?;

    let supervisor = Supervisor::start(config)?;
    supervisor.run(&traps)
}
