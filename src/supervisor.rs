/*
 * supervisor.rs
 *
 * The state machine. One arbiter at a time, two transitions:
 *
 *   restart:  USR2 -> wait for .oldbin -> TERM old -> wait for old to exit
 *             -> wait for a stable pid in the pidfile -> adopt it
 *   stop:     TERM -> wait for exit -> stopped
 *
 *   Starting -> Running <-> Restarting
 *   Running | Restarting -> Stopping -> Stopped
 *
 * Transitions hold `transition` for their whole run, so two of them never
 * interleave even when the Supervisor is shared across threads. The pid and
 * the stopped flag are atomics so they can be read without that lock.
 *
 * Nothing here has a timeout. If the arbiter never completes its side of the
 * hand-off, restart blocks forever and the old arbiter keeps serving. A stop
 * requested meanwhile waits behind it.
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::config::SupervisorConfig;
use crate::error::{Result, SupervisorError};
use crate::guard::{HandlerOutcome, signal_safe};
use crate::io::banner;
use crate::pidfile::{await_old_pidfile, await_stable_pid};
use crate::proc_info::describe_process;
use crate::process::{arbiter_argv, spawn_command};
use crate::signal::{Signal, send_signal};
use crate::traps::SignalTraps;
use crate::wait::wait_for_exit;

/* tempfile naming for the arbiter's pidfile */
const PIDFILE_PREFIX: &str = "rainbow-saddle-gunicorn-";
const PIDFILE_SUFFIX: &str = ".pid";

/// Lifecycle phase, readable at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Phase {
    Starting = 0,
    Running = 1,
    Restarting = 2,
    Stopping = 3,
    /// Terminal.
    Stopped = 4,
}

impl Phase {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Restarting,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// What an incoming signal asks the supervisor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Restart,
    Stop,
}

impl Transition {
    /* name used in fault reports */
    #[must_use]
    pub const fn handler_name(self) -> &'static str {
        match self {
            Self::Restart => "restart_arbiter",
            Self::Stop => "stop",
        }
    }
}

/// Signal routing for the main loop.
pub const TRANSITIONS: [(Signal, Transition); 3] = [
    (Signal::SIGHUP, Transition::Restart),
    (Signal::SIGTERM, Transition::Stop),
    (Signal::SIGINT, Transition::Stop),
];

#[derive(Debug)]
pub struct Supervisor {
    config: SupervisorConfig,
    pidfile: PathBuf,
    arbiter_pid: AtomicI32,
    stopped: AtomicBool,
    phase: AtomicU8,
    transition: Mutex<()>,
}

/* create the empty pidfile the arbiter will write into, and keep it */
fn create_pidfile(dir: Option<&Path>) -> Result<PathBuf> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(PIDFILE_PREFIX).suffix(PIDFILE_SUFFIX);

    let dir = dir.map_or_else(std::env::temp_dir, Path::to_path_buf);
    let file = builder
        .tempfile_in(&dir)
        .map_err(|e| SupervisorError::pidfile(&dir, e))?;
    let (_, path) = file.keep().map_err(|e| SupervisorError::pidfile(&dir, e.error))?;
    Ok(path)
}

impl Supervisor {
    /// Create the private pidfile and spawn the arbiter.
    ///
    /// # Errors
    /// Pidfile creation or spawn failure. Nothing is retried.
    pub fn start(config: SupervisorConfig) -> Result<Self> {
        if config.command.is_empty() {
            return Err(SupervisorError::MissingCommand);
        }

        let pidfile = create_pidfile(config.pidfile_dir.as_deref())?;
        tracing::debug!(pidfile = %pidfile.display(), "created arbiter pidfile");

        let pidfile_arg = pidfile
            .to_str()
            .ok_or_else(|| SupervisorError::NonUtf8Path(pidfile.clone()))?;
        let argv = arbiter_argv(&config.command, &config.pid_flag, pidfile_arg);
        let child = spawn_command(&argv)?;
        tracing::info!(pid = child.pid(), "started arbiter");

        Ok(Self {
            config,
            pidfile,
            arbiter_pid: AtomicI32::new(child.pid()),
            stopped: AtomicBool::new(false),
            phase: AtomicU8::new(Phase::Running as u8),
            transition: Mutex::new(()),
        })
    }

    #[inline]
    #[must_use]
    pub fn arbiter_pid(&self) -> i32 {
        self.arbiter_pid.load(Ordering::SeqCst)
    }

    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    #[inline]
    #[must_use]
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// The arbiter's pidfile. Kept on disk after we exit.
    #[must_use]
    pub fn pidfile(&self) -> &Path {
        &self.pidfile
    }

    #[must_use]
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn set_phase(&self, phase: Phase) {
        tracing::debug!(?phase, "phase change");
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    /* enter `during`; the guard puts Running back on drop, unwinding included */
    fn enter_phase(&self, during: Phase) -> PhaseGuard<'_> {
        self.set_phase(during);
        PhaseGuard {
            supervisor: self,
            restore: Phase::Running,
        }
    }

    /* a panicked transition leaves nothing half-written behind the lock */
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Graceful hand-off to a new arbiter. Blocks until it completes.
    ///
    /// Ignored after a stop.
    ///
    /// # Errors
    /// Signal delivery or wait failures. The pid is only replaced on success.
    pub fn restart(&self) -> Result<()> {
        let _held = self.lock();
        if self.is_stopped() {
            tracing::info!("restart ignored, supervisor already stopped");
            return Ok(());
        }

        let _phase = self.enter_phase(Phase::Restarting);
        self.hand_off()
    }

    fn hand_off(&self) -> Result<()> {
        let pacing = self.config.pacing;
        let old = self.arbiter_pid();
        tracing::debug!(pid = old, process = %describe_process(old), "restart requested");

        banner("Starting new arbiter");
        send_signal(old, self.config.restart_signal)?;

        await_old_pidfile(&self.pidfile, pacing.pidfile_poll);

        banner(&format!("Stopping old arbiter with PID {old}"));
        self.terminate(old)?;
        let observed = wait_for_exit(old, pacing.exit_poll)?;
        tracing::debug!(pid = old, ?observed, "old arbiter exited");

        let new = await_stable_pid(&self.pidfile, pacing.pidfile_poll);
        self.arbiter_pid.store(new, Ordering::SeqCst);
        banner(&format!("New arbiter PID is {new}"));
        Ok(())
    }

    /* stop signal; a process that is already gone counts as delivered */
    fn terminate(&self, pid: i32) -> Result<()> {
        match send_signal(pid, self.config.stop_signal) {
            Ok(()) => Ok(()),
            Err(SupervisorError::NoSuchProcess(_)) => {
                tracing::debug!(pid, "already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Stop the arbiter and wait for it. Idempotent.
    ///
    /// # Errors
    /// Signal delivery or wait failures; `stopped` stays false.
    pub fn stop(&self) -> Result<()> {
        let _held = self.lock();
        if self.is_stopped() {
            tracing::debug!("stop ignored, already stopped");
            return Ok(());
        }

        let mut phase = self.enter_phase(Phase::Stopping);
        let pid = self.arbiter_pid();
        let observed = self
            .terminate(pid)
            .and_then(|()| wait_for_exit(pid, self.config.pacing.exit_poll))?;

        tracing::info!(pid, ?observed, "arbiter stopped");
        self.stopped.store(true, Ordering::SeqCst);
        phase.restore = Phase::Stopped;
        Ok(())
    }

    /// Run one transition with faults logged and swallowed.
    pub fn apply(&self, transition: Transition) -> HandlerOutcome {
        let name = transition.handler_name();
        match transition {
            Transition::Restart => signal_safe(name, || self.restart())(),
            Transition::Stop => signal_safe(name, || self.stop())(),
        }
    }

    /// Dispatch trapped signals until a stop completes.
    ///
    /// # Errors
    /// Only if polling the trap pipe itself fails.
    pub fn run(&self, traps: &SignalTraps<Transition>) -> Result<()> {
        tracing::debug!(tick = ?self.config.pacing.tick, "entering run loop");
        while !self.is_stopped() {
            if let Some((signal, transition)) = traps.wait(self.config.pacing.tick)? {
                tracing::info!(%signal, ?transition, "signal received");
                let outcome = self.apply(transition);
                tracing::debug!(?transition, ?outcome, "transition finished");
            }
        }
        tracing::debug!("run loop ended");
        Ok(())
    }
}

struct PhaseGuard<'a> {
    supervisor: &'a Supervisor,
    restore: Phase,
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.supervisor.set_phase(self.restore);
    }
}

#[cfg(test)]
#[cfg(not(miri))]
mod tests {
    use super::*;
    use crate::config::Pacing;
    use std::time::{Duration, Instant};

    fn fast() -> Pacing {
        Pacing {
            exit_poll: Duration::from_millis(10),
            pidfile_poll: Duration::from_millis(20),
            tick: Duration::from_millis(50),
        }
    }

    fn config(dir: &Path, command: &[&str]) -> SupervisorConfig {
        SupervisorConfig::new(command.iter().map(|s| (*s).to_string()).collect())
            .with_pacing(fast())
            .with_pidfile_dir(dir)
    }

    #[test]
    fn test_phase_round_trip() {
        for phase in [
            Phase::Starting,
            Phase::Running,
            Phase::Restarting,
            Phase::Stopping,
            Phase::Stopped,
        ] {
            assert_eq!(Phase::from_u8(phase as u8), phase);
        }
    }

    #[test]
    fn test_transition_table() {
        let lookup = |sig| TRANSITIONS.iter().find(|(s, _)| *s == sig).map(|(_, t)| *t);
        assert_eq!(lookup(Signal::SIGHUP), Some(Transition::Restart));
        assert_eq!(lookup(Signal::SIGTERM), Some(Transition::Stop));
        assert_eq!(lookup(Signal::SIGINT), Some(Transition::Stop));
        assert_eq!(lookup(Signal::SIGUSR2), None);
    }

    #[test]
    fn test_start_creates_named_pidfile() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::start(config(dir.path(), &["sh", "-c", "exec sleep 5"])).unwrap();

        let name = sup.pidfile().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(PIDFILE_PREFIX), "{name}");
        assert!(name.ends_with(PIDFILE_SUFFIX), "{name}");
        assert!(sup.pidfile().exists());
        assert_eq!(sup.phase(), Phase::Running);
        assert!(sup.arbiter_pid() > 0);

        sup.stop().unwrap();
        assert!(sup.pidfile().exists(), "pidfile is kept");
    }

    #[test]
    fn test_start_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result = Supervisor::start(config(dir.path(), &["nonexistent_arbiter_12345"]));
        assert!(matches!(result, Err(SupervisorError::CommandNotFound(_))));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_start_in_non_utf8_dir() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let odd = dir.path().join(OsStr::from_bytes(b"pid\xffdir"));
        std::fs::create_dir(&odd).unwrap();

        let result = Supervisor::start(config(&odd, &["true"]));
        let err = result.unwrap_err();
        assert!(matches!(err, SupervisorError::NonUtf8Path(_)), "{err:?}");
        assert!(err.to_string().contains("UTF-8"), "{err}");
    }

    #[test]
    fn test_panicking_transition_restores_phase() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::start(config(dir.path(), &["sh", "-c", "exec sleep 5"])).unwrap();

        let outcome = crate::guard::run_guarded("restart_arbiter", &|| {
            let _phase = sup.enter_phase(Phase::Restarting);
            assert_eq!(sup.phase(), Phase::Restarting);
            panic!("pidfile watcher gave up");
        });
        assert_eq!(outcome, HandlerOutcome::Panicked);
        assert_eq!(sup.phase(), Phase::Running);

        sup.stop().unwrap();
        assert_eq!(sup.phase(), Phase::Stopped);
    }

    #[test]
    fn test_start_empty_command() {
        let result = Supervisor::start(SupervisorConfig::new(Vec::new()));
        assert!(matches!(result, Err(SupervisorError::MissingCommand)));
    }

    #[test]
    fn test_stop_then_restart_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::start(config(dir.path(), &["sh", "-c", "exec sleep 5"])).unwrap();
        let pid = sup.arbiter_pid();

        sup.stop().unwrap();
        assert!(sup.is_stopped());
        assert_eq!(sup.phase(), Phase::Stopped);

        /* would block on .oldbin forever if it weren't ignored */
        let start = Instant::now();
        sup.restart().unwrap();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(sup.arbiter_pid(), pid);
        assert_eq!(sup.phase(), Phase::Stopped);
    }

    #[test]
    fn test_apply_stop_completes() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::start(config(dir.path(), &["sh", "-c", "exec sleep 5"])).unwrap();
        assert_eq!(sup.apply(Transition::Stop), HandlerOutcome::Completed);
        assert!(sup.is_stopped());
    }

    #[test]
    fn test_restart_of_vanished_arbiter_is_a_contained_fault() {
        let dir = tempfile::tempdir().unwrap();
        let sup = Supervisor::start(config(dir.path(), &["true"])).unwrap();
        let pid = sup.arbiter_pid();
        /* reap it so the pid is really gone */
        wait_for_exit(pid, Duration::from_millis(10)).unwrap();

        assert_eq!(sup.apply(Transition::Restart), HandlerOutcome::Failed);
        assert_eq!(sup.arbiter_pid(), pid);
        assert_eq!(sup.phase(), Phase::Running);
        assert!(!sup.is_stopped());
    }
}
