/*
 * wait.rs
 *
 * Block until a pid has exited. Two paths:
 *
 *   1. waitpid(pid, 0) - works when the arbiter is our direct child, which
 *      is true only for the one we spawned at startup.
 *   2. ECHILD means "not yours to reap": after a restart the arbiter is the
 *      old master's child, reparented elsewhere. Poll its state until it is
 *      gone or a zombie. Someone else will reap it.
 *
 * ECHILD is the POSIX answer for "no such child of the caller" on every
 * Unix we build for, so we key on the constant, not a platform number.
 *
 * No timeout. The next orchestration step is only safe once this returns.
 */

use std::thread;
use std::time::Duration;

use sysinfo::System;

use crate::error::{Result, SupervisorError, errno};
use crate::proc_info::{ProcessState, process_state};

/// How the exit was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitObservation {
    /// We reaped it ourselves; raw waitpid status attached.
    Reaped(i32),
    /// Not our child; it vanished or turned zombie while we polled.
    Vanished(ProcessState),
}

/// Block until `pid` has exited, polling every `interval` when it isn't
/// our child.
///
/// # Errors
/// `Wait` if waitpid fails for a reason other than ECHILD/EINTR (EINVAL,
/// or a pid <= 0 which would mean "any child").
pub fn wait_for_exit(pid: i32, interval: Duration) -> Result<ExitObservation> {
    if pid <= 0 {
        return Err(SupervisorError::Wait {
            pid,
            errno: libc::EINVAL,
        });
    }

    tracing::debug!(pid, "waiting for exit");
    loop {
        let mut status: i32 = 0;
        // SAFETY: pid > 0 so this waits on exactly that process; status is a
        // valid out-pointer.
        let ret = unsafe { libc::waitpid(pid, &raw mut status, 0) };

        if ret == pid {
            tracing::debug!(pid, status, "reaped");
            return Ok(ExitObservation::Reaped(status));
        }
        if ret < 0 {
            match errno() {
                libc::EINTR => continue,
                libc::ECHILD => break,
                err => return Err(SupervisorError::Wait { pid, errno: err }),
            }
        }
        /* ret == 0 only happens with WNOHANG; loop defensively */
    }

    tracing::debug!(pid, "not our child, polling process state");
    poll_until_exited(pid, interval).map(ExitObservation::Vanished)
}

/* fallback path: status polling by pid */
fn poll_until_exited(pid: i32, interval: Duration) -> Result<ProcessState> {
    let mut system = System::new();
    loop {
        let state = process_state(&mut system, pid);
        if state.has_exited() {
            tracing::debug!(pid, ?state, "process exited");
            return Ok(state);
        }
        thread::sleep(interval);
    }
}

#[cfg(test)]
#[cfg(not(miri))]
mod tests {
    use super::*;
    use std::process::Command;
    use std::time::Instant;

    const FAST: Duration = Duration::from_millis(10);

    #[test]
    fn test_reaps_direct_child() {
        let child = Command::new("sh").args(["-c", "sleep 0.1; exit 3"]).spawn().unwrap();
        let pid = child.id() as i32;

        let observed = wait_for_exit(pid, FAST).unwrap();
        match observed {
            ExitObservation::Reaped(status) => {
                assert!(libc::WIFEXITED(status));
                assert_eq!(libc::WEXITSTATUS(status), 3);
            }
            other => panic!("expected Reaped, got {other:?}"),
        }
    }

    #[test]
    fn test_already_gone_returns_immediately() {
        let start = Instant::now();
        let observed = wait_for_exit(99_999_999, Duration::from_secs(10)).unwrap();
        assert_eq!(observed, ExitObservation::Vanished(ProcessState::Gone));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_already_reaped_child_returns_immediately() {
        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();

        let start = Instant::now();
        let observed = wait_for_exit(pid, Duration::from_secs(10)).unwrap();
        assert!(matches!(observed, ExitObservation::Vanished(_)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_polls_grandchild_until_exit() {
        /* sh prints the pid of a backgrounded grandchild and exits; the
         * grandchild is not ours to reap */
        let out = Command::new("sh")
            .args(["-c", "sleep 0.5 >/dev/null 2>&1 & echo $!"])
            .output()
            .unwrap();
        let pid: i32 = String::from_utf8_lossy(&out.stdout).trim().parse().unwrap();

        let start = Instant::now();
        let observed = wait_for_exit(pid, FAST).unwrap();
        assert!(matches!(observed, ExitObservation::Vanished(state) if state.has_exited()));
        assert!(start.elapsed() >= Duration::from_millis(150), "returned before the grandchild exited");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_rejects_wildcard_pids() {
        assert!(matches!(wait_for_exit(0, FAST), Err(SupervisorError::Wait { .. })));
        assert!(matches!(wait_for_exit(-1, FAST), Err(SupervisorError::Wait { .. })));
    }
}
