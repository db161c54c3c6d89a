/*
 * proc_info.rs
 *
 * What state is a pid in, when we can't waitpid() it?
 *
 * After the first restart the arbiter we track is our grandchild, reparented
 * to init (or a subreaper) once its parent exits. We can't reap it, so we
 * ask: does it still exist, and if so, is it a zombie?
 *
 * kill(pid, 0) answers existence cheaply. Zombie status needs the process
 * table, which sysinfo reads portably (/proc on Linux, libproc on macOS).
 */

use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, ProcessesToUpdate, System, UpdateKind};

use crate::error::errno;

/// Liveness of a process we are not necessarily allowed to reap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Exists and has not exited yet.
    Alive,
    /// Exited, waiting for its parent to reap it. Dead for our purposes.
    Zombie,
    /// No such process (ESRCH).
    Gone,
}

impl ProcessState {
    /* has the process finished running? */
    #[inline]
    #[must_use]
    pub const fn has_exited(self) -> bool {
        matches!(self, Self::Zombie | Self::Gone)
    }
}

/// Cheap existence check via the null signal.
///
/// EPERM means it exists but belongs to someone else - still alive.
#[must_use]
pub fn pid_exists(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    // SAFETY: signal 0 performs permission and existence checks only,
    // nothing is delivered. pid > 0 targets a single process.
    let ret = unsafe { libc::kill(pid, 0) };
    ret == 0 || errno() != libc::ESRCH
}

/// Current state of `pid`, refreshing only that one process entry.
pub fn process_state(system: &mut System, pid: i32) -> ProcessState {
    if !pid_exists(pid) {
        return ProcessState::Gone;
    }

    #[allow(clippy::cast_sign_loss)]
    let target = Pid::from_u32(pid as u32);
    system.refresh_processes(ProcessesToUpdate::Some(&[target]), true);

    match system.process(target) {
        Some(process) if process.status() == ProcessStatus::Zombie => ProcessState::Zombie,
        Some(_) => ProcessState::Alive,
        /* kill() saw it a moment ago; if the table doesn't, it just went away */
        None if pid_exists(pid) => ProcessState::Alive,
        None => ProcessState::Gone,
    }
}

/// One-line description for the trace log: running state and command line.
#[must_use]
pub fn describe_process(pid: i32) -> String {
    let mut system = System::new();
    match process_state(&mut system, pid) {
        ProcessState::Gone => format!("pid {pid}: no such process"),
        state => {
            #[allow(clippy::cast_sign_loss)]
            let target = Pid::from_u32(pid as u32);
            /* the plain refresh skips argv, ask for it explicitly */
            system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[target]),
                true,
                ProcessRefreshKind::nothing().with_cmd(UpdateKind::Always),
            );
            let cmdline = system
                .process(target)
                .map(|p| {
                    p.cmd()
                        .iter()
                        .map(|arg| arg.to_string_lossy().into_owned())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            format!("pid {pid}: {state:?}, cmdline {cmdline:?}")
        }
    }
}
