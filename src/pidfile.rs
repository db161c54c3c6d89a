/*
 * pidfile.rs
 *
 * The arbiter's side of the restart handshake, seen through the filesystem.
 *
 *   <pidfile>         arbiter writes its pid here on start and after hand-off
 *   <pidfile>.oldbin  appears once the successor is up and the old master
 *                     has moved aside
 *
 * Both files belong to the arbiter. We only stat and read them.
 *
 * Reads race with the arbiter's writes: the file can be missing (renamed
 * away), empty (truncated, not yet written), or hold a pid that is about to
 * be replaced. So we poll until two consecutive reads agree. No timeout - if
 * the arbiter never finishes the hand-off, the old one keeps serving and we
 * keep waiting.
 *
 * Also: the supervisor's own optional pidfile, written at startup and
 * removed on drop.
 */

use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::{Result, SupervisorError};
use crate::io::status_line;

/* appended to the pidfile path by the arbiter when it moves aside */
pub const OLD_PIDFILE_SUFFIX: &str = ".oldbin";

/// Outcome of a single pidfile read. Only `Pid` is usable; the other two
/// mean "ask again later".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidRead {
    /// File absent.
    Missing,
    /// File present but not a positive integer (empty, mid-write, garbage).
    Malformed(String),
    Pid(i32),
}

/// `<path>.oldbin` - suffix appended to the whole path, not swapped for the
/// extension, so "app.pid" becomes "app.pid.oldbin".
#[must_use]
pub fn old_pidfile_path(path: &Path) -> PathBuf {
    let mut os: OsString = path.as_os_str().to_owned();
    os.push(OLD_PIDFILE_SUFFIX);
    PathBuf::from(os)
}

/// Parse pidfile contents. Surrounding whitespace is fine, anything else
/// (signs aside) is not a pid.
#[must_use]
pub fn parse_pid(contents: &str) -> PidRead {
    match contents.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => PidRead::Pid(pid),
        _ => PidRead::Malformed(contents.to_string()),
    }
}

/// Read and parse the pidfile once.
#[must_use]
pub fn read_pid(path: &Path) -> PidRead {
    match fs::read_to_string(path) {
        Ok(contents) => parse_pid(&contents),
        Err(e) if e.kind() == io::ErrorKind::NotFound => PidRead::Missing,
        /* permission flaps, EISDIR, bad UTF-8 from a torn write - all retryable */
        Err(e) => PidRead::Malformed(e.to_string()),
    }
}

/// Block until `<path>.oldbin` exists. Content is never read.
pub fn await_old_pidfile(path: &Path, interval: Duration) {
    let marker = old_pidfile_path(path);
    tracing::debug!(marker = %marker.display(), "waiting for old pidfile marker");

    let mut polls: u64 = 0;
    loop {
        match marker.try_exists() {
            Ok(true) => {
                tracing::debug!(polls, "old pidfile marker present");
                return;
            }
            Ok(false) => {}
            Err(e) => {
                /* can't tell - treat as not there yet */
                tracing::debug!(error = %e, "stat of old pidfile marker failed");
            }
        }
        polls += 1;
        thread::sleep(interval);
    }
}

/// Block until the pidfile yields the same pid on two consecutive reads.
pub fn await_stable_pid(path: &Path, interval: Duration) -> i32 {
    await_stable_pid_with(|| read_pid(path), interval, |read| {
        if *read == PidRead::Missing {
            status_line(&format!("pidfile not found: {}", path.display()));
        }
    })
}

/*
 * Debounce loop, separated from the filesystem so the read sequence can be
 * scripted. `on_unready` sees every read that didn't produce a pid.
 *
 * Consecutive means consecutive: a Missing or Malformed read between two
 * equal pids resets the comparison.
 */
pub fn await_stable_pid_with<R, U>(mut read: R, interval: Duration, mut on_unready: U) -> i32
where
    R: FnMut() -> PidRead,
    U: FnMut(&PidRead),
{
    let mut previous: Option<i32> = None;
    loop {
        let current = read();
        match current {
            PidRead::Pid(pid) => {
                if previous == Some(pid) {
                    tracing::debug!(pid, "pidfile stable");
                    return pid;
                }
                tracing::debug!(pid, ?previous, "pidfile read, waiting for confirmation");
                previous = Some(pid);
            }
            ref unready => {
                tracing::debug!(read = ?unready, "pidfile not ready");
                on_unready(unready);
                previous = None;
            }
        }
        thread::sleep(interval);
    }
}

/// rainbow-saddle's own pidfile. Written on creation, removed on drop, so a
/// normal return from main cleans it up.
#[derive(Debug)]
pub struct OwnPidfile {
    path: PathBuf,
}

impl OwnPidfile {
    /// Write `<our pid>\n` to `path`, replacing whatever was there.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut file = fs::File::create(&path).map_err(|e| SupervisorError::pidfile(&path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| SupervisorError::pidfile(&path, e))?;
        tracing::debug!(path = %path.display(), "wrote supervisor pidfile");
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for OwnPidfile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not remove supervisor pidfile");
        }
    }
}
