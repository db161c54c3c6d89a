/*
 * traps.rs
 *
 * Self-pipe trick for SIGHUP/SIGTERM/SIGINT.
 *
 * A restart blocks for seconds (pidfile polling, waiting for the old master
 * to drain). None of that is legal inside a real signal handler, so the
 * handler only writes the signal number to a pipe. The main loop polls the
 * read end with the idle tick as timeout, and runs the matching transition
 * on the main thread.
 *
 * Side effect we rely on: transitions never overlap. A SIGTERM during a
 * restart sits in the pipe until the restart returns.
 *
 * Both fds are CLOEXEC - the arbiter must not inherit them.
 */

use core::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use crate::error::{Result, SupervisorError, errno};
use crate::signal::Signal;

type RawFd = i32;

/* Write end for the async handler; -1 when no traps are installed. */
static SIGNAL_WRITE_FD: AtomicI32 = AtomicI32::new(-1);

/* Minimal signal handler - write the signal number to the pipe */
extern "C" fn on_signal(sig: i32) {
    let fd = SIGNAL_WRITE_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        /* write() clobbers errno; the interrupted code may be about to read it */
        let saved = errno();
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let byte: u8 = sig as u8;
        // SAFETY: fd was set by SignalTraps::install and stays open until the
        // traps are dropped (which resets handlers first). write() with a
        // 1-byte buffer is async-signal-safe. A full pipe just drops the byte.
        unsafe {
            let _ = libc::write(fd, (&raw const byte).cast(), 1);
        }
        set_errno(saved);
    }
}

#[cfg(target_os = "linux")]
fn set_errno(value: i32) {
    // SAFETY: __errno_location returns this thread's errno slot
    unsafe { *libc::__errno_location() = value };
}

#[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
fn set_errno(value: i32) {
    // SAFETY: __error returns this thread's errno slot
    unsafe { *libc::__error() = value };
}

#[cfg(not(any(
    target_os = "linux",
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd"
)))]
fn set_errno(_value: i32) {}

/* make an fd nonblocking + close-on-exec */
fn configure_fd(fd: RawFd) -> Result<()> {
    // SAFETY: fd is a valid descriptor fresh from pipe(). fcntl with
    // F_GETFL/F_SETFL/F_SETFD only alters flags on that fd.
    #[allow(clippy::multiple_unsafe_ops_per_block)]
    let ok = unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        flags >= 0
            && libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) >= 0
            && libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) >= 0
    };
    if ok {
        Ok(())
    } else {
        Err(SupervisorError::SignalSetup(errno()))
    }
}

fn close_fd(fd: RawFd) {
    // SAFETY: fd came from pipe() and is closed exactly once by its owner
    unsafe {
        libc::close(fd);
    }
}

/* install `handler` (or SIG_DFL) for one signal */
fn set_disposition(signal: Signal, handler: libc::sighandler_t) -> Result<()> {
    // SAFETY: sigaction struct is zeroed then filled in; sigemptyset and
    // sigaction are standard POSIX calls with valid pointers. The handler is
    // either SIG_DFL or an extern "C" fn(i32) that only touches atomics and
    // write(). Ops share the invariant of a fully initialized sigaction.
    #[allow(clippy::multiple_unsafe_ops_per_block)]
    let ret = unsafe {
        let mut sa: libc::sigaction = core::mem::zeroed();
        sa.sa_sigaction = handler;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(signal.as_raw(), &raw const sa, core::ptr::null_mut())
    };
    if ret == 0 {
        Ok(())
    } else {
        Err(SupervisorError::SignalSetup(errno()))
    }
}

/* poll() takes whole ms; round up so a sub-ms tick still sleeps */
fn poll_timeout_ms(timeout: Duration) -> i32 {
    i32::try_from(timeout.as_nanos().div_ceil(1_000_000)).unwrap_or(i32::MAX)
}

/// Installed traps. Dropping them restores default dispositions and closes
/// the pipe.
///
/// Process-global: only one `SignalTraps` can exist at a time.
#[derive(Debug)]
pub struct SignalTraps<T: Copy> {
    read_fd: RawFd,
    write_fd: RawFd,
    table: Vec<(Signal, T)>,
}

impl<T: Copy> SignalTraps<T> {
    /// Route each listed signal to its tag. `T` is whatever the caller
    /// dispatches on.
    ///
    /// # Errors
    /// `SignalSetup` if traps are already installed or a syscall fails.
    pub fn install(table: &[(Signal, T)]) -> Result<Self> {
        let mut fds = [0i32; 2];
        // SAFETY: fds is a valid 2-element array, pipe() writes exactly 2 fds
        if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
            return Err(SupervisorError::SignalSetup(errno()));
        }
        let [read_fd, write_fd] = fds;

        if let Err(e) = configure_fd(read_fd).and_then(|()| configure_fd(write_fd)) {
            close_fd(read_fd);
            close_fd(write_fd);
            return Err(e);
        }

        /* claim the global slot before any handler can fire */
        if SIGNAL_WRITE_FD
            .compare_exchange(-1, write_fd, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            close_fd(read_fd);
            close_fd(write_fd);
            return Err(SupervisorError::SignalSetup(libc::EBUSY));
        }

        let traps = Self {
            read_fd,
            write_fd,
            table: table.to_vec(),
        };

        for (signal, _) in table {
            /* on failure, drop(traps) undoes what was installed so far */
            set_disposition(*signal, on_signal as *const () as libc::sighandler_t)?;
            tracing::debug!(%signal, "trap installed");
        }

        Ok(traps)
    }

    /* map a caught signal back to its tag */
    fn lookup(&self, raw: i32) -> Option<T> {
        self.table
            .iter()
            .find(|(signal, _)| signal.as_raw() == raw)
            .map(|(_, tag)| *tag)
    }

    /// Wait up to `timeout` for a trapped signal.
    ///
    /// `Ok(None)` on timeout or EINTR - the caller re-checks its own state
    /// and comes back.
    pub fn wait(&self, timeout: Duration) -> Result<Option<(Signal, T)>> {
        /* a queued signal from an earlier burst goes first, no sleeping */
        if let Some(hit) = self.try_read() {
            return Ok(Some(hit));
        }

        let mut pfd = libc::pollfd {
            fd: self.read_fd,
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: pfd is a single valid pollfd, nfds = 1
        let ret = unsafe { libc::poll(&raw mut pfd, 1, poll_timeout_ms(timeout)) };
        if ret < 0 {
            let err = errno();
            if err == libc::EINTR {
                return Ok(None);
            }
            return Err(SupervisorError::SignalSetup(err));
        }
        if ret == 0 {
            return Ok(None);
        }
        Ok(self.try_read())
    }

    /* drain one byte; nonblocking, EAGAIN means nothing queued */
    fn try_read(&self) -> Option<(Signal, T)> {
        loop {
            let mut buf = [0u8; 1];
            // SAFETY: buf is a valid 1-byte buffer, read_fd is our nonblocking pipe
            let n = unsafe { libc::read(self.read_fd, buf.as_mut_ptr().cast(), 1) };
            if n <= 0 {
                return None;
            }
            let raw = i32::from(buf[0]);
            if let (Some(signal), Some(tag)) = (Signal::try_from_raw(raw), self.lookup(raw)) {
                return Some((signal, tag));
            }
            /* not ours (can't happen unless someone else wrote) - skip it */
        }
    }
}

impl<T: Copy> Drop for SignalTraps<T> {
    fn drop(&mut self) {
        /* handlers first, so nothing writes to an fd we're about to close */
        for (signal, _) in &self.table {
            let _ = set_disposition(*signal, libc::SIG_DFL);
        }
        SIGNAL_WRITE_FD.store(-1, Ordering::SeqCst);
        close_fd(self.write_fd);
        close_fd(self.read_fd);
    }
}
