/*
 * process.rs
 *
 * Launch the arbiter with posix_spawnp.
 *
 * We never hold a std::process::Child for it: the arbiter we track changes
 * identity on every restart (old master forks the new one), so after the
 * first hand-off there is nothing to hold. We keep a pid and reap by pid.
 *
 * Signal state for the child is reset explicitly. If rainbow-saddle was
 * started with SIGINT/SIGHUP ignored (nohup, `&` in a script), an inherited
 * SIG_IGN would survive exec and the arbiter would never hear about
 * Ctrl-C or restarts.
 */

use std::ffi::CString;
use std::ptr;

use core::ffi::c_char;

use crate::error::{Result, SupervisorError};

unsafe extern "C" {
    /* environ is a global variable pointing to the environment */
    static environ: *const *const c_char;
}

/* signals the arbiter must see with default disposition */
const RESET_SIGNALS: [i32; 5] = [
    libc::SIGHUP,
    libc::SIGINT,
    libc::SIGTERM,
    libc::SIGUSR2,
    libc::SIGQUIT,
];

/*
 * RAII wrapper for posix_spawnattr_t.
 *
 * Opaque pointer on macOS, inline struct on Linux. Either way init sets it
 * up and destroy frees whatever init allocated, so Drop handles cleanup on
 * every early return.
 */
struct SpawnAttr {
    inner: libc::posix_spawnattr_t,
}

impl SpawnAttr {
    fn new() -> core::result::Result<Self, i32> {
        // SAFETY: posix_spawnattr_t is either a pointer or a plain C struct;
        // all-zero is a valid placeholder that init overwrites.
        let mut attr: libc::posix_spawnattr_t = unsafe { core::mem::zeroed() };
        // SAFETY: attr is a valid location for posix_spawnattr_init to populate
        let ret = unsafe { libc::posix_spawnattr_init(&raw mut attr) };
        if ret != 0 {
            return Err(ret);
        }
        Ok(Self { inner: attr })
    }

    fn set_flags(&mut self, flags: libc::c_short) -> core::result::Result<(), i32> {
        // SAFETY: self.inner was initialized in new()
        let ret = unsafe { libc::posix_spawnattr_setflags(&raw mut self.inner, flags) };
        if ret != 0 {
            return Err(ret);
        }
        Ok(())
    }

    /* child starts with these signals at SIG_DFL and nothing blocked */
    fn reset_signals(&mut self, signals: &[i32]) -> core::result::Result<(), i32> {
        // SAFETY: sigset_t is a plain C type, zeroed then initialized by sigemptyset.
        let mut default_set: libc::sigset_t = unsafe { core::mem::zeroed() };
        // SAFETY: same as above
        let mut empty_mask: libc::sigset_t = unsafe { core::mem::zeroed() };

        // SAFETY: both sets are valid, writable sigset_t values. sigemptyset and
        // sigaddset only touch the set they are given. Ops share that invariant.
        #[allow(clippy::multiple_unsafe_ops_per_block)]
        unsafe {
            libc::sigemptyset(&raw mut default_set);
            libc::sigemptyset(&raw mut empty_mask);
            for &sig in signals {
                libc::sigaddset(&raw mut default_set, sig);
            }
        }

        // SAFETY: self.inner was initialized in new(), default_set is initialized
        let ret = unsafe { libc::posix_spawnattr_setsigdefault(&raw mut self.inner, &raw const default_set) };
        if ret != 0 {
            return Err(ret);
        }
        // SAFETY: self.inner was initialized in new(), empty_mask is initialized
        let ret = unsafe { libc::posix_spawnattr_setsigmask(&raw mut self.inner, &raw const empty_mask) };
        if ret != 0 {
            return Err(ret);
        }
        Ok(())
    }

    fn as_ptr(&self) -> *const libc::posix_spawnattr_t {
        &raw const self.inner
    }
}

impl Drop for SpawnAttr {
    fn drop(&mut self) {
        // SAFETY: self.inner was initialized in new() and hasn't been destroyed yet
        unsafe {
            libc::posix_spawnattr_destroy(&raw mut self.inner);
        }
    }
}

/// A spawned arbiter. Just the pid - reaping goes through `wait::wait_for_exit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChild {
    pid: libc::pid_t,
}

impl RawChild {
    /// Get the process ID
    #[inline]
    #[must_use]
    pub const fn pid(&self) -> i32 {
        self.pid
    }
}

/// Build the arbiter's argv: caller's command line plus `<pid_flag> <pidfile>`.
#[must_use]
pub fn arbiter_argv(command: &[String], pid_flag: &str, pidfile: &str) -> Vec<String> {
    let mut argv = Vec::with_capacity(command.len() + 2);
    argv.extend(command.iter().cloned());
    argv.push(pid_flag.to_string());
    argv.push(pidfile.to_string());
    argv
}

/// Spawn `argv[0]` with `argv[1..]`, searching PATH.
///
/// The child stays in our process group so a terminal Ctrl-C reaches both
/// of us, same as a plain fork/exec would.
///
/// # Errors
/// `CommandNotFound` / `PermissionDenied` for the usual exec failures,
/// `Spawn(errno)` otherwise. Never retried.
pub fn spawn_command(argv: &[String]) -> Result<RawChild> {
    let Some(command) = argv.first() else {
        return Err(SupervisorError::MissingCommand);
    };

    let argv_cstrs = argv
        .iter()
        .map(|arg| CString::new(arg.as_str()).map_err(|_| SupervisorError::InvalidArgument(arg.clone())))
        .collect::<Result<Vec<CString>>>()?;

    /* build pointer array: [argv..., NULL] */
    let mut argv_ptrs: Vec<*mut c_char> = Vec::with_capacity(argv_cstrs.len() + 1);
    for cstr in &argv_cstrs {
        argv_ptrs.push(cstr.as_ptr().cast_mut());
    }
    argv_ptrs.push(ptr::null_mut());

    let mut attr = SpawnAttr::new().map_err(SupervisorError::Spawn)?;
    #[allow(clippy::cast_possible_truncation)]
    attr.set_flags((libc::POSIX_SPAWN_SETSIGDEF | libc::POSIX_SPAWN_SETSIGMASK) as libc::c_short)
        .map_err(SupervisorError::Spawn)?;
    attr.reset_signals(&RESET_SIGNALS).map_err(SupervisorError::Spawn)?;

    let mut pid: libc::pid_t = 0;
    // SAFETY: argv_ptrs is NULL-terminated and points into argv_cstrs, which
    // outlives the call. environ is the process environment. attr is an
    // initialized RAII wrapper; null file actions means inherit all fds.
    let ret = unsafe {
        libc::posix_spawnp(
            &raw mut pid,
            argv_cstrs[0].as_ptr(),
            ptr::null(),
            attr.as_ptr(),
            argv_ptrs.as_ptr(),
            environ.cast::<*mut c_char>(),
        )
    };

    if ret != 0 {
        return Err(match ret {
            libc::ENOENT => SupervisorError::CommandNotFound(command.clone()),
            libc::EACCES | libc::EPERM => SupervisorError::PermissionDenied(command.clone()),
            _ => SupervisorError::Spawn(ret),
        });
    }

    tracing::debug!(pid, ?argv, "spawned arbiter");
    Ok(RawChild { pid })
}

/*
 * These tests are skipped under Miri because posix_spawn* and waitpid are
 * unsupported foreign functions.
 */
