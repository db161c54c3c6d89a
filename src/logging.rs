/*
 * logging.rs
 *
 * Debug trace log. Append-only file, plain text, no colors. Everything the
 * state machine does ends up here; stderr only gets the banners.
 *
 * RUST_LOG wins if set, otherwise everything at debug and up.
 */

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::error::{Result, SupervisorError};

const DEFAULT_FILTER: &str = "debug";

/* open for append, creating if needed */
fn open_trace_log(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| SupervisorError::TraceLog {
            path: path.to_path_buf(),
            source,
        })
}

/// Route `tracing` output to `path`.
///
/// A second call (tests, embedding) keeps the first subscriber.
///
/// # Errors
/// `TraceLog` if the file can't be opened. Callers treat that as a warning.
pub fn init_trace_log(path: &Path) -> Result<()> {
    let file = open_trace_log(path)?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .ok(); /* already initialized */

    tracing::debug!(path = %path.display(), pid = std::process::id(), "trace log opened");
    Ok(())
}
