//! Filesystem boundary for the scaffold executor.
//!
//! Every mutating call the executor makes goes through `Filesystem`, and every
//! call is bounded by `run_with_timeout`. The operation runs on a helper
//! thread; when it overruns, the executor stops waiting and reports a timeout
//! for that phase. The overrunning thread is parked in `Stragglers` so nothing
//! touches the project tree again until it has finished.

use crate::core::error::OpError;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub trait Filesystem: Send + Sync {
    /// Create a directory and any missing parents. Existing directories are fine.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Create an empty file. The parent must already exist; an existing file
    /// is left untouched.
    fn create_empty_file(&self, path: &Path) -> io::Result<()>;

    /// Copy `src` over `dest`, replacing any existing file.
    fn copy_file(&self, src: &Path, dest: &Path) -> io::Result<()>;

    fn exists(&self, path: &Path) -> bool;

    fn remove_dir_all(&self, path: &Path) -> io::Result<()>;
}

/// `std::fs` backed implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFilesystem;

impl Filesystem for LocalFilesystem {
    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn create_empty_file(&self, path: &Path) -> io::Result<()> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map(|_| ())
    }

    fn copy_file(&self, src: &Path, dest: &Path) -> io::Result<()> {
        fs::copy(src, dest).map(|_| ())
    }

    fn exists(&self, path: &Path) -> bool {
        // symlink_metadata so a dangling symlink still counts as taken
        fs::symlink_metadata(path).is_ok()
    }

    fn remove_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir_all(path)
    }
}

/// Join a catalog-relative path onto `base`.
///
/// Root and prefix components are dropped, so `/src` lands at `base/src`
/// instead of replacing `base` the way `Path::join` would.
pub fn join_under(base: &Path, relative: impl AsRef<Path>) -> PathBuf {
    let mut joined = base.to_path_buf();
    for component in relative.as_ref().components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {}
            other => joined.push(other.as_os_str()),
        }
    }
    joined
}

/// Worker threads that outlived their timeout.
#[derive(Debug, Default)]
pub struct Stragglers(Mutex<Vec<JoinHandle<()>>>);

impl Stragglers {
    fn park(&self, handle: JoinHandle<()>) {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(handle);
    }

    pub fn len(&self) -> usize {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait up to `within` for every parked worker to finish. Returns `true`
    /// when none is left running.
    pub fn settle(&self, within: Duration) -> bool {
        let mut handles = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let deadline = Instant::now() + within;
        while handles.iter().any(|h| !h.is_finished()) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }

        let (finished, running): (Vec<_>, Vec<_>) =
            handles.drain(..).partition(|h| h.is_finished());
        for handle in finished {
            // A panicked worker has stopped too; that is all cleanup needs.
            let _ = handle.join();
        }
        *handles = running;
        handles.is_empty()
    }
}

/// Run `f` and wait at most `timeout` for it to finish. On overrun the
/// worker is parked in `stragglers`.
pub fn run_with_timeout<F>(
    op: &'static str,
    timeout: Duration,
    stragglers: &Stragglers,
    f: F,
) -> Result<(), OpError>
where
    F: FnOnce() -> io::Result<()> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let handle = thread::Builder::new()
        .name(format!("mkproj-{op}"))
        .spawn(move || {
            // Receiver is gone after a timeout; nothing left to report to.
            let _ = tx.send(f());
        })
        .map_err(OpError::Io)?;

    match rx.recv_timeout(timeout) {
        Ok(result) => result.map_err(OpError::Io),
        Err(RecvTimeoutError::Timeout) => {
            stragglers.park(handle);
            Err(OpError::TimedOut { op, after: timeout })
        }
        Err(RecvTimeoutError::Disconnected) => Err(OpError::Io(io::Error::other(format!(
            "{op} worker exited without a result"
        )))),
    }
}
