//! File-backed counter under an advisory exclusive lock
//!
//! The value is stored as decimal text. Every operation opens the file,
//! takes an exclusive advisory lock for the whole read-modify-write, and
//! releases it when the handle is dropped. Mutual exclusion across
//! processes holds only as long as every participant goes through the same
//! lock discipline; a writer that ignores the lock can still lose updates.

use crate::traits::CounterStore;
use std::fs::{File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tally_core::{BackendKind, CounterState, Error, Result};

/// Default longest wait for the exclusive lock
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const MIN_POLL: Duration = Duration::from_micros(100);
const MAX_POLL: Duration = Duration::from_millis(5);

/// Counter persisted in a text file
#[derive(Debug, Clone)]
pub struct FileCounter {
    path: PathBuf,
    lock_timeout: Duration,
}

impl FileCounter {
    /// Counter stored at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override the lock wait bound
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Path of the counter file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => Error::ConfigurationFault(format!(
                    "counter file {} missing; run prepare first",
                    self.path.display()
                )),
                _ => Error::Io(e),
            })
    }

    /// Block until the exclusive lock is held or the deadline passes
    fn lock(&self, file: &File) -> Result<()> {
        let deadline = Instant::now() + self.lock_timeout;
        let mut poll = MIN_POLL;
        loop {
            match file.try_lock() {
                Ok(()) => return Ok(()),
                Err(TryLockError::WouldBlock) => {}
                Err(TryLockError::Error(e)) => return Err(Error::Io(e)),
            }
            if Instant::now() >= deadline {
                return Err(Error::TransientConflict(format!(
                    "file lock on {} not acquired within {:?}",
                    self.path.display(),
                    self.lock_timeout
                )));
            }
            thread::sleep(poll);
            poll = (poll * 2).min(MAX_POLL);
        }
    }

    /// Read-modify-write under the lock
    ///
    /// `f` maps the stored value to the value to write back; `None` leaves
    /// the file untouched. Returns the value after the update.
    fn update<F>(&self, f: F) -> Result<u64>
    where
        F: FnOnce(u64) -> Result<Option<u64>>,
    {
        let mut file = self.open()?;
        self.lock(&file)?;
        // The lock is released when `file` is dropped, on every path below.
        let current = read_value(&mut file, &self.path)?;
        match f(current)? {
            Some(next) => {
                write_value(&mut file, next)?;
                Ok(next)
            }
            None => Ok(current),
        }
    }
}

fn read_value(file: &mut File, path: &Path) -> Result<u64> {
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(0);
    }
    trimmed.parse().map_err(|_| {
        Error::Storage(format!(
            "invalid counter state in {}: {:?}",
            path.display(),
            trimmed
        ))
    })
}

fn write_value(file: &mut File, value: u64) -> Result<()> {
    file.seek(SeekFrom::Start(0))?;
    file.set_len(0)?;
    file.write_all(value.to_string().as_bytes())?;
    file.sync_all()?;
    Ok(())
}

impl CounterStore for FileCounter {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    fn prepare(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(mut file) => {
                // Another handle may increment between create and lock;
                // only an untouched file gets the initial value.
                self.lock(&file)?;
                if file.metadata()?.len() == 0 {
                    write_value(&mut file, 0)?;
                }
                tracing::debug!(path = %self.path.display(), "created counter file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    fn read(&self) -> Result<CounterState> {
        self.update(|_| Ok(None)).map(CounterState::new)
    }

    fn increment(&self) -> Result<u64> {
        self.update(|current| {
            current
                .checked_add(1)
                .map(Some)
                .ok_or_else(|| Error::Storage("counter overflow".into()))
        })
    }

    fn reset(&self, value: u64) -> Result<()> {
        self.update(|_| Ok(Some(value))).map(|_| ())
    }
}
