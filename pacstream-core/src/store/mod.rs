//! Append-only results file of fixed-size records.
//!
//! Every operation opens the file, does its work and closes it again;
//! no handle is held between calls. Writers in this process are
//! serialised by one process-wide lock shared by every [`ResultsStore`]
//! handle, and appends go through an append-mode descriptor.
//!
//! The API is blocking. Async callers should run it on
//! `tokio::task::spawn_blocking`.

mod record;

pub use record::{NAME_UNITS, RECORD_SIZE, ResultRecord};

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::StoreError;

/// Serialises appends and truncation across every handle in the process.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

/// Aggregate figures over every stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSummary {
    pub count: u64,
    pub mean_score: f64,
    pub mean_elapsed_secs: f64,
}

pub struct ResultsStore {
    path: PathBuf,
}

impl ResultsStore {
    /// Open (creating if needed) the results file at `path`, along with
    /// any missing parent directories.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `record` after the last record in the file.
    pub fn append(&self, record: &ResultRecord) -> Result<(), StoreError> {
        let _guard = write_lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        record_count(file.metadata()?.len())?;
        file.write_all(&record.encode())?;
        file.flush()?;
        Ok(())
    }

    /// Lazily iterate every record in append order. Each call reopens
    /// the file and starts from the first record.
    pub fn scan_all(&self) -> Result<RecordIter, StoreError> {
        let file = File::open(&self.path)?;
        let count = record_count(file.metadata()?.len())?;
        Ok(RecordIter {
            file,
            index: 0,
            count,
        })
    }

    /// The highest score, ties broken by the shortest game. `None` when
    /// the store is empty.
    pub fn best_player(&self) -> Result<Option<ResultRecord>, StoreError> {
        let mut best: Option<ResultRecord> = None;
        for record in self.scan_all()? {
            let record = record?;
            match &best {
                Some(current) if !record.beats(current) => {}
                _ => best = Some(record),
            }
        }
        Ok(best)
    }

    /// Reset the file to zero length. Maintenance only.
    pub fn truncate(&self) -> Result<(), StoreError> {
        let _guard = write_lock();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.set_len(0)?;
        Ok(())
    }

    /// Number of stored records.
    pub fn len(&self) -> Result<u64, StoreError> {
        record_count(fs::metadata(&self.path)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    /// Random access by zero-based index.
    pub fn get(&self, index: u64) -> Result<ResultRecord, StoreError> {
        let mut file = File::open(&self.path)?;
        let count = record_count(file.metadata()?.len())?;
        if index >= count {
            return Err(StoreError::IndexOutOfRange { index, count });
        }
        read_record_at(&mut file, index)
    }

    /// Mean score and duration over all records. `None` when empty.
    pub fn summary(&self) -> Result<Option<StoreSummary>, StoreError> {
        let mut count = 0u64;
        let mut score_total = 0i64;
        let mut elapsed_total = 0i128;
        for record in self.scan_all()? {
            let record = record?;
            count += 1;
            score_total += i64::from(record.score);
            elapsed_total += i128::from(record.elapsed_secs);
        }
        if count == 0 {
            return Ok(None);
        }
        Ok(Some(StoreSummary {
            count,
            mean_score: score_total as f64 / count as f64,
            mean_elapsed_secs: elapsed_total as f64 / count as f64,
        }))
    }
}

// ── RecordIter ───────────────────────────────────────────────────

/// Lazy, finite cursor produced by [`ResultsStore::scan_all`].
pub struct RecordIter {
    file: File,
    index: u64,
    count: u64,
}

impl Iterator for RecordIter {
    type Item = Result<ResultRecord, StoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.count {
            return None;
        }
        let record = read_record_at(&mut self.file, self.index);
        self.index += 1;
        if record.is_err() {
            // Stop after the first I/O failure.
            self.index = self.count;
        }
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = usize::try_from(self.count - self.index).unwrap_or(usize::MAX);
        (left, Some(left))
    }
}

// ── Helpers ──────────────────────────────────────────────────────

fn write_lock() -> MutexGuard<'static, ()> {
    // The guarded data is `()`, so a poisoned lock carries no broken state.
    WRITE_LOCK.lock().unwrap_or_else(PoisonError::into_inner)
}

fn record_count(len: u64) -> Result<u64, StoreError> {
    let size = RECORD_SIZE as u64;
    if len % size != 0 {
        return Err(StoreError::Corrupt {
            len,
            record_size: RECORD_SIZE,
        });
    }
    Ok(len / size)
}

fn read_record_at(file: &mut File, index: u64) -> Result<ResultRecord, StoreError> {
    file.seek(SeekFrom::Start(index * RECORD_SIZE as u64))?;
    let mut buf = [0u8; RECORD_SIZE];
    file.read_exact(&mut buf)?;
    Ok(ResultRecord::decode(&buf))
}

// ── Tests ────────────────────────────────────────────────────────
