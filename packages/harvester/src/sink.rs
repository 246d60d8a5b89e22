//! Destinations for harvested records and the retrieval checkpoint.
//!
//! The retrieval run only needs two capabilities: push one record somewhere
//! downstream, and read/write the time of the last successful run. The
//! in-memory and file implementations here back the CLI and the tests; the
//! pipeline crate provides Postgres-backed ones.

use std::collections::VecDeque;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::error::{HarvesterError, Result};
use crate::types::Record;

/// Downstream consumer of harvested records.
pub trait RecordSink {
    /// Hand one record over for processing.
    fn push(&mut self, record: &Record) -> Result<()>;
}

/// Persistent "last successful retrieval" timestamp.
pub trait CheckpointStore {
    /// Read the checkpoint, `None` if no run has completed yet.
    fn get(&self) -> Result<Option<DateTime<Utc>>>;

    /// Overwrite the checkpoint.
    fn set(&mut self, at: DateTime<Utc>) -> Result<()>;
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn push(&mut self, record: &Record) -> Result<()> {
        (**self).push(record)
    }
}

impl<C: CheckpointStore + ?Sized> CheckpointStore for &mut C {
    fn get(&self) -> Result<Option<DateTime<Utc>>> {
        (**self).get()
    }

    fn set(&mut self, at: DateTime<Utc>) -> Result<()> {
        (**self).set(at)
    }
}

/// FIFO queue of records kept in memory.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    records: VecDeque<Record>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest record.
    pub fn pop(&mut self) -> Option<Record> {
        self.records.pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSink for MemoryQueue {
    fn push(&mut self, record: &Record) -> Result<()> {
        self.records.push_back(record.clone());
        Ok(())
    }
}

/// Writes each record as one JSON line.
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Records written so far.
    #[must_use]
    pub fn written(&self) -> usize {
        self.written
    }

    /// Flush and return the underlying writer.
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn push(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.written += 1;
        Ok(())
    }
}

/// Checkpoint stored as an RFC 3339 timestamp in a plain file.
#[derive(Debug, Clone)]
pub struct FileCheckpoint {
    path: PathBuf,
}

impl FileCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CheckpointStore for FileCheckpoint {
    fn get(&self) -> Result<Option<DateTime<Utc>>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|e| {
                HarvesterError::Config(format!(
                    "checkpoint file {} holds '{raw}': {e}",
                    self.path.display()
                ))
            })
    }

    fn set(&mut self, at: DateTime<Utc>) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, format!("{}\n", at.to_rfc3339()))?;
        Ok(())
    }
}

/// Checkpoint kept in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoint {
    at: Option<DateTime<Utc>>,
}

impl MemoryCheckpoint {
    #[must_use]
    pub fn new(at: Option<DateTime<Utc>>) -> Self {
        Self { at }
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn get(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.at)
    }

    fn set(&mut self, at: DateTime<Utc>) -> Result<()> {
        self.at = Some(at);
        Ok(())
    }
}
