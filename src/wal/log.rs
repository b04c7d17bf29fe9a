// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! The write-ahead log file itself: header, recovery-on-open, append,
//! replay, checkpoint and rotation.
//!
//! ## Layout
//!
//! ```text
//! magic:u32 = 0x57414C31 ("WAL1") | version:u32 = 1 | record | record | ...
//! ```
//!
//! Opening an existing file runs a forward scan immediately after the
//! header to find the last well-formed record. Anything past that point
//! is an uncommitted tail — a process that crashed mid-write — and is
//! physically discarded (`set_len`) before the file is handed back for
//! appends, so a later append can never land after stale garbage.

use crate::error::{BkvError, BkvResult};
use crate::wal::record::{self, DecodeOutcome, WalOp, WalRecord};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

const WAL_MAGIC: u32 = 0x57414C31;
const WAL_VERSION: u32 = 1;
const HEADER_LEN: u64 = 8;

/// How aggressively [`WriteAheadLog::append`] forces data to stable storage.
///
/// Every append is written through to the OS regardless of mode; what
/// varies is how often `fsync` is additionally called, trading durability
/// window against append latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Never fsync explicitly; rely on the OS to eventually flush.
    None,
    /// Fsync once every `N` appends.
    Batch(usize),
    /// Fsync after every append.
    Always,
}

/// Configuration for opening a [`WriteAheadLog`].
#[derive(Debug, Clone)]
pub struct WalConfig {
    pub path: PathBuf,
    pub sync_mode: SyncMode,
    pub buffer_size: usize,
}

impl WalConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), sync_mode: SyncMode::Batch(100), buffer_size: 64 * 1024 }
    }

    pub fn with_sync_mode(mut self, sync_mode: SyncMode) -> Self {
        self.sync_mode = sync_mode;
        self
    }

    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

/// Point-in-time counters for observability, mirroring the rest of the
/// crate's stats-struct convention rather than a logging crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalStats {
    pub appends: u64,
    pub checkpoints: u64,
    pub rotations: u64,
    pub current_sequence: u64,
    pub last_checkpoint_sequence: u64,
}

struct WalCounters {
    appends: AtomicU64,
    checkpoints: AtomicU64,
    rotations: AtomicU64,
    last_checkpoint_sequence: AtomicU64,
}

impl WalCounters {
    fn new() -> Self {
        Self {
            appends: AtomicU64::new(0),
            checkpoints: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            last_checkpoint_sequence: AtomicU64::new(0),
        }
    }
}

struct WalState {
    writer: std::io::BufWriter<File>,
    sequence: u64,
    since_sync: usize,
}

fn io_err(operation: &str, error: std::io::Error) -> BkvError {
    BkvError::Io { operation: operation.to_string(), reason: error.to_string() }
}

fn write_header(file: &mut File) -> std::io::Result<()> {
    file.write_all(&WAL_MAGIC.to_le_bytes())?;
    file.write_all(&WAL_VERSION.to_le_bytes())?;
    file.flush()
}

fn archive_path_for(path: &Path, sequence: u64) -> PathBuf {
    let mut archived = path.as_os_str().to_owned();
    archived.push(format!(".{sequence}"));
    PathBuf::from(archived)
}

/// An append-only, crash-recoverable log of primary-tree mutations.
///
/// A single [`Mutex`] serializes sequence-number assignment together with
/// the record bytes it guards, so two concurrent appenders can never
/// interleave their frames or observe duplicate sequence numbers. The same
/// lock is held across [`WriteAheadLog::replay`], [`WriteAheadLog::checkpoint`]
/// and [`WriteAheadLog::rotate`], so none of those can run concurrently with
/// an in-flight append.
pub struct WriteAheadLog {
    path: PathBuf,
    config: WalConfig,
    state: Mutex<WalState>,
    counters: WalCounters,
}

impl WriteAheadLog {
    /// Open (creating if absent) the log file at `config.path`.
    ///
    /// On a fresh file, writes the header and starts at sequence 0. On an
    /// existing file, validates the header, then scans forward to find the
    /// last well-formed record: the recovered sequence becomes the starting
    /// counter, and any bytes past that record are truncated away.
    pub fn open(config: WalConfig) -> BkvResult<Self> {
        let path = config.path.clone();
        let is_fresh = !path.exists() || std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| io_err("wal_open", e))?;

        if is_fresh {
            write_header(&mut file).map_err(|e| io_err("wal_open", e))?;
        } else {
            let mut header = [0u8; HEADER_LEN as usize];
            file.seek(SeekFrom::Start(0)).map_err(|e| io_err("wal_open", e))?;
            file.read_exact(&mut header).map_err(|e| BkvError::WalCorrupt {
                path: path.display().to_string(),
                reason: format!("truncated header: {e}"),
            })?;
            let magic = u32::from_le_bytes(header[0..4].try_into().unwrap());
            let version = u32::from_le_bytes(header[4..8].try_into().unwrap());
            if magic != WAL_MAGIC || version != WAL_VERSION {
                return Err(BkvError::WalCorrupt {
                    path: path.display().to_string(),
                    reason: format!("unexpected header magic={magic:#x} version={version}"),
                });
            }
        }

        let mut scan_handle = file.try_clone().map_err(|e| io_err("wal_open", e))?;
        scan_handle.seek(SeekFrom::Start(HEADER_LEN)).map_err(|e| io_err("wal_open", e))?;
        let mut good_offset = HEADER_LEN;
        let mut recovered_sequence = 0u64;
        loop {
            match record::decode_one(&mut scan_handle).map_err(|e| io_err("wal_open", e))? {
                DecodeOutcome::Record { record, consumed } => {
                    good_offset += consumed;
                    recovered_sequence = record.sequence;
                }
                DecodeOutcome::Eof | DecodeOutcome::Corrupt => break,
            }
        }

        file.set_len(good_offset).map_err(|e| io_err("wal_open", e))?;
        file.seek(SeekFrom::End(0)).map_err(|e| io_err("wal_open", e))?;

        let writer = std::io::BufWriter::with_capacity(config.buffer_size, file);
        let state = WalState { writer, sequence: recovered_sequence, since_sync: 0 };
        let counters = WalCounters::new();
        counters.last_checkpoint_sequence.store(0, Ordering::Relaxed);

        Ok(Self { path, config, state: Mutex::new(state), counters })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The most recently assigned sequence number (0 if nothing appended yet).
    pub fn sequence(&self) -> u64 {
        self.state.lock().unwrap().sequence
    }

    pub fn append_insert(&self, key: &[u8], value: &[u8]) -> BkvResult<u64> {
        self.append(WalOp::Insert, key, value)
    }

    pub fn append_delete(&self, key: &[u8]) -> BkvResult<u64> {
        self.append(WalOp::Delete, key, &[])
    }

    pub fn append_clear(&self) -> BkvResult<u64> {
        self.append(WalOp::Clear, &[], &[])
    }

    /// Append a raw record and return its assigned sequence number. The
    /// three `append_*` helpers above cover the three [`WalOp`] variants;
    /// this is the general entry point they're built on.
    pub fn append(&self, op: WalOp, key: &[u8], value: &[u8]) -> BkvResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.sequence += 1;
        let sequence = state.sequence;
        let frame = record::encode(sequence, op, key, value);

        state.writer.write_all(&frame).map_err(|e| io_err("wal_append", e))?;
        state.writer.flush().map_err(|e| io_err("wal_append", e))?;

        match self.config.sync_mode {
            SyncMode::None => {}
            SyncMode::Always => {
                state.writer.get_ref().sync_all().map_err(|e| io_err("wal_append", e))?;
            }
            SyncMode::Batch(n) => {
                state.since_sync += 1;
                if n == 0 || state.since_sync >= n {
                    state.writer.get_ref().sync_all().map_err(|e| io_err("wal_append", e))?;
                    state.since_sync = 0;
                }
            }
        }

        self.counters.appends.fetch_add(1, Ordering::Relaxed);
        Ok(sequence)
    }

    /// Force any unsynced appends to stable storage now, independent of the
    /// configured [`SyncMode`].
    pub fn sync(&self) -> BkvResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writer.flush().map_err(|e| io_err("wal_sync", e))?;
        state.writer.get_ref().sync_all().map_err(|e| io_err("wal_sync", e))?;
        state.since_sync = 0;
        Ok(())
    }

    /// Replay every record after the header through `applier`, in the order
    /// they were appended.
    ///
    /// A malformed or checksum-failing record stops the scan silently
    /// (it is not surfaced as an error): everything before it has already
    /// been applied, and everything at or after it is treated as an
    /// incomplete, never-committed tail. If `applier` itself returns an
    /// error, replay stops immediately and that error propagates — the
    /// caller has already observed exactly how many prior records were
    /// applied through its own side effects on `applier`'s state.
    pub fn replay<F>(&self, mut applier: F) -> BkvResult<u64>
    where
        F: FnMut(&WalRecord) -> BkvResult<()>,
    {
        let state = self.state.lock().unwrap();
        let mut reader = state.writer.get_ref().try_clone().map_err(|e| io_err("wal_replay", e))?;
        reader.seek(SeekFrom::Start(HEADER_LEN)).map_err(|e| io_err("wal_replay", e))?;

        let mut applied = 0u64;
        loop {
            match record::decode_one(&mut reader).map_err(|e| io_err("wal_replay", e))? {
                DecodeOutcome::Record { record, .. } => {
                    applier(&record)?;
                    applied += 1;
                }
                DecodeOutcome::Eof | DecodeOutcome::Corrupt => break,
            }
        }
        Ok(applied)
    }

    /// Compact the log to just the header, discarding every record applied
    /// so far. The sequence counter is *not* reset — the next append
    /// continues from where it left off, so replay-after-checkpoint never
    /// sees a sequence go backwards.
    pub fn checkpoint(&self) -> BkvResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writer.flush().map_err(|e| io_err("wal_checkpoint", e))?;
        state.writer.get_ref().sync_all().map_err(|e| io_err("wal_checkpoint", e))?;

        let file = state.writer.get_mut();
        file.set_len(0).map_err(|e| io_err("wal_checkpoint", e))?;
        file.seek(SeekFrom::Start(0)).map_err(|e| io_err("wal_checkpoint", e))?;
        write_header(file).map_err(|e| io_err("wal_checkpoint", e))?;

        state.since_sync = 0;
        let sequence = state.sequence;
        self.counters.checkpoints.fetch_add(1, Ordering::Relaxed);
        self.counters.last_checkpoint_sequence.store(sequence, Ordering::Relaxed);
        Ok(())
    }

    /// Archive the current file to `<path>.<sequence>` and start a fresh,
    /// empty log at `path` with a new header. The sequence counter carries
    /// over unchanged.
    pub fn rotate(&self) -> BkvResult<PathBuf> {
        let mut state = self.state.lock().unwrap();
        state.writer.flush().map_err(|e| io_err("wal_rotate", e))?;
        state.writer.get_ref().sync_all().map_err(|e| io_err("wal_rotate", e))?;

        let archive_path = archive_path_for(&self.path, state.sequence);
        std::fs::rename(&self.path, &archive_path).map_err(|e| io_err("wal_rotate", e))?;

        let mut fresh = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| io_err("wal_rotate", e))?;
        write_header(&mut fresh).map_err(|e| io_err("wal_rotate", e))?;

        state.writer = std::io::BufWriter::with_capacity(self.config.buffer_size, fresh);
        state.since_sync = 0;
        self.counters.rotations.fetch_add(1, Ordering::Relaxed);
        Ok(archive_path)
    }

    /// Flush and fsync, then release the file handle. Calling this is
    /// optional: [`Drop`] performs the same best-effort flush, so the
    /// handle is always released, but only `close` surfaces I/O errors.
    pub fn close(self) -> BkvResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writer.flush().map_err(|e| io_err("wal_close", e))?;
        state.writer.get_ref().sync_all().map_err(|e| io_err("wal_close", e))
    }

    pub fn stats(&self) -> WalStats {
        let state = self.state.lock().unwrap();
        WalStats {
            appends: self.counters.appends.load(Ordering::Relaxed),
            checkpoints: self.counters.checkpoints.load(Ordering::Relaxed),
            rotations: self.counters.rotations.load(Ordering::Relaxed),
            current_sequence: state.sequence,
            last_checkpoint_sequence: self.counters.last_checkpoint_sequence.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WriteAheadLog {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            let _ = state.writer.flush();
            let _ = state.writer.get_ref().sync_all();
        }
    }
}
