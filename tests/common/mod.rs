//! Shared test infrastructure for the scan integration suite.
//!
//! Provides:
//! - `TestTree` — tempfile-backed directory tree builder with
//!   controlled mtimes
//! - `SharedBuf` — capturing sink for `ScanLog` streams
//! - `quiet_log()` / `gui_log()` — logger constructors
//! - `known_file_from_stat()` — synthetic inventory records matching
//!   on-disk reality

// Not every test binary uses every item; suppress dead-code warnings
// for the shared module.
#![allow(dead_code)]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use paritydrift::inventory::disk::Disk;
use paritydrift::inventory::entry::{Block, BlockState, File, HASH_SIZE};
use paritydrift::logger::scanlog::ScanLog;
use paritydrift::platform::pal::{FileStat, Platform, UnixPlatform};

// ──────────────────── directory tree builder ────────────────────

/// Builder for on-disk trees with controlled modification times.
pub struct TestTree {
    root: tempfile::TempDir,
}

impl TestTree {
    pub fn new() -> Self {
        Self {
            root: tempfile::tempdir().expect("create test tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    /// Create a file, parents included.
    pub fn create_file(&self, rel: &str, content: &[u8]) -> PathBuf {
        let path = self.root.path().join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        fs::write(&path, content).expect("write test file");
        path
    }

    /// Create a file and pin its mtime to an exact (sec, nsec).
    pub fn create_file_at(&self, rel: &str, content: &[u8], sec: i64, nsec: u32) -> PathBuf {
        let path = self.create_file(rel, content);
        filetime::set_file_mtime(&path, filetime::FileTime::from_unix_time(sec, nsec))
            .expect("set mtime");
        path
    }

    /// Copy the mtime of `from` onto `rel`.
    pub fn mirror_mtime(&self, rel: &str, from: &Path) {
        let meta = fs::metadata(from).expect("stat mtime source");
        filetime::set_file_mtime(
            self.root.path().join(rel),
            filetime::FileTime::from_last_modification_time(&meta),
        )
        .expect("mirror mtime");
    }

    pub fn create_dir(&self, rel: &str) -> PathBuf {
        let path = self.root.path().join(rel);
        fs::create_dir_all(&path).expect("create test dir");
        path
    }

    pub fn remove(&self, rel: &str) {
        let path = self.root.path().join(rel);
        if path.is_dir() {
            fs::remove_dir_all(&path).expect("remove test dir");
        } else {
            fs::remove_file(&path).expect("remove test file");
        }
    }

    pub fn rename(&self, from: &str, to: &str) {
        fs::rename(self.root.path().join(from), self.root.path().join(to)).expect("rename");
    }

    /// lstat of a tree entry through the real platform.
    pub fn stat(&self, rel: &str) -> FileStat {
        UnixPlatform::new()
            .lstat(&self.root.path().join(rel))
            .expect("stat test entry")
    }
}

// ──────────────────── capturing log sinks ────────────────────

/// Clonable in-memory sink for capturing scan output.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).expect("captured output is UTF-8")
    }

    pub fn lines(&self) -> Vec<String> {
        self.text().lines().map(ToString::to_string).collect()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Logger that swallows everything.
pub fn quiet_log() -> ScanLog {
    ScanLog::with_streams(
        Box::new(io::sink()),
        Box::new(io::sink()),
        None,
        false,
        false,
        false,
    )
}

/// Logger capturing human output and machine lines.
pub fn gui_log(out: &SharedBuf, gui: &SharedBuf) -> ScanLog {
    ScanLog::with_streams(
        Box::new(out.clone()),
        Box::new(io::sink()),
        Some(Box::new(gui.clone())),
        true,
        true,
        true,
    )
}

// ──────────────────── synthetic inventory records ────────────────────

/// Register a file record matching an on-disk observation, with BLK
/// blocks carrying a recognizable hash, at the next free parity
/// positions. `inode_override` fakes a stale inode when set.
pub fn known_file_from_stat(
    disk: &mut Disk,
    sub: &str,
    st: &FileStat,
    block_size: u32,
    inode_override: Option<u64>,
) {
    let mut file = File::new(
        block_size,
        sub,
        st.size,
        st.mtime_sec,
        st.mtime_nsec,
        inode_override.unwrap_or(st.inode),
        0,
    );
    let base = disk.block_slots().len() as u32;
    for (i, block) in file.blocks.iter_mut().enumerate() {
        *block = Block {
            parity_pos: base + i as u32,
            state: BlockState::Blk,
            hash: [0xCD; HASH_SIZE],
        };
    }
    disk.restore_file(file).expect("restore synthetic record");
}
