use super::{LogEntry, LOG_FILE_NAME, ROTATED_FILE_NAME};
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Appends JSON lines to `detection.jsonl`, rotating to `detection.1.jsonl`
/// once the file reaches `max_bytes`. Only one rotated generation is kept.
pub struct JsonlWriter {
    dir: PathBuf,
    max_bytes: u64,
    file: Option<File>,
    written: u64,
}

impl JsonlWriter {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
            file: None,
            written: 0,
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    pub fn rotated_path(&self) -> PathBuf {
        self.dir.join(ROTATED_FILE_NAME)
    }

    fn open(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let path = self.path();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        self.written = file.metadata().map(|m| m.len()).unwrap_or(0);
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> Result<()> {
        self.file = None;
        let rotated = self.rotated_path();
        if rotated.exists() {
            std::fs::remove_file(&rotated)
                .with_context(|| format!("Failed to remove {}", rotated.display()))?;
        }
        rename(&self.path(), &rotated)?;
        self.open()
    }

    pub fn write(&mut self, entry: &LogEntry) -> Result<()> {
        if self.file.is_none() {
            self.open()?;
        }
        if self.written >= self.max_bytes {
            self.rotate()?;
        }

        let mut line = serde_json::to_vec(entry).context("Failed to encode log entry")?;
        line.push(b'\n');

        let Some(file) = self.file.as_mut() else {
            return Ok(());
        };
        file.write_all(&line).context("Failed to write log entry")?;
        self.written += line.len() as u64;
        Ok(())
    }
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to)
        .with_context(|| format!("Failed to rotate {} to {}", from.display(), to.display()))
}
