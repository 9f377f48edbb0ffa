use anyhow::{bail, Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::core::error::StoreError;

/// WAL operation types
#[derive(Debug, Clone, PartialEq)]
pub enum WalOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
}

impl WalOperation {
    fn to_line(&self) -> String {
        match self {
            WalOperation::Put { key, value } => {
                format!("PUT|{}|{}\n", hex::encode(key), hex::encode(value))
            }
        }
    }

    fn from_line(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split('|').collect();

        match parts.first() {
            Some(&"PUT") => {
                if parts.len() != 3 {
                    bail!("Invalid PUT format");
                }
                let key = hex::decode(parts[1]).context("Invalid key hex")?;
                if key.is_empty() {
                    bail!("PUT key must not be empty");
                }
                let value = hex::decode(parts[2]).context("Invalid value hex")?;

                Ok(WalOperation::Put { key, value })
            }
            _ => bail!("Unknown operation type"),
        }
    }
}

/// Append-only operation log
///
/// Each operation is one newline-terminated line written with a single
/// `write_all` and synced before `log_operation` returns. Replay applies only
/// terminated lines, so a write torn by a crash is dropped instead of being
/// half-applied.
pub struct Wal {
    file: Mutex<File>,
    path: PathBuf,
}

impl Wal {
    pub fn new(path: PathBuf) -> Result<Self> {
        let file = open_append(&path).context("Failed to open WAL file")?;

        Ok(Wal {
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_operation(&self, op: &WalOperation) -> Result<(), StoreError> {
        let line = op.to_line();
        let mut file = self.file.lock().map_err(|_| poisoned())?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }

    pub fn replay(&self) -> Result<Vec<WalOperation>> {
        let content = fs::read(&self.path).context("Failed to open WAL for replay")?;
        let mut operations = Vec::new();

        let mut segments = content.split(|b| *b == b'\n').enumerate().peekable();
        while let Some((line_num, raw)) = segments.next() {
            // The segment after the last '\n' is either empty or a torn write
            if segments.peek().is_none() {
                if !raw.trim_ascii().is_empty() {
                    tracing::warn!(
                        line_num = line_num + 1,
                        bytes = raw.len(),
                        "Discarding unterminated WAL line"
                    );
                }
                break;
            }

            let line = match std::str::from_utf8(raw) {
                Ok(line) => line.trim(),
                Err(e) => {
                    tracing::warn!(
                        line_num = line_num + 1,
                        error = %e,
                        "WAL line is not valid UTF-8, skipping"
                    );
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }

            match WalOperation::from_line(line) {
                Ok(op) => operations.push(op),
                Err(e) => {
                    tracing::warn!(
                        line_num = line_num + 1,
                        error = %e,
                        "Failed to parse WAL line, skipping"
                    );
                }
            }
        }

        Ok(operations)
    }

    /// Atomically replace the log with `operations`
    ///
    /// The new content is written and synced to `<path>.tmp`, then renamed over
    /// the live log; the append handle is reopened on the new file.
    pub fn rewrite(&self, operations: &[WalOperation]) -> Result<()> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("WAL lock poisoned"))?;

        let temp_path = temp_path_for(&self.path)?;
        {
            let mut temp = File::create(&temp_path).context("Failed to create temp WAL")?;
            for op in operations {
                temp.write_all(op.to_line().as_bytes())
                    .context("Failed to write temp WAL")?;
            }
            temp.sync_all().context("Failed to sync temp WAL")?;
        }

        fs::rename(&temp_path, &self.path).context("Failed to replace WAL")?;
        *file = open_append(&self.path).context("Failed to reopen WAL after rewrite")?;

        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn temp_path_for(path: &Path) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .with_context(|| format!("Invalid WAL path: {}", path.display()))?
        .to_string_lossy();
    Ok(path.with_file_name(format!("{}.tmp", file_name)))
}

fn poisoned() -> StoreError {
    StoreError::Io(io::Error::other("WAL lock poisoned"))
}
