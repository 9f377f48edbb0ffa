use anyhow::{Context, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

use crate::core::error::StoreError;
use crate::wal::wal::{Wal, WalOperation};

/// Durable key -> bytes map
///
/// Implementations must make a successful `put` visible to the next `get`
/// and must never expose a partially written value.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Store backed by an append-only WAL, replayed into memory at open
pub struct LogStore {
    wal: Wal,
    index: DashMap<Vec<u8>, Vec<u8>>,
    /// Lines currently in the log, live or superseded
    log_lines: AtomicUsize,
}

impl LogStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create store directory: {}", parent.display())
            })?;
        }

        let wal = Wal::new(path.clone())?;
        let operations = wal.replay().context("Failed to replay WAL")?;

        let index = DashMap::new();
        for op in &operations {
            match op {
                WalOperation::Put { key, value } => {
                    index.insert(key.clone(), value.clone());
                }
            }
        }

        info!(
            path = %path.display(),
            operations_replayed = operations.len(),
            keys_loaded = index.len(),
            "Store opened"
        );

        Ok(Self {
            wal,
            index,
            log_lines: AtomicUsize::new(operations.len()),
        })
    }

    pub fn path(&self) -> &Path {
        self.wal.path()
    }

    pub fn log_lines(&self) -> usize {
        self.log_lines.load(Ordering::Relaxed)
    }

    /// Rewrite the log so it holds exactly one line per live key
    pub fn compact(&self) -> Result<()> {
        let mut operations: Vec<WalOperation> = self
            .index
            .iter()
            .map(|entry| WalOperation::Put {
                key: entry.key().clone(),
                value: entry.value().clone(),
            })
            .collect();
        // Stable file content for identical state
        operations.sort_by(|a, b| match (a, b) {
            (WalOperation::Put { key: ka, .. }, WalOperation::Put { key: kb, .. }) => ka.cmp(kb),
        });

        let before = self.log_lines();
        self.wal.rewrite(&operations)?;
        self.log_lines.store(operations.len(), Ordering::Relaxed);

        info!(
            path = %self.path().display(),
            lines_before = before,
            lines_after = operations.len(),
            "Store compacted"
        );

        Ok(())
    }

    /// Compact when superseded lines outnumber live keys by more than `ratio`
    pub fn compact_if_needed(&self, ratio: usize) -> Result<bool> {
        let live = self.index.len().max(1);
        let lines = self.log_lines();

        if lines > live.saturating_mul(ratio) {
            self.compact()?;
            return Ok(true);
        }

        debug!(lines, live, ratio, "Store compaction not needed");
        Ok(false)
    }
}

impl KvStore for LogStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.index.get(key).map(|entry| entry.value().clone())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let op = WalOperation::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        };
        self.wal.log_operation(&op)?;
        self.log_lines.fetch_add(1, Ordering::Relaxed);

        // Only visible once durable
        self.index.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}
