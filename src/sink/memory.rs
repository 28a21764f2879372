//! In-memory record sink.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::RecordSink;
use crate::error::SinkError;
use crate::survey::model::{COLUMN_HEADERS, Record};

/// Keeps rows in memory, header first. Can be told to fail the next N appends.
#[derive(Default)]
pub struct MemorySink {
    rows: RwLock<Vec<Vec<String>>>,
    failures_left: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` appends fail with [`SinkError::Unavailable`].
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// All rows including the header.
    pub async fn rows(&self) -> Vec<Vec<String>> {
        self.rows.read().await.clone()
    }

    /// Data rows only.
    pub async fn records(&self) -> Vec<Vec<String>> {
        self.rows.read().await.iter().skip(1).cloned().collect()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append(&self, record: &Record) -> Result<(), SinkError> {
        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SinkError::Unavailable("injected failure".to_string()));
        }

        let mut rows = self.rows.write().await;
        if rows.is_empty() {
            rows.push(COLUMN_HEADERS.iter().map(|h| h.to_string()).collect());
        }
        rows.push(record.to_row());
        Ok(())
    }
}
