//! Record sinks — where completed project records are written.

pub mod auth;
pub mod memory;
pub mod sheets;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::survey::model::Record;

pub use auth::{ServiceAccountAuth, StaticToken, TokenSource};
pub use memory::MemorySink;
pub use sheets::GoogleSheetsSink;

/// Tabular store accepting one row per completed record.
///
/// Implementations make sure the header row exists before the first append.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append(&self, record: &Record) -> Result<(), SinkError>;
}
