//! Upload run summary.

use serde::Serialize;

/// Final summary of one upload run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    /// Rows read from the source, including dropped ones
    pub total_rows: u64,
    /// Ids acknowledged by the index, in upload order
    pub uploaded_ids: Vec<String>,
    pub chunks: u64,
    pub rows_incomplete: u64,
    pub embedding_failures: u64,
    pub failed_batches: u64,
    pub failed_entries: u64,
    /// Set when reading stopped early because the source became unreadable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
    pub started_at: String,
    pub duration_ms: u64,
}

impl RunReport {
    pub fn uploaded_count(&self) -> usize {
        self.uploaded_ids.len()
    }

    /// True when every row made it into the index.
    pub fn is_clean(&self) -> bool {
        self.read_error.is_none() && self.uploaded_ids.len() as u64 == self.total_rows
    }
}
