//! Index entries and index definitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::truncate_chars;

/// Metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub row_index: u64,
    pub text: String,
}

/// One vector ready to be upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: EntryMetadata,
}

impl IndexEntry {
    /// Stable id for a global row ordinal.
    pub fn row_id(row_index: u64) -> String {
        format!("row-{row_index}")
    }

    /// Build an entry; `text` is capped at `max_text_chars` characters.
    pub fn new(row_index: u64, values: Vec<f32>, text: &str, max_text_chars: usize) -> Self {
        Self {
            id: Self::row_id(row_index),
            values,
            metadata: EntryMetadata {
                row_index,
                text: truncate_chars(text, max_text_chars).to_string(),
            },
        }
    }
}

/// Similarity metric of an index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    #[default]
    Cosine,
    Euclidean,
    Dot,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => write!(f, "cosine"),
            Metric::Euclidean => write!(f, "euclidean"),
            Metric::Dot => write!(f, "dot"),
        }
    }
}

impl std::str::FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "euclid" | "l2" => Ok(Metric::Euclidean),
            "dot" | "dotproduct" | "ip" => Ok(Metric::Dot),
            _ => Err(format!("unknown metric: {}", s)),
        }
    }
}

/// Backend placement hints used when an index is created.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisioningSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_number: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replication_factor: Option<u32>,
    #[serde(default)]
    pub on_disk: bool,
}

/// Everything needed to create an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub dimension: u64,
    pub metric: Metric,
    #[serde(default)]
    pub provisioning: ProvisioningSpec,
}

/// What a backend can tell about an existing index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    pub dimension: Option<u64>,
    pub entry_count: u64,
}

/// Acknowledgement of a single upsert call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UpsertResult {
    pub upserted_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_id() {
        assert_eq!(IndexEntry::row_id(0), "row-0");
        assert_eq!(IndexEntry::row_id(1042), "row-1042");
    }

    #[test]
    fn test_entry_truncates_text() {
        let text = "x".repeat(600);
        let entry = IndexEntry::new(3, vec![0.1, 0.2], &text, 512);

        assert_eq!(entry.id, "row-3");
        assert_eq!(entry.metadata.row_index, 3);
        assert_eq!(entry.metadata.text.chars().count(), 512);
    }

    #[test]
    fn test_entry_truncation_respects_char_boundaries() {
        let text = "é".repeat(600);
        let entry = IndexEntry::new(0, vec![], &text, 512);

        assert_eq!(entry.metadata.text.chars().count(), 512);
        assert!(entry.metadata.text.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_metric_parse() {
        assert_eq!("cosine".parse::<Metric>().unwrap(), Metric::Cosine);
        assert_eq!("L2".parse::<Metric>().unwrap(), Metric::Euclidean);
        assert_eq!("dotproduct".parse::<Metric>().unwrap(), Metric::Dot);
        assert!("manhattan".parse::<Metric>().is_err());
        assert_eq!(Metric::default().to_string(), "cosine");
    }
}
