//! Streaming, chunked reader over a delimited tabular file.

use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::SourceError;
use crate::models::Record;

/// Lazily yields groups of up to `chunk_size` records in source order.
///
/// Only one chunk is held in memory at a time. A fresh `open` restarts the
/// sequence from the first row.
pub struct ChunkedSource {
    path: PathBuf,
    reader: csv::Reader<File>,
    headers: Vec<String>,
    chunk_size: usize,
    next_ordinal: u64,
    pending_error: Option<SourceError>,
    finished: bool,
}

impl ChunkedSource {
    /// Open `path` for chunked reading.
    pub fn open(path: &Path, chunk_size: usize, delimiter: u8) -> Result<Self, SourceError> {
        if !path.is_file() {
            return Err(SourceError::NotFound(path.to_path_buf()));
        }

        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SourceError::NotFound(path.to_path_buf()),
            _ => SourceError::Open(format!("{}: {}", path.display(), e)),
        })?;

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(file);

        let headers = reader
            .headers()
            .map_err(|e| SourceError::Open(format!("{}: {}", path.display(), e)))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            reader,
            headers,
            chunk_size: chunk_size.max(1),
            next_ordinal: 0,
            pending_error: None,
            finished: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Rows handed out so far.
    pub fn rows_read(&self) -> u64 {
        self.next_ordinal
    }

    fn to_record(&self, row: &StringRecord) -> Record {
        // Short rows leave trailing columns absent; extra cells are ignored
        Record::from_pairs(
            self.next_ordinal,
            self.headers.iter().map(String::as_str).zip(row.iter()),
        )
    }
}

impl Iterator for ChunkedSource {
    type Item = Result<Vec<Record>, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_error.take() {
            return Some(Err(err));
        }
        if self.finished {
            return None;
        }

        let mut chunk = Vec::with_capacity(self.chunk_size.min(4096));
        let mut row = StringRecord::new();

        while chunk.len() < self.chunk_size {
            match self.reader.read_record(&mut row) {
                Ok(true) => {
                    let record = self.to_record(&row);
                    chunk.push(record);
                    self.next_ordinal += 1;
                }
                Ok(false) => {
                    self.finished = true;
                    break;
                }
                Err(e) => {
                    // Position after a read error is unreliable, stop here
                    self.finished = true;
                    let err = SourceError::Read {
                        row: self.next_ordinal,
                        message: e.to_string(),
                    };
                    if chunk.is_empty() {
                        return Some(Err(err));
                    }
                    self.pending_error = Some(err);
                    break;
                }
            }
        }

        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn numbered_csv(rows: usize) -> NamedTempFile {
        let mut content = String::from("name,mpg\n");
        for i in 0..rows {
            content.push_str(&format!("car {i},{i}\n"));
        }
        write_csv(&content)
    }

    #[test]
    fn test_missing_source() {
        let result = ChunkedSource::open(Path::new("/nonexistent/cars.csv"), 10, b',');
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[test]
    fn test_chunk_count_is_ceiling() {
        for (rows, chunk_size) in [(0, 3), (1, 1), (5, 2), (6, 3), (7, 3), (10, 1000), (1000, 1000)] {
            let file = numbered_csv(rows);
            let source = ChunkedSource::open(file.path(), chunk_size, b',').unwrap();
            let chunks: Vec<_> = source.map(Result::unwrap).collect();

            assert_eq!(
                chunks.len(),
                rows.div_ceil(chunk_size),
                "rows={rows} chunk_size={chunk_size}"
            );
            assert!(chunks.iter().all(|c| !c.is_empty() && c.len() <= chunk_size));
        }
    }

    #[test]
    fn test_concatenation_preserves_order() {
        let file = numbered_csv(11);
        let source = ChunkedSource::open(file.path(), 4, b',').unwrap();

        let records: Vec<Record> = source.map(Result::unwrap).flatten().collect();
        assert_eq!(records.len(), 11);
        for (i, record) in records.iter().enumerate() {
            assert_eq!(record.ordinal(), i as u64);
            assert_eq!(record.get("name"), Some(format!("car {i}").as_str()));
        }
    }

    #[test]
    fn test_missing_cells_and_short_rows() {
        let file = write_csv("name, mpg ,origin\nford,18,usa\nvw,,europe\ntoyota,31\n");
        let mut source = ChunkedSource::open(file.path(), 10, b',').unwrap();
        assert_eq!(source.headers(), ["name", "mpg", "origin"]);

        let chunk = source.next().unwrap().unwrap();
        assert_eq!(chunk.len(), 3);
        assert_eq!(chunk[0].get("mpg"), Some("18"));
        assert_eq!(chunk[1].get("mpg"), None);
        assert_eq!(chunk[2].get("mpg"), Some("31"));
        assert_eq!(chunk[2].get("origin"), None);
        assert!(source.next().is_none());
        assert_eq!(source.rows_read(), 3);
    }

    #[test]
    fn test_custom_delimiter() {
        let file = write_csv("name;mpg\nfiat;29\n");
        let mut source = ChunkedSource::open(file.path(), 5, b';').unwrap();

        let chunk = source.next().unwrap().unwrap();
        assert_eq!(chunk[0].get("name"), Some("fiat"));
        assert_eq!(chunk[0].get("mpg"), Some("29"));
    }

    #[test]
    fn test_zero_chunk_size_is_clamped() {
        let file = numbered_csv(2);
        let source = ChunkedSource::open(file.path(), 0, b',').unwrap();
        assert_eq!(source.chunk_size(), 1);
        assert_eq!(source.count(), 2);
    }
}
