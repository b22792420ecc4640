use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::error::HitFileError;
use super::hit::Hit;

/// What to do with a record that cannot be parsed into a Hit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Warn and move on to the next line
    #[default]
    Skip,
    /// Fail the whole stage
    Abort,
}

/// HitFile reads the plain-text hit data one record at a time.
///
/// The first line of the file is a header and is discarded. Every other non-blank line
/// is expected to hold `timestamp detector_id energy`. Malformed lines are handled
/// according to the MalformedPolicy.
#[derive(Debug)]
pub struct HitFile<R: BufRead> {
    reader: R,
    path: PathBuf,
    n_channels: usize,
    policy: MalformedPolicy,
    line_buffer: String,
    line_number: u64,
    bytes_read: u64,
    size_bytes: u64,
    n_skipped: u64,
}

impl HitFile<BufReader<File>> {
    /// Open a HitFile at path, consuming the header line
    pub fn open(
        path: &Path,
        n_channels: usize,
        policy: MalformedPolicy,
    ) -> Result<Self, HitFileError> {
        if !path.exists() {
            return Err(HitFileError::BadFilePath(path.to_path_buf()));
        }
        let file = File::open(path)?;
        let size_bytes = file.metadata()?.len();
        Self::new(BufReader::new(file), path, size_bytes, n_channels, policy)
    }
}

impl<R: BufRead> HitFile<R> {
    /// Wrap any buffered reader. `size_bytes` is only used for progress reporting.
    pub fn new(
        reader: R,
        path: &Path,
        size_bytes: u64,
        n_channels: usize,
        policy: MalformedPolicy,
    ) -> Result<Self, HitFileError> {
        let mut hit_file = Self {
            reader,
            path: path.to_path_buf(),
            n_channels,
            policy,
            line_buffer: String::new(),
            line_number: 0,
            bytes_read: 0,
            size_bytes,
            n_skipped: 0,
        };
        // Skip the header
        if !hit_file.read_line()? {
            return Err(HitFileError::MissingHeader(hit_file.path));
        }
        Ok(hit_file)
    }

    /// Get the next hit in the file.
    ///
    /// Returns a `Result<Option<Hit>>`. The Option is None once the file has no more data.
    pub fn get_next_hit(&mut self) -> Result<Option<Hit>, HitFileError> {
        loop {
            if !self.read_line()? {
                return Ok(None);
            }
            let record = self.line_buffer.trim();
            if record.is_empty() {
                continue;
            }
            match Hit::parse(record, self.n_channels) {
                Ok(hit) => return Ok(Some(hit)),
                Err(e) => match self.policy {
                    MalformedPolicy::Skip => {
                        spdlog::warn!(
                            "Skipping malformed record at line {} of {}: {}",
                            self.line_number,
                            self.path.display(),
                            e
                        );
                        self.n_skipped += 1;
                    }
                    MalformedPolicy::Abort => {
                        return Err(HitFileError::MalformedRecord {
                            line: self.line_number,
                            source: e,
                        })
                    }
                },
            }
        }
    }

    /// Fraction of the file consumed so far
    pub fn get_progress(&self) -> f32 {
        if self.size_bytes == 0 {
            return 1.0;
        }
        (self.bytes_read as f64 / self.size_bytes as f64).min(1.0) as f32
    }

    pub fn get_size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn get_skipped_count(&self) -> u64 {
        self.n_skipped
    }

    pub fn get_line_number(&self) -> u64 {
        self.line_number
    }

    /// Read the next line into the buffer. Returns false at end-of-file
    fn read_line(&mut self) -> Result<bool, HitFileError> {
        self.line_buffer.clear();
        let n_bytes = self.reader.read_line(&mut self.line_buffer)?;
        if n_bytes == 0 {
            return Ok(false);
        }
        self.bytes_read += n_bytes as u64;
        self.line_number += 1;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_file(text: &str, policy: MalformedPolicy) -> HitFile<Cursor<Vec<u8>>> {
        let bytes = text.as_bytes().to_vec();
        let size = bytes.len() as u64;
        HitFile::new(Cursor::new(bytes), Path::new("test.txt"), size, 47, policy).unwrap()
    }

    fn read_all(file: &mut HitFile<Cursor<Vec<u8>>>) -> Result<Vec<Hit>, HitFileError> {
        let mut hits = Vec::new();
        while let Some(hit) = file.get_next_hit()? {
            hits.push(hit);
        }
        Ok(hits)
    }

    #[test]
    fn test_header_is_skipped() {
        let mut file = make_file(
            "TIMESTAMP ID E\n0 0 1000.0\n500 0 2000.0\n",
            MalformedPolicy::Skip,
        );
        let hits = read_all(&mut file).unwrap();
        assert_eq!(hits, vec![Hit::new(0, 0, 1000.0), Hit::new(500, 0, 2000.0)]);
        assert_eq!(file.get_progress(), 1.0);
    }

    #[test]
    fn test_blank_lines_and_missing_trailing_newline() {
        let mut file = make_file("header\n\n10 1 5.5\n   \n20 2 6.5", MalformedPolicy::Abort);
        let hits = read_all(&mut file).unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1], Hit::new(20, 2, 6.5));
    }

    #[test]
    fn test_skip_policy() {
        let mut file = make_file(
            "header\n10 1 5.5\n20 x 6.5\n30 99 1.0\n40 3 7.5\n",
            MalformedPolicy::Skip,
        );
        let hits = read_all(&mut file).unwrap();
        assert_eq!(hits, vec![Hit::new(10, 1, 5.5), Hit::new(40, 3, 7.5)]);
        assert_eq!(file.get_skipped_count(), 2);
    }

    #[test]
    fn test_abort_policy() {
        let mut file = make_file("header\n10 1 5.5\n20 x 6.5\n40 3 7.5\n", MalformedPolicy::Abort);
        match read_all(&mut file) {
            Err(HitFileError::MalformedRecord { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected a malformed record error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_file() {
        let result = HitFile::new(
            Cursor::new(Vec::new()),
            Path::new("empty.txt"),
            0,
            47,
            MalformedPolicy::Skip,
        );
        assert!(matches!(result, Err(HitFileError::MissingHeader(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = HitFile::open(Path::new("/not/here/data.txt"), 47, MalformedPolicy::Skip);
        assert!(matches!(result, Err(HitFileError::BadFilePath(_))));
    }
}
