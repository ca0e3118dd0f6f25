//! Two-column index tables: `id<TAB>sequence`, one index per line.
//!
//! Any run of whitespace separates the columns. Blank lines and lines
//! starting with `#` are skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::debug;

use crate::error::{DesignError, Result};
use crate::index::IndexPool;

pub fn read_index_table<R: BufRead>(reader: R) -> Result<IndexPool> {
    let mut entries = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        match fields.as_slice() {
            [id, sequence] => entries.push((id.to_string(), sequence.to_string())),
            _ => {
                return Err(DesignError::parse(
                    line_no,
                    format!("expected 2 columns (id, sequence), found {}", fields.len()),
                ))
            }
        }
    }

    let pool = IndexPool::new(entries)?;
    debug!(
        "Loaded {} indexes of length {}",
        pool.len(),
        pool.sequence_len()
    );
    Ok(pool)
}

pub fn load_index_table<P: AsRef<Path>>(path: P) -> Result<IndexPool> {
    let file = File::open(path.as_ref())?;
    read_index_table(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_table() {
        let text = "# i7 set\nD701\tATTACTCG\n\nD702  tccggaga\n";
        let pool = read_index_table(Cursor::new(text)).unwrap();
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.get("D702").unwrap().sequence, "TCCGGAGA");
    }

    #[test]
    fn test_wrong_column_count() {
        let text = "D701\tATTACTCG\nD702\tTCCGGAGA\textra\n";
        let err = read_index_table(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, DesignError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_length_mismatch_is_invalid_input() {
        let text = "D701\tATTACTCG\nD702\tTCCGGA\n";
        let err = read_index_table(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, DesignError::InvalidInput { .. }));
    }
}
