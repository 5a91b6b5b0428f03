//! Reading a single per-domain split file.

use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use tracing::debug;

use splitmerge_shared::{Result, SplitMergeError};

/// UTF-8 byte-order mark.
const BOM: &[u8] = b"\xEF\xBB\xBF";

/// The parsed contents of one shard file.
#[derive(Debug, Clone)]
pub struct Shard {
    pub path: PathBuf,
    /// Column names in file order.
    pub header: Vec<String>,
    /// Row values in header order. Short records are padded with empty strings.
    pub rows: Vec<Vec<String>>,
}

/// Read a shard, validating its header against `expected` when given.
///
/// An empty header, a header differing from `expected` in names or order,
/// and records with more fields than the header are all fatal.
pub fn read_shard(path: &Path, expected: Option<&[String]>) -> Result<Shard> {
    let bytes = std::fs::read(path).map_err(|e| SplitMergeError::io(path, e))?;
    let content = bytes.strip_prefix(BOM).unwrap_or(&bytes[..]);

    // The header is the first physical line; the csv reader would skip a
    // blank one and promote the next line.
    if first_line(content).is_empty() {
        return Err(no_headers(path));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);

    let header: Vec<String> = reader
        .headers()
        .map_err(|e| csv_error(path, e))?
        .iter()
        .map(str::to_owned)
        .collect();

    if header.is_empty() {
        return Err(no_headers(path));
    }

    if let Some(expected) = expected {
        if header.as_slice() != expected {
            return Err(SplitMergeError::HeaderMismatch {
                path: path.to_path_buf(),
                expected: expected.to_vec(),
                found: header,
            });
        }
    }

    let width = header.len();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_error(path, e))?;
        if record.len() > width {
            let line = record.position().map_or(0, |p| p.line());
            return Err(SplitMergeError::structure(format!(
                "line {line} of {} has {} fields but the header has {width}",
                path.display(),
                record.len()
            )));
        }
        let mut values: Vec<String> = record.iter().map(str::to_owned).collect();
        values.resize(width, String::new());
        rows.push(values);
    }

    debug!(path = %path.display(), columns = width, rows = rows.len(), "read shard");

    Ok(Shard {
        path: path.to_path_buf(),
        header,
        rows,
    })
}

fn first_line(content: &[u8]) -> &[u8] {
    let end = content
        .iter()
        .position(|&b| b == b'\n' || b == b'\r')
        .unwrap_or(content.len());
    &content[..end]
}

fn no_headers(path: &Path) -> SplitMergeError {
    SplitMergeError::structure(format!("No headers found in {}", path.display()))
}

fn csv_error(path: &Path, e: csv::Error) -> SplitMergeError {
    SplitMergeError::parse(format!("{}: {e}", path.display()))
}
