//! Writing merged splits to disk.

use std::path::Path;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use sha2::{Digest, Sha256};
use tracing::debug;

use splitmerge_shared::{Result, SplitLayout, SplitMergeError, SplitReport};

use crate::merge::MergedSplit;

/// Serialise a merged split: header first, then rows in accumulation order.
///
/// Fields are quoted only when needed and records end with `\r\n`.
pub fn render_split(merged: &MergedSplit) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record(&merged.header)
        .map_err(|e| SplitMergeError::parse(format!("{} header: {e}", merged.split)))?;
    for row in &merged.rows {
        writer
            .write_record(row)
            .map_err(|e| SplitMergeError::parse(format!("{} row: {e}", merged.split)))?;
    }

    writer
        .into_inner()
        .map_err(|e| SplitMergeError::parse(format!("{}: {e}", merged.split)))
}

/// Write `merged` into `output_dir` under its `layout` file name,
/// replacing any existing file.
pub fn write_split(
    output_dir: &Path,
    merged: &MergedSplit,
    layout: SplitLayout,
) -> Result<SplitReport> {
    let bytes = render_split(merged)?;
    let target = output_dir.join(merged.split.file_name(layout));
    let temp = target.with_extension("csv.tmp");

    // Write to temp file first
    std::fs::write(&temp, &bytes).map_err(|e| SplitMergeError::io(&temp, e))?;

    // Atomic rename
    std::fs::rename(&temp, &target).map_err(|e| SplitMergeError::io(&target, e))?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = format!("{:x}", hasher.finalize());

    debug!(path = %target.display(), size = bytes.len(), %sha256, "wrote split");

    Ok(SplitReport {
        split: merged.split,
        unique_rows: merged.rows.len(),
        duplicates_skipped: merged.duplicates,
        filtered_rows: merged.filtered,
        output_path: target,
        sha256,
    })
}
