//! Core domain types for splitmerge datasets.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Split
// ---------------------------------------------------------------------------

/// A named partition of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
    Test,
}

impl Split {
    /// All splits, in the order they are processed and reported.
    pub const ALL: [Split; 3] = [Split::Train, Split::Validation, Split::Test];

    /// Lowercase split name as used in file names and summaries.
    pub fn as_str(self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Validation => "validation",
            Split::Test => "test",
        }
    }

    /// Whether flag-column filtering may apply. The test split is never filtered.
    pub fn is_filterable(self) -> bool {
        !matches!(self, Split::Test)
    }

    /// File name of this split under the given layout.
    pub fn file_name(self, layout: SplitLayout) -> &'static str {
        match (layout, self) {
            (SplitLayout::Raw, Split::Train) => "raw_train_all_onecol.csv",
            (SplitLayout::Raw, Split::Validation) => "raw_val_all_onecol.csv",
            (SplitLayout::Raw, Split::Test) => "raw_test_all_onecol.csv",
            (SplitLayout::Combined, Split::Train) => "train.csv",
            (SplitLayout::Combined, Split::Validation) => "validation.csv",
            (SplitLayout::Combined, Split::Test) => "test.csv",
        }
    }
}

impl fmt::Display for Split {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Split {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "train" => Ok(Split::Train),
            "validation" | "val" => Ok(Split::Validation),
            "test" => Ok(Split::Test),
            other => Err(format!(
                "unknown split '{other}': expected 'train', 'validation', or 'test'"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// SplitLayout
// ---------------------------------------------------------------------------

/// File-naming convention of a directory holding one file per split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitLayout {
    /// Per-domain source files (`raw_train_all_onecol.csv`, ...).
    Raw,
    /// Merged output files (`train.csv`, ...).
    #[default]
    Combined,
}

impl fmt::Display for SplitLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitLayout::Raw => f.write_str("raw"),
            SplitLayout::Combined => f.write_str("combined"),
        }
    }
}

impl FromStr for SplitLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "raw" => Ok(SplitLayout::Raw),
            "combined" => Ok(SplitLayout::Combined),
            other => Err(format!(
                "unknown layout '{other}': expected 'raw' or 'combined'"
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// SplitReport
// ---------------------------------------------------------------------------

/// Outcome of writing one merged split to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitReport {
    pub split: Split,
    /// Rows written (after filtering and dedup).
    pub unique_rows: usize,
    /// Rows dropped because an identical row was seen earlier.
    pub duplicates_skipped: usize,
    /// Rows dropped by the flag-column filter.
    pub filtered_rows: usize,
    /// Where the split was written.
    pub output_path: PathBuf,
    /// Hex SHA-256 of the written file.
    pub sha256: String,
}

impl fmt::Display for SplitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: wrote {} unique rows (duplicates skipped: {}) -> {}",
            self.split,
            self.unique_rows,
            self.duplicates_skipped,
            self.output_path.display()
        )
    }
}
