//! Order-preserving deduplication of domain shards into global splits.

use std::collections::HashMap;
use std::collections::hash_map::RandomState;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use splitmerge_shared::{DEFAULT_FILTER_COLUMN, Result, Split, SplitLayout, SplitMergeError};

use crate::pipeline::MergeProgress;
use crate::shard::read_shard;

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// A domain directory contributing one file per split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainShard {
    pub name: String,
    pub path: PathBuf,
}

/// Which file to read for a split in every domain directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitDefinition {
    pub split: Split,
    pub file_name: String,
}

impl SplitDefinition {
    pub fn new(split: Split, file_name: impl Into<String>) -> Self {
        Self {
            split,
            file_name: file_name.into(),
        }
    }

    /// One definition per split, in [`Split::ALL`] order, using `layout` file names.
    pub fn for_layout(layout: SplitLayout) -> Vec<Self> {
        Split::ALL
            .iter()
            .map(|&split| Self::new(split, split.file_name(layout)))
            .collect()
    }
}

/// List the domain subdirectories of `base_dir`, sorted by path.
///
/// Plain files in `base_dir` are ignored.
pub fn discover_domains(base_dir: &Path) -> Result<Vec<DomainShard>> {
    if !base_dir.is_dir() {
        return Err(SplitMergeError::config(format!(
            "Input directory not found: {}",
            base_dir.display()
        )));
    }

    let entries = std::fs::read_dir(base_dir).map_err(|e| SplitMergeError::io(base_dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| SplitMergeError::io(base_dir, e))?.path();
        if path.is_dir() {
            paths.push(path);
        }
    }
    paths.sort();

    if paths.is_empty() {
        return Err(SplitMergeError::structure(format!(
            "No domain directories found in {}",
            base_dir.display()
        )));
    }

    Ok(paths
        .into_iter()
        .map(|path| DomainShard {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// FilterPolicy
// ---------------------------------------------------------------------------

/// Flag-column filter applied to train and validation rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    pub enabled: bool,
    pub column: String,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            column: DEFAULT_FILTER_COLUMN.into(),
        }
    }
}

impl FilterPolicy {
    pub fn new(enabled: bool, column: impl Into<String>) -> Self {
        Self {
            enabled,
            column: column.into(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Index of the flag column when it applies to `split`, `None` otherwise.
    fn flag_index(&self, split: Split, header: &[String]) -> Option<usize> {
        if !self.enabled || !split.is_filterable() {
            return None;
        }
        header.iter().position(|c| *c == self.column)
    }

    /// Whether `row` survives the filter. Rows are kept unless the flag
    /// column exists and holds exactly `"0"`.
    pub fn keeps(&self, split: Split, header: &[String], row: &[String]) -> bool {
        match self.flag_index(split, header) {
            Some(idx) => row.get(idx).is_none_or(|v| v != "0"),
            None => true,
        }
    }
}

// ---------------------------------------------------------------------------
// SplitStore
// ---------------------------------------------------------------------------

/// Rows of one split in first-seen order, keyed by their full value tuple.
///
/// Each row is stored once; the index maps a row hash to the positions of
/// the rows sharing it.
#[derive(Debug, Default)]
pub struct SplitStore {
    header: Option<Vec<String>>,
    hasher: RandomState,
    index: HashMap<u64, Vec<usize>>,
    rows: Vec<Vec<String>>,
    duplicates: usize,
    filtered: usize,
}

impl SplitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header established by the first shard, if any has been added.
    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    /// Add a row. Returns `false` and counts a duplicate when an identical
    /// row was inserted before.
    pub fn insert(&mut self, row: Vec<String>) -> bool {
        let positions = self.index.entry(self.hasher.hash_one(&row)).or_default();
        if positions.iter().any(|&i| self.rows[i] == row) {
            self.duplicates += 1;
            return false;
        }
        positions.push(self.rows.len());
        self.rows.push(row);
        true
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    fn into_merged(self, split: Split) -> MergedSplit {
        MergedSplit {
            split,
            header: self.header.unwrap_or_default(),
            rows: self.rows,
            duplicates: self.duplicates,
            filtered: self.filtered,
        }
    }
}

/// A fully merged split, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedSplit {
    pub split: Split,
    pub header: Vec<String>,
    /// Unique rows in first-occurrence order.
    pub rows: Vec<Vec<String>>,
    pub duplicates: usize,
    pub filtered: usize,
}

// ---------------------------------------------------------------------------
// merge
// ---------------------------------------------------------------------------

/// Merge every split across `domains`.
///
/// Domains are visited in the given order and, within each domain, splits
/// in `definitions` order. A missing split file or a header that differs
/// from the first one seen for that split aborts the whole merge.
#[instrument(skip_all, fields(domains = domains.len(), splits = definitions.len()))]
pub fn merge(
    domains: &[DomainShard],
    definitions: &[SplitDefinition],
    filter: &FilterPolicy,
    progress: &dyn MergeProgress,
) -> Result<Vec<MergedSplit>> {
    if domains.is_empty() {
        return Err(SplitMergeError::structure("no domain directories to merge"));
    }

    let mut stores: Vec<SplitStore> = definitions.iter().map(|_| SplitStore::new()).collect();

    for (i, domain) in domains.iter().enumerate() {
        for (definition, store) in definitions.iter().zip(stores.iter_mut()) {
            let path = domain.path.join(&definition.file_name);
            if !path.is_file() {
                return Err(SplitMergeError::structure(format!(
                    "Missing {} in {}",
                    definition.file_name,
                    domain.path.display()
                )));
            }

            let shard = read_shard(&path, store.header())?;
            let split = definition.split;
            let before = (store.len(), store.duplicates);

            for row in shard.rows {
                if !filter.keeps(split, &shard.header, &row) {
                    store.filtered += 1;
                    continue;
                }
                store.insert(row);
            }
            if store.header.is_none() {
                store.header = Some(shard.header);
            }

            debug!(
                domain = %domain.name,
                %split,
                added = store.len() - before.0,
                duplicates = store.duplicates - before.1,
                "merged shard"
            );
        }
        progress.domain_merged(&domain.name, i + 1, domains.len());
    }

    let merged: Vec<MergedSplit> = definitions
        .iter()
        .zip(stores)
        .map(|(definition, store)| store.into_merged(definition.split))
        .collect();

    for m in &merged {
        info!(
            split = %m.split,
            unique = m.rows.len(),
            duplicates = m.duplicates,
            filtered = m.filtered,
            "split merged"
        );
    }

    Ok(merged)
}
