//! End-to-end merge: input dir → domains → merged splits → output files.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{info, instrument};

use splitmerge_shared::{Result, SplitLayout, SplitMergeError, SplitReport};

use crate::merge::{self, FilterPolicy, SplitDefinition};
use crate::writer;

/// Configuration for [`run_merge`].
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Directory containing one subdirectory per domain.
    pub input_dir: PathBuf,
    /// Directory the merged split files are written to.
    pub output_dir: PathBuf,
    /// Flag-column filter for train/validation.
    pub filter: FilterPolicy,
    /// Files read from each domain directory.
    pub definitions: Vec<SplitDefinition>,
    /// File naming of the output directory.
    pub output_layout: SplitLayout,
}

impl MergeConfig {
    /// Raw per-domain input names, combined output names.
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        filter: FilterPolicy,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            filter,
            definitions: SplitDefinition::for_layout(SplitLayout::Raw),
            output_layout: SplitLayout::Combined,
        }
    }
}

/// Result of [`run_merge`].
#[derive(Debug)]
pub struct MergeResult {
    /// One report per split, in definition order.
    pub splits: Vec<SplitReport>,
    /// Number of domain directories merged.
    pub domain_count: usize,
    /// Resolved output directory.
    pub output_dir: PathBuf,
    /// Total elapsed time.
    pub elapsed: Duration,
}

impl MergeResult {
    /// One line per split: unique rows, duplicates skipped, output path.
    pub fn summary(&self) -> String {
        self.splits
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Progress callback for reporting merge status.
pub trait MergeProgress {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after every split of a domain has been merged.
    fn domain_merged(&self, name: &str, current: usize, total: usize);
    /// Called when the merge completes.
    fn done(&self, result: &MergeResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl MergeProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn domain_merged(&self, _name: &str, _current: usize, _total: usize) {}
    fn done(&self, _result: &MergeResult) {}
}

/// Run the full merge.
///
/// 1. Resolve and validate the input directory
/// 2. Discover domain directories
/// 3. Merge every split in memory
/// 4. Create the output directory and write one file per split
///
/// Nothing is written unless step 3 succeeds for every split.
#[instrument(skip_all, fields(input = %config.input_dir.display(), output = %config.output_dir.display()))]
pub fn run_merge(config: &MergeConfig, progress: &dyn MergeProgress) -> Result<MergeResult> {
    let start = Instant::now();

    progress.phase("Discovering domains");
    if !config.input_dir.is_dir() {
        return Err(SplitMergeError::config(format!(
            "Input directory not found: {}",
            config.input_dir.display()
        )));
    }
    let input_dir = std::fs::canonicalize(&config.input_dir)
        .map_err(|e| SplitMergeError::io(&config.input_dir, e))?;
    let domains = merge::discover_domains(&input_dir)?;

    info!(
        input = %input_dir.display(),
        domains = domains.len(),
        filter = config.filter.enabled,
        "merging domain splits"
    );

    progress.phase("Merging splits");
    let merged = merge::merge(&domains, &config.definitions, &config.filter, progress)?;

    progress.phase("Writing splits");
    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| SplitMergeError::io(&config.output_dir, e))?;
    let output_dir = std::fs::canonicalize(&config.output_dir)
        .map_err(|e| SplitMergeError::io(&config.output_dir, e))?;

    let mut splits = Vec::with_capacity(merged.len());
    for m in &merged {
        splits.push(writer::write_split(&output_dir, m, config.output_layout)?);
    }

    let result = MergeResult {
        splits,
        domain_count: domains.len(),
        output_dir,
        elapsed: start.elapsed(),
    };

    info!(
        domains = result.domain_count,
        output = %result.output_dir.display(),
        elapsed_ms = result.elapsed.as_millis() as u64,
        "merge complete"
    );

    progress.done(&result);
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::test_support::TempTree;
    use splitmerge_shared::Split;

    fn write_domain(tree: &TempTree, name: &str, content: &str) {
        for split in Split::ALL {
            tree.write(&format!("{name}/{}", split.file_name(SplitLayout::Raw)), content);
        }
    }

    fn example_tree(prefix: &str) -> TempTree {
        let tree = TempTree::new(prefix);
        write_domain(&tree, "D1", "text,In Use\na,1\nb,0\n");
        write_domain(&tree, "D2", "text,In Use\na,1\nc,1\n");
        tree
    }

    #[derive(Default)]
    struct RecordingProgress {
        events: RefCell<Vec<String>>,
    }

    impl MergeProgress for RecordingProgress {
        fn phase(&self, name: &str) {
            self.events.borrow_mut().push(format!("phase:{name}"));
        }
        fn domain_merged(&self, name: &str, current: usize, total: usize) {
            self.events.borrow_mut().push(format!("domain:{name}:{current}/{total}"));
        }
        fn done(&self, result: &MergeResult) {
            self.events.borrow_mut().push(format!("done:{}", result.splits.len()));
        }
    }

    #[test]
    fn end_to_end_example() {
        let tree = TempTree::new("pipeline-example");
        write_domain(&tree, "in/D1", "text,In Use\na,1\nb,0\n");
        write_domain(&tree, "in/D2", "text,In Use\na,1\nc,1\n");
        let out = tree.root.join("combined");
        let config = MergeConfig::new(tree.root.join("in"), &out, FilterPolicy::default());

        let result = run_merge(&config, &SilentProgress).unwrap();
        assert_eq!(result.domain_count, 2);
        assert_eq!(result.splits.len(), 3);

        let train = std::fs::read_to_string(out.join("train.csv")).unwrap();
        assert_eq!(train, "text,In Use\r\na,1\r\nc,1\r\n");
        let test = std::fs::read_to_string(out.join("test.csv")).unwrap();
        assert_eq!(test, "text,In Use\r\na,1\r\nb,0\r\nc,1\r\n");

        let summary = result.summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("train: wrote 2 unique rows (duplicates skipped: 1) -> "));
        assert!(lines[0].ends_with("train.csv"));
        assert!(lines[1].starts_with("validation: wrote 2 unique rows"));
        assert!(lines[2].starts_with("test: wrote 3 unique rows (duplicates skipped: 1)"));
    }

    #[test]
    fn rerun_is_byte_identical() {
        let tree = example_tree("pipeline-idempotent");
        let out = TempTree::new("pipeline-idempotent-out");
        let config = MergeConfig::new(&tree.root, &out.root, FilterPolicy::default());

        let first = run_merge(&config, &SilentProgress).unwrap();
        let before: Vec<Vec<u8>> = first
            .splits
            .iter()
            .map(|s| std::fs::read(&s.output_path).unwrap())
            .collect();

        let second = run_merge(&config, &SilentProgress).unwrap();
        for (report, bytes) in second.splits.iter().zip(&before) {
            assert_eq!(&std::fs::read(&report.output_path).unwrap(), bytes);
        }
        let hashes = |r: &MergeResult| r.splits.iter().map(|s| s.sha256.clone()).collect::<Vec<_>>();
        assert_eq!(hashes(&first), hashes(&second));
    }

    #[test]
    fn failure_writes_nothing() {
        let tree = TempTree::new("pipeline-mismatch");
        write_domain(&tree, "D1", "text,In Use\na,1\n");
        write_domain(&tree, "D2", "text,Label\na,1\n");
        let out = tree.root.with_extension("out");
        let config = MergeConfig::new(&tree.root, &out, FilterPolicy::default());

        let err = run_merge(&config, &SilentProgress).unwrap_err();
        assert!(matches!(err, SplitMergeError::HeaderMismatch { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn missing_input_dir_is_config_error() {
        let tree = TempTree::new("pipeline-missing");
        let config = MergeConfig::new(
            tree.root.join("absent"),
            tree.root.join("out"),
            FilterPolicy::default(),
        );
        let err = run_merge(&config, &SilentProgress).unwrap_err();
        assert!(err.to_string().contains("Input directory not found"));
    }

    #[test]
    fn reports_progress() {
        let tree = example_tree("pipeline-progress");
        let out = TempTree::new("pipeline-progress-out");
        let config = MergeConfig::new(&tree.root, &out.root, FilterPolicy::disabled());
        let progress = RecordingProgress::default();

        run_merge(&config, &progress).unwrap();
        let events = progress.events.into_inner();
        assert_eq!(
            events,
            [
                "phase:Discovering domains",
                "phase:Merging splits",
                "domain:D1:1/2",
                "domain:D2:2/2",
                "phase:Writing splits",
                "done:3",
            ]
        );
    }
}
