//! Split merging for splitmerge.
//!
//! Combines per-domain CSV shards into deduplicated global train/validation/test
//! splits, preserving first-seen row order (e.g., [`pipeline::run_merge`]).

pub mod merge;
pub mod pipeline;
pub mod shard;
pub mod writer;

pub use merge::{DomainShard, FilterPolicy, MergedSplit, SplitDefinition, SplitStore};
pub use pipeline::{MergeConfig, MergeProgress, MergeResult, SilentProgress, run_merge};

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::PathBuf;

    /// A scratch directory under the system temp dir, removed on drop.
    pub struct TempTree {
        pub root: PathBuf,
    }

    impl TempTree {
        pub fn new(prefix: &str) -> Self {
            let root = std::env::temp_dir().join(format!(
                "sm-{prefix}-{}",
                uuid::Uuid::now_v7()
            ));
            std::fs::create_dir_all(&root).unwrap();
            Self { root }
        }

        /// Write `content` to `rel`, creating parent directories.
        pub fn write(&self, rel: &str, content: &str) -> PathBuf {
            let path = self.root.join(rel);
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&path, content).unwrap();
            path
        }
    }

    impl Drop for TempTree {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    pub fn header(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|c| c.to_string()).collect()
    }

    pub fn row(values: &[&str]) -> Vec<String> {
        header(values)
    }
}
