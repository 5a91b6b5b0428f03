//! Shared types, error model, and configuration for splitmerge.
//!
//! This crate is the foundation depended on by all other splitmerge crates.
//! It provides:
//! - [`SplitMergeError`] — the unified error type
//! - Domain types ([`Split`], [`SplitLayout`], [`SplitReport`])
//! - Configuration ([`AppConfig`], [`MergeSettings`], [`HubSettings`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DEFAULT_FILTER_COLUMN, HubSettings, MergeSettings, config_dir, config_file_path,
    expand_home, init_config, load_config, load_config_from, resolve_hub_token,
};
pub use error::{Result, SplitMergeError};
pub use types::{Split, SplitLayout, SplitReport};
