//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use splitmerge_core::{FilterPolicy, MergeConfig, MergeProgress, MergeResult};
use splitmerge_hub::{HubClient, PublishOptions, PublishProgress, PublishResult, RepoId};
use splitmerge_shared::{
    AppConfig, SplitLayout, expand_home, init_config, load_config, load_config_from,
    resolve_hub_token,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// splitmerge — deduplicate dataset shards into global splits.
#[derive(Parser)]
#[command(
    name = "splitmerge",
    version,
    about = "Combine per-domain CSV shards into deduplicated train/validation/test splits and publish them.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.splitmerge/splitmerge.toml.
    #[arg(long, global = true, env = "SPLITMERGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Combine per-domain CSVs into deduplicated global splits.
    Merge {
        /// Directory containing per-domain CSV folders (default: data/subtaskB).
        #[arg(long)]
        input_dir: Option<String>,

        /// Directory to write deduplicated CSV files (default: data/subtaskB_combined).
        #[arg(long)]
        output_dir: Option<String>,

        /// Disable filtering rows where the flag column is 0 for train/validation splits.
        #[arg(long)]
        no_filter_in_use: bool,

        /// Name of the flag column (default: "In Use").
        #[arg(long)]
        filter_column: Option<String>,
    },

    /// Upload split files to a dataset repository.
    Publish {
        /// Directory holding one CSV per split (default: data/subtaskB_combined,
        /// or data/subtaskA with --layout raw).
        #[arg(long)]
        dir: Option<String>,

        /// File naming in the directory: combined or raw.
        #[arg(long)]
        layout: Option<SplitLayout>,

        /// Target repository, e.g. yfhe/C-STANCE-B.
        #[arg(long)]
        repo_id: Option<String>,

        /// Create the repository as private.
        #[arg(long)]
        private: bool,

        /// Branch to commit to (default: main).
        #[arg(long)]
        revision: Option<String>,

        /// Commit summary.
        #[arg(short, long, default_value = "Upload dataset splits")]
        message: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so the merge
/// summary on stdout stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "splitmerge=info",
        1 => "splitmerge=debug",
        _ => "splitmerge=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config;
    match cli.command {
        Command::Merge {
            input_dir,
            output_dir,
            no_filter_in_use,
            filter_column,
        } => {
            let config = resolve_config(config_path.as_deref())?;
            cmd_merge(
                &config,
                input_dir.as_deref(),
                output_dir.as_deref(),
                no_filter_in_use,
                filter_column.as_deref(),
            )
        }
        Command::Publish {
            dir,
            layout,
            repo_id,
            private,
            revision,
            message,
        } => {
            let mut config = resolve_config(config_path.as_deref())?;
            if let Some(layout) = layout {
                config.hub.layout = layout;
            }
            if let Some(repo_id) = repo_id {
                config.hub.repo_id = repo_id;
            }
            if let Some(revision) = revision {
                config.hub.revision = revision;
            }
            config.hub.private |= private;
            cmd_publish(&config, dir.as_deref(), &message).await
        }
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path.as_deref()),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(p) => load_config_from(p)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn cmd_merge(
    config: &AppConfig,
    input_dir: Option<&str>,
    output_dir: Option<&str>,
    no_filter_in_use: bool,
    filter_column: Option<&str>,
) -> Result<()> {
    let settings = &config.merge;
    let input_dir = expand_home(input_dir.unwrap_or(settings.input_dir.as_str()));
    let output_dir = expand_home(output_dir.unwrap_or(settings.output_dir.as_str()));
    let filter = FilterPolicy::new(
        settings.filter_in_use && !no_filter_in_use,
        filter_column.unwrap_or(settings.filter_column.as_str()),
    );

    info!(
        input = %input_dir.display(),
        output = %output_dir.display(),
        filter = filter.enabled,
        column = %filter.column,
        "merging splits"
    );

    let merge_config = MergeConfig::new(input_dir, output_dir, filter);
    let reporter = CliProgress::new();
    let result = splitmerge_core::run_merge(&merge_config, &reporter);
    reporter.spinner.finish_and_clear();
    let result = result?;

    println!("{}", result.summary());
    Ok(())
}

async fn cmd_publish(config: &AppConfig, dir: Option<&str>, message: &str) -> Result<()> {
    let hub = &config.hub;
    let token = resolve_hub_token(hub)?;
    let repo = RepoId::parse(&hub.repo_id)?;

    let base_dir = expand_home(dir.unwrap_or(config.publish_dir()));
    let data_files = splitmerge_hub::resolve_data_files(&base_dir, hub.layout)?;

    let client = HubClient::new(hub, token)?;
    let options = PublishOptions {
        repo,
        private: hub.private,
        commit_message: message.to_string(),
    };

    info!(
        repo = %options.repo,
        dir = %base_dir.display(),
        layout = %hub.layout,
        private = options.private,
        "publishing dataset"
    );

    let reporter = CliProgress::new();
    let result = splitmerge_hub::publish(&client, &data_files, &options, &reporter).await;
    reporter.spinner.finish_and_clear();
    let result = result?;

    println!();
    println!("  Dataset published!");
    println!("  Repo:    {}", result.repo);
    println!("  Created: {}", if result.created { "yes" } else { "no (existing)" });
    println!("  Files:   {}", result.file_count);
    println!("  Commit:  {}", result.commit.commit_url);
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)
        .map_err(|e| eyre!("cannot render config: {e}"))?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl MergeProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn domain_merged(&self, name: &str, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Merging [{current}/{total}] {name}"));
    }

    fn done(&self, _result: &MergeResult) {
        self.spinner.finish_and_clear();
    }
}

impl PublishProgress for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn published(&self, _result: &PublishResult) {
        self.spinner.finish_and_clear();
    }
}
