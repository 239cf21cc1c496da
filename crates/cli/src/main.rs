//! blockrev command-line tool.
//!
//! Provides subcommands for diffing and merging block tree snapshots stored
//! as JSON files, computing the next semantic version for an edit, and
//! generating / validating configuration files.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use blockrev_core::classify::ChangeClassifier;
use blockrev_core::config::EngineConfig;
use blockrev_core::conflict::{MergeConflict, MergeStrategy, TreeMerger};
use blockrev_core::diff::{BlockChange, ChangeAction, TreeDiffer};
use blockrev_core::tree::BlockTree;
use blockrev_core::version::SemVer;

const DEFAULT_CONFIG_PATH: &str = "./blockrev.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// blockrev command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "blockrev",
    version,
    about = "Diff, merge, and version block-structured documents"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the block changes between two snapshots.
    Diff {
        /// Old snapshot (JSON block array).
        old: PathBuf,
        /// New snapshot (JSON block array).
        new: PathBuf,
        /// Print the change list as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Three-way merge two edited snapshots against their common base.
    Merge {
        base: PathBuf,
        ours: PathBuf,
        theirs: PathBuf,

        /// Conflict strategy: ours, theirs, or manual (overrides config).
        #[arg(short, long)]
        strategy: Option<String>,

        /// Write the merged snapshot here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full merge result (content and conflicts) as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Compute the next version for an edit.
    Bump {
        /// Current version (lenient, e.g. "1.2" or "v2.0.1").
        #[arg(long, default_value = "1.0.0")]
        from: String,
        old: PathBuf,
        new: PathBuf,
        /// The document title changed as part of the edit.
        #[arg(long)]
        title_changed: bool,
        /// The document banner changed as part of the edit.
        #[arg(long)]
        banner_changed: bool,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli.config);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// `RUST_LOG` wins; otherwise the configured level, or `warn` without a
/// readable config. Logs go to stderr so JSON output stays clean.
fn init_tracing(config_path: &Path) {
    let level = EngineConfig::load_from_file(config_path)
        .map(|c| c.engine.log_level)
        .unwrap_or_else(|_| "warn".into());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        command => {
            let config = load_config(&cli.config)?;
            match command {
                Commands::Diff { old, new, json } => cmd_diff(&config, &old, &new, json),
                Commands::Merge {
                    base,
                    ours,
                    theirs,
                    strategy,
                    output,
                    json,
                } => cmd_merge(
                    &config,
                    [&base, &ours, &theirs],
                    strategy.as_deref(),
                    output.as_deref(),
                    json,
                ),
                Commands::Bump {
                    from,
                    old,
                    new,
                    title_changed,
                    banner_changed,
                } => cmd_bump(&config, &from, &old, &new, title_changed, banner_changed),
                Commands::Init { .. } | Commands::Validate => unreachable!(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Input helpers
// ---------------------------------------------------------------------------

/// Load and validate the config. A missing file at the default path means
/// built-in defaults; a missing file anywhere else is an error.
fn load_config(path: &Path) -> Result<EngineConfig> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG_PATH) {
        debug!(path = %path.display(), "no config file, using defaults");
        return Ok(EngineConfig::default());
    }
    EngineConfig::load_and_validate(path).context("failed to load configuration file")
}

fn read_tree(path: &Path) -> Result<BlockTree> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let tree = BlockTree::from_json(&json)
        .with_context(|| format!("failed to parse block tree in {}", path.display()))?;
    tree.validate()
        .with_context(|| format!("invalid block tree in {}", path.display()))?;
    Ok(tree)
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_diff(config: &EngineConfig, old: &Path, new: &Path, json: bool) -> Result<()> {
    let (old_tree, new_tree) = (read_tree(old)?, read_tree(new)?);
    let changes = TreeDiffer::diff_at(&old_tree, &new_tree, &config.engine.root_path);

    if json {
        println!("{}", serde_json::to_string_pretty(&changes)?);
        return Ok(());
    }

    if changes.is_empty() {
        println!("{}", style::success("No block changes."));
        return Ok(());
    }

    println!("{}", change_table(&changes));
    let severity = ChangeClassifier::classify_with(&changes, false, false, config.classifier);
    println!();
    println!("{} change(s), severity: {}", changes.len(), style::severity(severity));
    Ok(())
}

fn cmd_merge(
    config: &EngineConfig,
    [base, ours, theirs]: [&PathBuf; 3],
    strategy: Option<&str>,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut options = config.merge_options();
    if let Some(s) = strategy {
        options.strategy = MergeStrategy::from_str_val(s)
            .ok_or_else(|| anyhow::anyhow!("unknown strategy '{}' (expected ours, theirs, or manual)", s))?;
    }

    let result = TreeMerger::merge_with(
        &read_tree(base)?,
        &read_tree(ours)?,
        &read_tree(theirs)?,
        &options,
    );

    let rendered = if json {
        serde_json::to_string_pretty(&result)?
    } else {
        result.content.to_json_pretty()
    };
    match output {
        Some(path) => {
            std::fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("{}", style::success(&format!("Merged snapshot written to {}", path.display())));
        }
        None => println!("{rendered}"),
    }

    if result.success {
        eprintln!("{}", style::success("Merged cleanly."));
    } else {
        eprintln!(
            "{}",
            style::warn(&format!(
                "{} conflict(s), strategy: {}",
                result.conflicts.len(),
                options.strategy
            ))
        );
        eprintln!("{}", conflict_table(&result.conflicts));
    }
    Ok(())
}

fn cmd_bump(
    config: &EngineConfig,
    from: &str,
    old: &Path,
    new: &Path,
    title_changed: bool,
    banner_changed: bool,
) -> Result<()> {
    let current = SemVer::parse(Some(from));
    let changes = TreeDiffer::diff_at(&read_tree(old)?, &read_tree(new)?, &config.engine.root_path);
    let kind = ChangeClassifier::classify_with(&changes, title_changed, banner_changed, config.classifier);
    let next = current.increment(kind);

    println!("{} -> {} ({})", current, style::header(&next.to_string()), style::severity(kind));
    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    let body = EngineConfig::default()
        .to_toml_string()
        .context("failed to render default configuration")?;
    let contents = format!("# blockrev configuration\n\n{body}");
    std::fs::write(output, contents).context("failed to write config file")?;

    println!("{}", style::success(&format!("Default configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Pick a merge strategy (ours, theirs, manual) under [merge]");
    println!("  2. Validate with: blockrev validate --config {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config =
        EngineConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("{}", style::header("Configuration summary:"));
    println!("  Root path      : {}", config.engine.root_path);
    println!("  Log level      : {}", config.engine.log_level);
    println!("  Merge strategy : {}", config.merge.strategy);
    println!(
        "  Field merge    : {}",
        if config.merge.field_level { "enabled" } else { "disabled" }
    );
    println!("  Attribute-only : {:?}", config.classifier.attribute_only);
    println!();
    println!("Configuration is valid.");
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn change_table(changes: &[BlockChange]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Action", "Identity", "Type", "Path", "Details"]);

    for change in changes {
        table.add_row(vec![
            Cell::new(style::action(change.action)),
            Cell::new(&change.identity),
            Cell::new(change.block_type),
            Cell::new(style::dim(&change.path)),
            Cell::new(describe_change(change)),
        ]);
    }
    table
}

fn conflict_table(conflicts: &[MergeConflict]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Identity", "Kind", "Path", "Resolution"]);

    for conflict in conflicts {
        let resolution = conflict
            .resolution
            .map(|r| r.to_string())
            .unwrap_or_else(|| style::error("unresolved"));
        table.add_row(vec![
            Cell::new(&conflict.identity),
            Cell::new(conflict.kind),
            Cell::new(&conflict.path),
            Cell::new(resolution),
        ]);
    }
    table
}

/// One-line summary of what changed inside a block.
fn describe_change(change: &BlockChange) -> String {
    match change.action {
        ChangeAction::Added | ChangeAction::Removed => String::new(),
        ChangeAction::Moved => change
            .attribute_diffs
            .as_ref()
            .and_then(|d| d.get("position"))
            .map(|p| format!("{} → {}", plain(&p.from), plain(&p.to)))
            .unwrap_or_default(),
        ChangeAction::Modified => {
            let mut parts = Vec::new();
            if let Some(content) = &change.content_diff {
                parts.push(format!("text: {}", truncate(&content.to, 40)));
            }
            if let Some(diffs) = &change.attribute_diffs {
                parts.extend(
                    diffs
                        .iter()
                        .filter(|(key, _)| change.content_diff.is_none() || key.as_str() != "text")
                        .map(|(key, d)| format!("{}: {} → {}", key, plain(&d.from), plain(&d.to))),
                );
            }
            parts.join(", ")
        }
    }
}

/// Render a JSON value without quoting plain strings.
fn plain(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Utilities
// ---------------------------------------------------------------------------

fn truncate(s: &str, max_chars: usize) -> String {
    let first_line = s.lines().next().unwrap_or("");
    if first_line.chars().count() <= max_chars && !s.contains('\n') {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}
