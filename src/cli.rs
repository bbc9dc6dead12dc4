use clap::{Parser, Subcommand};
use clap_complete::Shell;

use crate::paths::ENV_PROJECT_DIR;

#[derive(Parser)]
#[command(name = "sitesync")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Keep a site's pages and plugins in sync with a manifest", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Project directory (defaults to the nearest one holding sitesync.toml)
    #[arg(short = 'C', long = "project", global = true, env = ENV_PROJECT_DIR)]
    pub project: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show what a sync would change
    Diff(DiffArgs),

    /// Make the site match the manifest
    Sync(SyncArgs),

    /// Undo a sync from its snapshot
    Rollback(RollbackArgs),

    /// Inspect and prune pre-sync snapshots
    #[command(subcommand)]
    Snapshots(SnapshotsCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Diff
// ============================================================================

#[derive(Parser)]
pub struct DiffArgs {
    /// Report live pages missing from the manifest as removals
    #[arg(long)]
    pub strict: bool,

    /// Do not compare plugins
    #[arg(long)]
    pub no_plugins: bool,

    /// Print the diff as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Sync
// ============================================================================

#[derive(Parser)]
pub struct SyncArgs {
    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Report live pages missing from the manifest as removals
    #[arg(long)]
    pub strict: bool,

    /// Leave pages untouched
    #[arg(long)]
    pub skip_pages: bool,

    /// Leave plugins untouched
    #[arg(long)]
    pub skip_plugins: bool,

    /// Delete live pages missing from the manifest (needs --strict)
    #[arg(long)]
    pub sync_deletions: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Rollback
// ============================================================================

#[derive(Parser)]
pub struct RollbackArgs {
    /// Sync id to undo, or "latest"
    #[arg(default_value = "latest")]
    pub sync_id: String,

    /// Dry run - show what would be done
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Do not ask for confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

// ============================================================================
// Snapshots
// ============================================================================

#[derive(Subcommand)]
pub enum SnapshotsCommand {
    /// List snapshots, newest first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one snapshot
    Show {
        /// Sync id, or "latest"
        sync_id: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete all but the most recent snapshots
    Prune {
        /// Number of snapshots to keep (defaults to snapshots.keep)
        #[arg(short, long)]
        keep: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_sync_flags() {
        let cli = Cli::try_parse_from([
            "sitesync",
            "-vv",
            "sync",
            "--strict",
            "--sync-deletions",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Sync(args) = cli.command else {
            panic!("expected sync");
        };
        assert!(args.strict && args.sync_deletions && args.dry_run);
        assert!(!args.yes);
    }

    #[test]
    fn test_rollback_defaults_to_latest() {
        let cli = Cli::try_parse_from(["sitesync", "rollback"]).unwrap();
        let Command::Rollback(args) = cli.command else {
            panic!("expected rollback");
        };
        assert_eq!(args.sync_id, "latest");
    }

    #[test]
    fn test_global_project_flag() {
        let cli = Cli::try_parse_from(["sitesync", "snapshots", "list", "-C", "/srv/site"]).unwrap();
        assert_eq!(cli.project.as_deref(), Some("/srv/site"));
    }
}
