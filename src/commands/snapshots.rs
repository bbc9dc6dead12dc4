use anyhow::{Result, bail};
use reconcile::{cleanup_old_snapshots, list_pre_sync_snapshots, load_pre_sync_snapshot};

use crate::Context;
use crate::cli::SnapshotsCommand;
use crate::commands::Project;
use crate::render;
use crate::ui;

pub fn run(ctx: &Context, cmd: SnapshotsCommand) -> Result<()> {
    let project = Project::load(ctx)?;

    match cmd {
        SnapshotsCommand::List { json } => {
            let snapshots = list_pre_sync_snapshots(&project.root)?;
            if json {
                return ui::print_json(&snapshots);
            }
            render::display_snapshot_list(&snapshots);
        }
        SnapshotsCommand::Show { sync_id, json } => {
            let sync_id = project.resolve_sync_id(&sync_id)?;
            let Some(snapshot) = load_pre_sync_snapshot(&project.root, &sync_id)? else {
                bail!("No snapshot '{sync_id}'");
            };
            if json {
                return ui::print_json(&snapshot);
            }
            render::display_snapshot(&snapshot);
        }
        SnapshotsCommand::Prune { keep } => {
            let keep = keep.unwrap_or(project.config.snapshots.keep);
            if keep == 0 {
                ui::warn("Keeping at least the most recent snapshot");
            }
            let removed = cleanup_old_snapshots(&project.root, keep)?;
            if removed.is_empty() {
                ui::info("Nothing to prune");
            } else {
                if ctx.verbose > 0 {
                    for sync_id in &removed {
                        ui::dim(sync_id);
                    }
                }
                ui::success(&format!("Removed {}", ui::count(removed.len(), "snapshot")));
            }
        }
    }

    Ok(())
}
