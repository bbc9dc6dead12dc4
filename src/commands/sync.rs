use anyhow::{Result, bail};
use reconcile::{
    DiffOptions, ExecutionMode, NoProgress, ProgressCallback, SyncOptions, SyncRequest, SyncResult,
    compute_live_diff, plan_sync, run_sync,
};
use serde::Serialize;
use std::path::PathBuf;

use crate::Context;
use crate::cli::SyncArgs;
use crate::commands::{Project, cancel_on_ctrl_c};
use crate::config::ProjectConfig;
use crate::progress::ConsoleProgress;
use crate::render;
use crate::ui;

/// Machine-readable outcome of `sitesync sync --json`
#[derive(Debug, Serialize)]
struct SyncReport<'a> {
    sync_id: Option<&'a str>,
    snapshot: Option<&'a PathBuf>,
    dry_run: bool,
    result: &'a SyncResult,
    pruned: &'a [String],
}

pub async fn run(ctx: &Context, args: SyncArgs) -> Result<()> {
    let project = Project::load(ctx)?;
    let manifest = project.manifest()?;
    let requester = project.connect()?;
    let (diff_options, sync_options) = options(&project.config, &args);

    if sync_options.sync_deletions && !diff_options.strict_mode {
        ui::warn("--sync-deletions has no effect without --strict");
    }

    if args.json {
        if !args.yes && !args.dry_run {
            bail!("--json does not prompt; pass --yes to apply or --dry-run to preview");
        }
    } else {
        ui::header(if args.dry_run { "Sync (dry run)" } else { "Sync" });
        ui::kv("Site", requester.base_url());

        let (diff, _live) = compute_live_diff(&manifest, &requester, diff_options).await?;
        let plan = plan_sync(&diff, &sync_options);
        render::display_diff(&diff);
        render::display_plan(&plan);

        if !plan.has_writes() {
            println!();
            ui::success("Nothing to apply");
            return Ok(());
        }
        if args.dry_run {
            println!();
            ui::info("Dry run - nothing was changed");
            return Ok(());
        }
        let prompt = format!(
            "Apply {} to {}?",
            ui::count(plan.executable().count(), "operation"),
            requester.base_url()
        );
        if !args.yes && !ui::confirm(&prompt)? {
            ui::info("Aborted");
            return Ok(());
        }
        println!();
    }

    let mut request = SyncRequest::new(&project.root, &manifest);
    request.diff_options = diff_options;
    request.sync_options = sync_options;
    request.keep_snapshots = project.config.snapshots.keep;
    request.cancel = Some(cancel_on_ctrl_c());

    let mut progress: Box<dyn ProgressCallback> = if args.json {
        Box::new(NoProgress)
    } else {
        Box::new(ConsoleProgress::new(ctx.quiet))
    };
    let run = run_sync(request, &requester, progress.as_mut()).await?;

    if args.json {
        ui::print_json(&SyncReport {
            sync_id: run.sync_id.as_deref(),
            snapshot: run.snapshot_path.as_ref(),
            dry_run: args.dry_run,
            result: &run.result,
            pruned: &run.pruned,
        })?;
    } else {
        if let Some(sync_id) = &run.sync_id {
            ui::kv("Snapshot", sync_id);
        }
        render::display_result(&run.result, "Sync");
        if !run.pruned.is_empty() {
            ui::dim(&format!(
                "Pruned {}",
                ui::count(run.pruned.len(), "old snapshot")
            ));
        }
        if let Some(sync_id) = run.sync_id.as_deref().filter(|_| !run.result.success) {
            ui::dim(&format!("Undo with: sitesync rollback {sync_id}"));
        }
    }

    if !run.result.success {
        bail!("{} failed", ui::count(run.result.summary.failed, "operation"));
    }
    Ok(())
}

fn options(config: &ProjectConfig, args: &SyncArgs) -> (DiffOptions, SyncOptions) {
    let mut diff = config.diff_options();
    diff.strict_mode |= args.strict;

    let sync = SyncOptions {
        mode: ExecutionMode::from_dry_run(args.dry_run),
        skip_pages: args.skip_pages,
        skip_plugins: args.skip_plugins,
        sync_deletions: args.sync_deletions || config.sync.sync_deletions,
    };
    (diff, sync)
}
