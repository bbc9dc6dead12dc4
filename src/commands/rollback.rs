use anyhow::{Result, bail};
use reconcile::{
    ExecutionMode, NoProgress, ProgressCallback, RollbackLookup, RollbackOptions,
    load_pre_sync_snapshot, plan_rollback, rollback_by_id,
};

use crate::Context;
use crate::cli::RollbackArgs;
use crate::commands::{Project, cancel_on_ctrl_c};
use crate::progress::ConsoleProgress;
use crate::render;
use crate::ui;

pub async fn run(ctx: &Context, args: RollbackArgs) -> Result<()> {
    let project = Project::load(ctx)?;
    let sync_id = project.resolve_sync_id(&args.sync_id)?;

    let Some(snapshot) = load_pre_sync_snapshot(&project.root, &sync_id)? else {
        bail!("No snapshot '{sync_id}'. See `sitesync snapshots list`");
    };
    let plan = plan_rollback(&snapshot);

    if args.dry_run {
        if args.json {
            return ui::print_json(&plan);
        }
        ui::header(&format!("Rollback {sync_id} (dry run)"));
        render::display_plan(&plan);
        println!();
        ui::info("Dry run - nothing was changed");
        return Ok(());
    }

    if plan.executable().next().is_none() {
        if !args.json {
            ui::success("Nothing to roll back");
        }
        return Ok(());
    }

    let requester = project.connect()?;
    if args.json {
        if !args.yes {
            bail!("--json does not prompt; pass --yes to roll back");
        }
    } else {
        ui::header(&format!("Rollback {sync_id}"));
        ui::kv("Site", requester.base_url());
        render::display_plan(&plan);
        let prompt = format!(
            "Undo {} on {}?",
            ui::count(plan.executable().count(), "operation"),
            requester.base_url()
        );
        if !args.yes && !ui::confirm(&prompt)? {
            ui::info("Aborted");
            return Ok(());
        }
        println!();
    }

    let options = RollbackOptions {
        mode: ExecutionMode::Apply,
        cancel: Some(cancel_on_ctrl_c()),
    };
    let mut progress: Box<dyn ProgressCallback> = if args.json {
        Box::new(NoProgress)
    } else {
        Box::new(ConsoleProgress::new(ctx.quiet))
    };

    let result = match rollback_by_id(
        &project.root,
        &sync_id,
        &requester,
        &options,
        progress.as_mut(),
    )
    .await?
    {
        RollbackLookup::Completed(result) => result,
        RollbackLookup::NotFound { sync_id } => {
            bail!("Snapshot '{sync_id}' disappeared before the rollback started")
        }
    };

    if args.json {
        ui::print_json(&result)?;
    } else {
        render::display_result(&result, "Rollback");
    }

    if !result.success {
        bail!("{} failed", ui::count(result.summary.failed, "operation"));
    }
    Ok(())
}
