//! Diff, plan, result and snapshot display - sitesync-specific UI

use colored::{ColoredString, Colorize};
use reconcile::{
    DiffEntry, DiffKind, DiffResult, EntityType, PageField, PreSyncSnapshot, SyncPlan, SyncResult,
};

use crate::ui;

/// Display a diff grouped by entity type
pub fn display_diff(diff: &DiffResult) {
    if !diff.summary.has_differences {
        println!();
        println!("  {} Site matches the manifest", "✓".green());
        return;
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Site Diff".bold()
    );
    println!("│");

    for (title, entries) in [("Pages", &diff.pages), ("Plugins", &diff.plugins)] {
        let changes: Vec<&DiffEntry> = entries.iter().filter(|e| e.kind.is_change()).collect();
        if changes.is_empty() {
            continue;
        }

        println!("│ {}", title.bold());
        for entry in changes {
            println!(
                "│   {} {:<30} {}",
                symbol(entry.kind),
                entry.key,
                describe_entry(entry).dimmed()
            );
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Summary: {} to add, {} to change, {} to remove",
        diff.summary.additions.to_string().green(),
        diff.summary.modifications.to_string().yellow(),
        diff.summary.removals.to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// Display the operations a sync or rollback would run
pub fn display_plan(plan: &SyncPlan) {
    ui::section("Planned operations");
    if plan.is_empty() {
        ui::dim("Nothing to do");
        return;
    }

    for planned in &plan.operations {
        match &planned.skip_reason {
            None => println!("  {} {}", "•".cyan(), planned.operation),
            Some(reason) => println!(
                "  {} {} {}",
                "-".dimmed(),
                planned.operation.to_string().dimmed(),
                format!("({reason})").dimmed()
            ),
        }
    }
}

/// Print the summary of a finished run
pub fn display_result(result: &SyncResult, what: &str) {
    let summary = &result.summary;
    println!();
    if result.success {
        println!("  {} {} finished", "✓".green().bold(), what);
    } else {
        println!("  {} {} finished with errors", "⚠".yellow().bold(), what);
    }

    if summary.succeeded > 0 {
        println!("    • {} succeeded", ui::count(summary.succeeded, "operation"));
    }
    if summary.skipped > 0 {
        println!("    • {} skipped", ui::count(summary.skipped, "operation"));
    }
    if summary.failed > 0 {
        println!(
            "    • {} {}",
            ui::count(summary.failed, "operation"),
            "failed".red()
        );
        for outcome in result.failures() {
            println!(
                "      {} {}: {}",
                "✗".red(),
                outcome.operation,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }
}

/// One line per snapshot, newest first
pub fn display_snapshot_list(snapshots: &[PreSyncSnapshot]) {
    ui::header("Snapshots");
    if snapshots.is_empty() {
        ui::dim("No snapshots yet");
        return;
    }

    for snapshot in snapshots {
        println!(
            "  {}  {}  {}",
            snapshot.sync_id.bold(),
            snapshot
                .captured_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
                .dimmed(),
            snapshot_counts(snapshot)
        );
    }
}

/// Full detail of one snapshot
pub fn display_snapshot(snapshot: &PreSyncSnapshot) {
    ui::header(&format!("Snapshot {}", snapshot.sync_id));
    ui::kv(
        "Captured",
        &snapshot.captured_at.format("%Y-%m-%d %H:%M:%S%.6f UTC").to_string(),
    );
    ui::kv("Entries", &snapshot_counts(snapshot));

    if !snapshot.pages.is_empty() {
        ui::section("Pages");
        for page in &snapshot.pages {
            let prior = match &page.prior_state {
                Some(prior) => format!("was \"{}\" (id {})", prior.title, prior.id),
                None => "did not exist".to_string(),
            };
            println!(
                "  {:<10} {:<30} {}",
                page.planned_operation.to_string(),
                page.slug,
                prior.dimmed()
            );
        }
    }

    if !snapshot.plugins.is_empty() {
        ui::section("Plugins");
        for plugin in &snapshot.plugins {
            let state = if plugin.was_active { "active" } else { "inactive" };
            println!("  {:<41} {}", plugin.slug, format!("was {state}").dimmed());
        }
    }
}

fn symbol(kind: DiffKind) -> ColoredString {
    match kind {
        DiffKind::Addition => "+".green(),
        DiffKind::Removal => "-".red(),
        DiffKind::Modification => "~".yellow(),
        DiffKind::Match => "=".dimmed(),
    }
}

/// Short description of what changes for an entry
pub fn describe_entry(entry: &DiffEntry) -> String {
    match (entry.kind, entry.entity_type) {
        (DiffKind::Addition, EntityType::Page) => "(new page)".to_string(),
        (DiffKind::Addition, EntityType::Plugin) => "(not installed)".to_string(),
        (DiffKind::Removal, _) => "(not in manifest)".to_string(),
        (DiffKind::Match, _) => String::new(),
        (DiffKind::Modification, EntityType::Plugin) => match entry.desired_enabled() {
            Some(true) => "inactive → active".to_string(),
            _ => "active → inactive".to_string(),
        },
        (DiffKind::Modification, EntityType::Page) => {
            let (Some(live), Some(desired)) = (entry.live_page(), entry.desired_page()) else {
                return String::new();
            };
            entry
                .changed_fields
                .iter()
                .map(|field| {
                    let (from, to) = match field {
                        PageField::Title => (live.title.clone(), desired.title.clone()),
                        PageField::Template => (
                            live.template.clone().unwrap_or_default(),
                            desired.template.clone().unwrap_or_default(),
                        ),
                        PageField::Parent => (
                            live.parent.clone().unwrap_or_default(),
                            desired.parent.clone().unwrap_or_default(),
                        ),
                        PageField::MenuOrder => (
                            live.menu_order.to_string(),
                            desired.menu_order.unwrap_or_default().to_string(),
                        ),
                        PageField::Status => (
                            live.status.clone(),
                            desired.status.clone().unwrap_or_default(),
                        ),
                    };
                    format!("{field}: {} → {}", quoted(&from), quoted(&to))
                })
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}

fn quoted(value: &str) -> String {
    if value.is_empty() {
        "(none)".to_string()
    } else {
        format!("\"{value}\"")
    }
}

fn snapshot_counts(snapshot: &PreSyncSnapshot) -> String {
    let s = &snapshot.summary;
    format!(
        "{} created, {} updated, {} deleted, {}",
        s.creates,
        s.updates,
        s.deletes,
        ui::count(s.plugin_toggles, "plugin toggle")
    )
}
