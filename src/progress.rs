//! Per-operation progress output for sync and rollback runs

use colored::Colorize;
use reconcile::{OperationOutcome, OperationStatus, ProgressCallback, SyncOperation};

/// Prints one line per operation as it completes
pub struct ConsoleProgress {
    quiet: bool,
    total: usize,
    current: usize,
}

impl ConsoleProgress {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            total: 0,
            current: 0,
        }
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_operation_start(&mut self, index: usize, total: usize, _operation: &SyncOperation) {
        self.current = index + 1;
        self.total = total;
    }

    fn on_operation_complete(&mut self, outcome: &OperationOutcome) {
        if self.quiet && outcome.status != OperationStatus::Failed {
            return;
        }

        let counter = format!("[{}/{}]", self.current, self.total).dimmed();
        let line = match outcome.status {
            OperationStatus::Succeeded => format!("{} {}", "✓".green(), outcome.operation),
            OperationStatus::Failed => format!(
                "{} {}: {}",
                "✗".red(),
                outcome.operation,
                outcome.error.as_deref().unwrap_or("failed").red()
            ),
            OperationStatus::Skipped => format!(
                "{} {} {}",
                "-".dimmed(),
                outcome.operation,
                format!("({})", outcome.reason.as_deref().unwrap_or("skipped")).dimmed()
            ),
        };
        println!("  {counter} {line}");
    }
}
