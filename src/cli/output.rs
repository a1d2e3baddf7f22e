use colored::*;
use serde::Serialize;

use crate::apps::{AppRecord, RemovalPlan, UninstallReport};
use crate::cleaner::{CleanOutcome, SystemPhase};
use crate::common::format::{self, format_path, format_size, format_size_colored};
use crate::optimizer::{MaintenanceReport, StepStatus};
use crate::scanner::catalog::ReclaimPathCatalog;
use crate::scanner::ScanResult;

/// Print any report as pretty JSON
pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing results: {}", e),
    }
}

/// Print scan results in human-readable format
pub fn print_scan_result(result: &ScanResult, catalog: &ReclaimPathCatalog) {
    println!();
    println!("{}  Mole Scan Results", "🧹");
    println!("{}", "─".repeat(60).dimmed());
    println!(
        "  Scanned in {}  •  {} entries",
        format::format_duration(result.duration_secs).cyan(),
        result.entries_visited.to_string().dimmed()
    );
    println!("{}", "─".repeat(60).dimmed());
    println!();

    for path in catalog.iter() {
        let present = path.path.exists();
        println!(
            "    {} {:<45} {}",
            if present { "📁" } else { "  " },
            format::progress_label(&path.path),
            format!("[{}]", path.tier).dimmed(),
        );
    }
    println!();

    println!("{}", "─".repeat(60).dimmed());
    if result.total_bytes == 0 {
        println!("  {} Your Mac is already clean!", "✨");
    } else {
        println!(
            "  {} Total reclaimable: {}",
            "💾",
            format_size_colored(result.total_bytes)
        );
        println!("  {} Run {} to clean", "💡", "mole clean".cyan());
    }
    println!();
}

/// Print a minimal scan summary
pub fn print_scan_quiet(result: &ScanResult) {
    println!("{}  {}", format_size(result.total_bytes), result.entries_visited);
}

/// Print the result of a clean
pub fn print_clean_outcome(outcome: &CleanOutcome) {
    println!();
    println!(
        "  {} {} — {} items, {}",
        "✓".green(),
        "Cleaned".bold(),
        outcome.user_items_removed.to_string().cyan(),
        format_size_colored(outcome.freed_bytes()),
    );

    if outcome.user_items_failed > 0 {
        println!(
            "  {} {} items could not be removed",
            "⚠".yellow(),
            outcome.user_items_failed
        );
    }

    match &outcome.system {
        SystemPhase::NotNeeded => {}
        SystemPhase::Cleaned => {
            println!(
                "  {} System caches and logs cleared ({})",
                "✓".green(),
                format_size(outcome.system_bytes_freed)
            );
        }
        SystemPhase::NeedsAuthorization => {
            println!(
                "  {} System caches need an administrator password. Run {} first.",
                "🔒",
                "mole auth login".cyan()
            );
        }
        SystemPhase::CredentialRejected => {
            println!(
                "  {} Cached password was rejected and has been forgotten. Run {} again.",
                "🔒",
                "mole auth login".cyan()
            );
        }
        SystemPhase::Failed(message) => {
            println!("  {} System cleanup failed: {}", "✗".red(), message.dimmed());
        }
    }
    println!();
}

pub fn print_clean_quiet(outcome: &CleanOutcome) {
    let system = match outcome.system {
        SystemPhase::NotNeeded => "none",
        SystemPhase::Cleaned => "cleaned",
        SystemPhase::NeedsAuthorization | SystemPhase::CredentialRejected => "auth",
        SystemPhase::Failed(_) => "failed",
    };
    println!("{}  {}  {}", format_size(outcome.freed_bytes()), outcome.user_items_removed, system);
}

/// Print list of installed applications
pub fn print_app_list(apps: &[AppRecord]) {
    println!();
    println!("  {} Installed Applications ({})", "📱", apps.len());
    println!("{}", "─".repeat(60).dimmed());
    println!();

    if apps.is_empty() {
        println!("  No applications found.");
        return;
    }

    println!("  {:<40} {:>12}", "Name".dimmed(), "Size".dimmed());
    println!("  {}", "─".repeat(58).dimmed());

    for app in apps {
        let size = if app.size.is_empty() { "-" } else { app.size.as_str() };
        println!("  {:<40} {:>12}", format::truncate(&app.name, 40), size);
    }
    println!();
}

/// Print app detail view with its removal plan
pub fn print_app_info(app: &AppRecord, plan: &RemovalPlan) {
    println!();
    println!("  {} {}", "📱", app.name.bold());
    println!("{}", "─".repeat(50).dimmed());

    println!("  Path:       {}", format_path(&app.path));
    if let Some(ref bid) = plan.bundle_id {
        println!("  Bundle ID:  {}", bid);
    }
    if let Some(ref icon) = app.icon {
        println!("  Icon:       {}", format_path(icon).dimmed());
    }
    if !app.size.is_empty() {
        println!("  App size:   {}", app.size);
    }

    print_residuals(plan);

    println!();
    println!("  {} Total: {}", "💾", format_size_colored(plan.total_bytes()));
    println!();
}

fn print_residuals(plan: &RemovalPlan) {
    let residuals: Vec<_> = plan.targets.iter().filter(|t| t.kind.is_some()).collect();
    if residuals.is_empty() {
        return;
    }
    let bytes: u64 = residuals.iter().map(|t| t.size_bytes).sum();
    println!();
    println!(
        "  {} Leftover files ({}, {}):",
        "📁",
        residuals.len(),
        format_size(bytes)
    );
    for target in residuals {
        if let Some(kind) = target.kind {
            println!(
                "    {} {} ({})",
                format!("[{}]", kind).dimmed(),
                format_path(&target.path),
                format_size(target.size_bytes),
            );
        }
    }
}

/// Print what an uninstall would move to the Trash
pub fn print_removal_plan(plan: &RemovalPlan) {
    println!();
    println!(
        "  {} {} '{}' — {} items, {}",
        "ℹ️",
        "Dry run".bold(),
        plan.app_name,
        plan.targets.len(),
        format_size_colored(plan.total_bytes()),
    );
    for target in &plan.targets {
        println!("    {} {}", "→".dimmed(), format_path(&target.path).dimmed());
    }
    println!();
}

/// Print uninstall report
pub fn print_uninstall_report(report: &UninstallReport) {
    println!();
    let (icon, label) = if report.bundle_removed {
        ("✓".green(), "Uninstalled".bold())
    } else {
        ("✗".red(), "Failed to remove".bold())
    };

    println!(
        "  {} {} '{}' — {} items moved to Trash, {}",
        icon,
        label,
        report.app_name,
        report.trashed.len(),
        format_size_colored(report.bytes_freed),
    );

    for path in &report.trashed {
        println!("    {} {}", "🗑".dimmed(), format_path(path).dimmed());
    }

    if !report.errors.is_empty() {
        println!();
        for err in &report.errors {
            println!("    {} {}", "⚠".yellow(), err.dimmed());
        }
    }
    println!();
}

/// Print the outcome of each maintenance step
pub fn print_maintenance_report(report: &MaintenanceReport) {
    println!();
    println!("  {} Maintenance", "🔧");
    println!("{}", "─".repeat(50).dimmed());

    for step in &report.steps {
        match &step.status {
            StepStatus::Done => println!("  {} {}", "✓".green(), step.label),
            StepStatus::Failed(e) => {
                println!("  {} {} {}", "✗".red(), step.label, e.trim().dimmed())
            }
            StepStatus::Cancelled => {
                println!("  {} {} {}", "–".yellow(), step.label, "(cancelled)".dimmed())
            }
            StepStatus::AwaitingAuthorization => {
                println!("  {} {} {}", "🔒", step.label, "(needs password)".dimmed())
            }
        }
    }

    if report.paused {
        println!();
        println!(
            "  {} Run {} and then {} again to finish.",
            "💡",
            "mole auth login".cyan(),
            "mole optimize".cyan()
        );
    }
    println!();
}
