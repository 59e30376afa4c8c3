//! Terminal rendering of validation results, reconciliation reports, budget
//! changes, file listings and configuration.
//!
//! Everything renders to a `String` first so the layout can be tested; the
//! `print_*` wrappers write it to stdout.

use fiscalsheet_core::{AppConfig, CellValue};
use fiscalsheet_extract::Validation;
use fiscalsheet_reconcile::{
    BatchReport, BudgetReport, Conflict, DiffReport, FragmentStatus, MergeAction, MergeWarning,
};
use fiscalsheet_sync::DriveFile;
use serde::Serialize;

const MAX_CELL_CHARS: usize = 60;

// ── Public API ──

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_validations(results: &[(String, Validation)]) {
    print!("{}", render_validations(results));
}

pub fn print_batch(title: &str, report: &BatchReport) {
    print!("{}", render_batch(title, report));
}

pub fn print_budget(title: &str, report: &BudgetReport) {
    print!("{}", render_budget(title, report));
}

pub fn print_files(files: &[DriveFile]) {
    print!("{}", render_files(files));
}

pub fn print_config(config: &AppConfig) {
    print!("{}", render_config(config));
}

// ── Rendering ──

fn render_validations(results: &[(String, Validation)]) -> String {
    results
        .iter()
        .map(|(name, v)| {
            let mark = if v.valid { "ok" } else { "INVALID" };
            format!("  {:<26} {:<8} {}\n", name, mark, v.message)
        })
        .collect()
}

fn render_batch(title: &str, report: &BatchReport) -> String {
    let mut out = format!("=== {title} ===\n\nOrders\n");
    for outcome in &report.outcomes {
        out.push_str(&format!("  {:<26} {}\n", outcome.name, status_line(&outcome.status)));
        if let FragmentStatus::Merged { warnings, .. } = &outcome.status {
            for MergeWarning::PersonNotFound { role, name } in warnings {
                out.push_str(&format!("  {:<26}   ! {name} not found in sheet ({role})\n", ""));
            }
        }
    }
    out.push('\n');

    out.push_str(&render_diff(&report.diff));

    if !report.conflicts.is_empty() {
        out.push_str(&format!("Conflicting contracts: {}\n", report.conflicts.join(", ")));
    }
    out
}

fn status_line(status: &FragmentStatus) -> String {
    match status {
        FragmentStatus::Invalid { message } => format!("invalid: {message}"),
        FragmentStatus::ExtractFailed { error } => format!("not applied: {error}"),
        FragmentStatus::Merged {
            contract, action, ..
        } => match action {
            MergeAction::Updated { row } => format!("{contract} updated (row {})", sheet_row(*row)),
            MergeAction::Inserted { row } => format!("{contract} added (row {})", sheet_row(*row)),
            MergeAction::Conflict(Conflict::UnitMismatch {
                unit,
                existing_units,
                ..
            }) => format!(
                "{contract} CONFLICT: filed under {} not {unit}",
                existing_units.join(" / ")
            ),
            MergeAction::Conflict(Conflict::DuplicateRows { rows, .. }) => format!(
                "{contract} CONFLICT: duplicated in rows {}",
                rows.iter()
                    .map(|r| sheet_row(*r).to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        },
    }
}

fn render_diff(diff: &DiffReport) -> String {
    if diff.is_empty() {
        return "No changes.\n".to_string();
    }

    let mut out = String::new();
    if !diff.changed.is_empty() {
        out.push_str("Changed rows\n");
        for row in &diff.changed {
            out.push_str(&format!("  row {}\n", sheet_row(row.index)));
            for change in &row.changes {
                out.push_str(&format!(
                    "    {:<26} {} -> {}\n",
                    change.column,
                    cell(&change.old),
                    cell(&change.new)
                ));
            }
        }
        out.push('\n');
    }

    if !diff.added.is_empty() {
        out.push_str("Added rows\n");
        for row in &diff.added {
            out.push_str(&format!("  row {}\n", sheet_row(row.index)));
            for (column, value) in row.cells.iter().filter(|(_, v)| !v.is_blank()) {
                out.push_str(&format!("    {:<26} {}\n", column, cell(value)));
            }
        }
        out.push('\n');
    }
    out
}

fn render_budget(title: &str, report: &BudgetReport) -> String {
    let mut out = format!("=== {title} ===\n");
    if report.is_empty() {
        out.push_str("No changes.\n");
        return out;
    }
    for change in &report.changes {
        out.push_str(&format!(
            "  {:<10} {:<26} {} -> {}\n",
            change.note,
            change.field,
            cell(&change.old),
            cell(&change.new)
        ));
    }
    out
}

fn render_files(files: &[DriveFile]) -> String {
    if files.is_empty() {
        return "No files in folder.\n".to_string();
    }
    files
        .iter()
        .map(|f| format!("  {:<40} {}\n", f.name, f.id))
        .collect()
}

fn render_config(config: &AppConfig) -> String {
    let field = |key: &str, value: &str| format!("  {key:<26} {value}\n");
    let mut out = String::from("Credentials\n");
    out.push_str(&field("CLIENT_ID", &config.client_id));
    out.push_str(&field("CLIENT_SECRET", &config.client_secret));
    out.push_str(&field("REFRESH_TOKEN", &config.refresh_token));
    out.push_str("Folders\n");
    out.push_str(&field("PASTA_ID_FISCAIS", &config.assignments_folder));
    out.push_str(&field("PASTA_ID_ORCAMENTO", &config.budget_folder));
    out.push_str("Region spreadsheets\n");
    for (region, id) in &config.region_sheets {
        let id = if id.is_empty() { "(not set)" } else { id.as_str() };
        out.push_str(&field(region, id));
    }
    out
}

// ── Helpers ──

/// 1-based sheet row of a dataset row, counting the header.
fn sheet_row(index: usize) -> usize {
    index + 2
}

fn cell(value: &CellValue) -> String {
    let text = value.to_text();
    if text.is_empty() {
        return "(empty)".to_string();
    }
    if text.chars().count() > MAX_CELL_CHARS {
        let truncated: String = text.chars().take(MAX_CELL_CHARS).collect();
        return format!("{truncated}…");
    }
    text
}
