//! Operator-facing output for run summaries and validation reports.
//!
//! Human-readable text goes to stdout; JSON reports are written to a file.

use std::path::Path;

use anyhow::{Context, Result};
use eventclean_core::{RunSummary, ValidationReport, pipeline::TableCounts};
use serde::Serialize;

/// Renders one table's audit counts.
pub fn format_counts(name: &str, counts: &TableCounts) -> String {
    let mut lines = vec![format!(
        "{name}: {} loaded, {} flagged, {} accepted as-is, {} repaired, {} rejected",
        counts.loaded, counts.flagged, counts.accepted_as_is, counts.repaired, counts.rejected
    )];
    for (reason, count) in &counts.rejections {
        lines.push(format!("  rejected {reason}: {count}"));
    }
    for (field, count) in &counts.repairs_by_field {
        lines.push(format!("  repaired {field}: {count}"));
    }
    lines.join("\n")
}

/// Renders a run summary.
pub fn format_summary(summary: &RunSummary) -> String {
    let mut out = format!(
        "Run reached {} on {} in {} ms\n",
        summary.stage,
        summary.backend,
        (summary.finished_at - summary.started_at).num_milliseconds()
    );
    out.push_str(&format_counts("users", &summary.users));
    out.push('\n');
    out.push_str(&format_counts("event_performance", &summary.events));
    out.push('\n');
    if let Some(path) = &summary.backup_path {
        out.push_str(&format!("Backup: {}\n", path.display()));
    }
    out
}

/// Renders the parts of a validation report an operator acts on.
pub fn format_report(report: &ValidationReport) -> String {
    let mut out = format!(
        "Validity window: {} to {}\n",
        report.window.founding_date, report.window.cutoff_date
    );

    for table in [&report.users, &report.events] {
        out.push_str(&format!("{} ({} rows)\n", table.table, table.row_count));
        for column in table.completeness.columns.iter().filter(|c| c.null_count > 0) {
            out.push_str(&format!("  nulls in {}: {}\n", column.column, column.null_count));
        }
        if table.uniqueness.duplicate_row_count > 0 {
            out.push_str(&format!(
                "  duplicate rows on ({}): {}\n",
                table.uniqueness.key_columns.join(", "),
                table.uniqueness.duplicate_row_count
            ));
        }
        for anomaly in &table.lengths.anomalies {
            out.push_str(&format!(
                "  line {}: userid length {} '{}'\n",
                anomaly.source_line, anomaly.length, anomaly.visible_value
            ));
        }
        for failure in &table.consistency.failures {
            out.push_str(&format!(
                "  line {}: {} '{}' {}\n",
                failure.source_line, failure.column, failure.value, failure.message
            ));
        }
    }

    let dates = &report.profile.event_dates;
    if !dates.before_window.is_empty() || !dates.after_window.is_empty() {
        out.push_str(&format!(
            "event dates: {} before founding, {} after cutoff\n",
            dates.before_window.len(),
            dates.after_window.len()
        ));
    }
    let references = &report.profile.references;
    if references.orphan_event_rows > 0 {
        out.push_str(&format!(
            "events referencing unknown users: {} rows, {} ids\n",
            references.orphan_event_rows, references.orphan_user_ids
        ));
    }
    if !report.has_findings() {
        out.push_str("No findings\n");
    }
    out
}

pub fn print_summary(summary: &RunSummary) {
    print!("{}", format_summary(summary));
}

pub fn print_report(report: &ValidationReport) {
    print!("{}", format_report(report));
}

/// Writes a value as pretty JSON.
pub async fn write_json_report<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    tracing::info!("Report written to {}", path.display());
    Ok(())
}
