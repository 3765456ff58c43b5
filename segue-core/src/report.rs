// Report rendering for validation runs

use crate::run::RunReport;
use colored::Colorize;
use std::fs::File;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Render a run as terminal text: one block per error, then a summary line.
pub fn format_report(report: &RunReport) -> String {
    let mut out = String::new();

    for error in &report.errors {
        out.push_str(&format!("{} {}\n", "✗".red(), error.text.red().bold()));
        out.push_str(&format!("  -> on page {}\n", error.page));
        out.push_str(&format!("  {} {}\n", "expected:".green(), error.expected));
        out.push_str(&format!("  {} {}\n", "received:".red(), error.received));
        out.push('\n');
    }

    out.push_str(&summary_line(report));
    out.push('\n');
    out
}

fn summary_line(report: &RunReport) -> String {
    let total = report.pages.len();
    if report.passed() {
        return format!("{} All validations passed ({} pages)", "✓".green(), total)
            .green()
            .bold()
            .to_string();
    }

    let errors = report.errors.len();
    format!(
        "{} {} validation {} on {} of {} pages",
        "✗".red(),
        errors,
        if errors == 1 { "error" } else { "errors" },
        report.failed_pages(),
        total
    )
    .red()
    .bold()
    .to_string()
}

pub fn format_json_report(report: &RunReport) -> Result<String, serde_json::Error> {
    let duration_ms = (report.finished_at - report.started_at).num_milliseconds();

    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Segue",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "run": {
                "source": report.source,
                "started_at": report.started_at.to_rfc3339(),
                "finished_at": report.finished_at.to_rfc3339(),
                "duration_ms": duration_ms
            },
            "summary": {
                "passed": report.passed(),
                "total_pages": report.pages.len(),
                "failed_pages": report.failed_pages(),
                "total_errors": report.errors.len()
            },
            "pages": report.pages,
            "errors": report.errors
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn render(report: &RunReport, format: ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(format_report(report)),
        ReportFormat::Json => format_json_report(report),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
