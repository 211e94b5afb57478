//! Run command implementation for litpro CLI.
//!
//! Executes a document headlessly, every cell in dependency order.

use std::path::Path;
use std::time::Instant;

use litpro_core::export::write_output;
use litpro_core::{RunOutcome, RunReport};
use litpro_eval::EvalConfig;

use crate::colors;
use crate::document::{LoadedDocument, print_outputs};

/// Execute a document.
pub async fn execute(
    document_path: &Path,
    report_path: Option<&Path>,
    dry_run: bool,
    config: EvalConfig,
) -> anyhow::Result<()> {
    let start = Instant::now();

    let loaded = LoadedDocument::load(document_path)?;
    loaded.print_header(if dry_run { "Planning" } else { "Running" });

    // Handle empty documents
    if loaded.document.is_empty() {
        println!(
            "\n{}No cells found in document.{}",
            colors::YELLOW,
            colors::RESET
        );
        println!("Cells are fenced code blocks preceded by <!-- cell:<id> -->");
        return Ok(());
    }

    if dry_run {
        loaded.print_plan();
        return Ok(());
    }

    println!("{}Execution order:{} {}\n", colors::BOLD, colors::RESET, loaded.order);
    let (_, report) = loaded.run(config, true).await?;

    print_outputs(&report.results);

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        write_output(Some(path), &json)?;
        tracing::info!("Wrote run report to {}", path.display());
    }

    print_summary(&report, start);
    report.into_result()?;
    Ok(())
}

fn print_summary(report: &RunReport, start: Instant) {
    let total_time = start.elapsed();
    println!();
    colors::rule();
    match &report.outcome {
        RunOutcome::Succeeded => println!(
            "{}Completed{} {} cells in {:.2}s (execution: {:.2}s)",
            colors::GREEN,
            colors::RESET,
            report.succeeded_count(),
            total_time.as_secs_f64(),
            report.elapsed.as_secs_f64()
        ),
        RunOutcome::Failed { cell, .. } => println!(
            "{}Failed{} at {}: {} of {} cells succeeded",
            colors::RED,
            colors::RESET,
            cell,
            report.succeeded_count(),
            report.results.len()
        ),
        RunOutcome::Aborted { next } => println!(
            "{}Aborted{} before {}: {} of {} cells succeeded",
            colors::YELLOW,
            colors::RESET,
            next,
            report.succeeded_count(),
            report.results.len()
        ),
    }
}
