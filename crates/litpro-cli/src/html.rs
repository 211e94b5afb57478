//! HTML command: render a document as a standalone page.
//!
//! With `--run` the document is executed first so outputs, errors and
//! statuses show up under each cell.

use std::path::{Path, PathBuf};
use std::time::Instant;

use litpro_core::export::write_output;
use litpro_core::{HtmlOptions, HtmlRenderer};
use litpro_eval::EvalConfig;

use crate::colors;
use crate::document::LoadedDocument;

pub async fn execute(
    document_path: &Path,
    output_path: Option<&Path>,
    run: bool,
    dark: bool,
    config: EvalConfig,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut loaded = LoadedDocument::load(document_path)?;

    let mut report = None;
    if run {
        loaded.print_header("Exporting");
        println!("\n{}Executing cells...{}", colors::BOLD, colors::RESET);
        let (ran, run_report) = loaded.run(config, false).await?;
        loaded = ran;
        report = Some(run_report);
    }

    let html = HtmlRenderer::new(HtmlOptions { title: None, dark }).render(&loaded.document);

    let output: PathBuf = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| document_path.with_extension("html"));
    write_output(Some(&output), &html)?;

    if run {
        println!();
        colors::rule();
    }
    println!(
        "{}Exported{} to {} in {:.2}s",
        colors::GREEN,
        colors::RESET,
        output.display(),
        start.elapsed().as_secs_f64()
    );

    // The page is written either way; a failed run still fails the command.
    if let Some(report) = report {
        report.into_result()?;
    }
    Ok(())
}
