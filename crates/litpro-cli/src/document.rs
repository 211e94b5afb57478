//! Loading documents and running them for the CLI commands.

use std::path::{Path, PathBuf};
use std::time::Duration;

use litpro_core::execute::{AbortHandle, CellResult, EvaluationError, ExecutionCallback};
use litpro_core::graph::{CellId, CellParser, DependencyGraph, Document, ExecutionOrder};
use litpro_core::{Orchestrator, RunReport};
use litpro_eval::{EvalConfig, default_registry};

use crate::colors;

/// A parsed document with its resolved execution order.
pub struct LoadedDocument {
    pub path: PathBuf,
    pub document: Document,
    pub order: ExecutionOrder,
}

impl LoadedDocument {
    /// Parse the document and resolve its execution order.
    ///
    /// Extraction and graph errors surface here, before anything runs.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let document = CellParser::new().parse_file(path)?;
        let order = DependencyGraph::build(&document)?.execution_order()?;
        tracing::info!("Loaded {} cells from {}", document.len(), path.display());

        Ok(Self {
            path: path.to_path_buf(),
            document,
            order,
        })
    }

    /// Display name: the document title, else the file stem.
    pub fn name(&self) -> String {
        match self.document.title() {
            Some(title) => title.to_string(),
            None => self
                .path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".to_string()),
        }
    }

    pub fn print_header(&self, action: &str) {
        println!(
            "\n{}litpro{} - {} {}{}{}",
            colors::BOLD,
            colors::RESET,
            action,
            colors::CYAN,
            self.name(),
            colors::RESET
        );
        colors::rule();
    }

    /// Print the execution plan as a table.
    pub fn print_plan(&self) {
        println!("{}Execution order:{} {}", colors::BOLD, colors::RESET, self.order);
        println!(
            "{}  {:>3}  {:<20} {:<10} {:<10} {}{}",
            colors::DIM,
            "#",
            "cell",
            "language",
            "status",
            "depends",
            colors::RESET
        );
        for (idx, id) in self.order.iter().enumerate() {
            let Some(cell) = self.document.get(id.as_str()) else {
                continue;
            };
            let deps: Vec<&str> = cell.dependencies.iter().map(CellId::as_str).collect();
            println!(
                "  {:>3}  {:<20} {:<10} {:<10} {}",
                idx + 1,
                cell.id.as_str(),
                cell.language,
                cell.status.to_string(),
                if deps.is_empty() { "-".to_string() } else { deps.join(", ") }
            );
        }
    }

    /// Run every cell on a blocking thread; Ctrl-C stops the run between cells.
    pub async fn run(self, config: EvalConfig, progress: bool) -> anyhow::Result<(Self, RunReport)> {
        let abort = AbortHandle::new();
        let signal_abort = abort.clone();
        let signal = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!(
                    "\n{}Interrupted{} - stopping after the current cell",
                    colors::YELLOW,
                    colors::RESET
                );
                signal_abort.abort();
            }
        });

        let task = tokio::task::spawn_blocking(move || -> litpro_core::Result<(Self, RunReport)> {
            let mut loaded = self;
            let registry = default_registry(&config);
            let mut orchestrator = Orchestrator::new(&registry);
            if progress {
                orchestrator.set_callback(ProgressCallback);
            }
            orchestrator.set_abort_handle(abort);
            let report = orchestrator.run(&mut loaded.document, &loaded.order)?;
            Ok((loaded, report))
        });

        let result = task.await;
        signal.abort();
        Ok(result??)
    }
}

/// Progress callback that prints to the terminal.
pub struct ProgressCallback;

impl ExecutionCallback for ProgressCallback {
    fn on_cell_started(&self, cell_id: &CellId, language: &str) {
        print!(
            "{}  ▶ Running{} {}{}{} {}({}){}... ",
            colors::CYAN,
            colors::RESET,
            colors::BOLD,
            cell_id,
            colors::RESET,
            colors::DIM,
            language,
            colors::RESET
        );
        colors::flush_stdout();
    }

    fn on_cell_completed(&self, _cell_id: &CellId, elapsed: Duration) {
        println!(
            "{}✓{} {}{:.2}s{}",
            colors::GREEN,
            colors::RESET,
            colors::DIM,
            elapsed.as_secs_f64(),
            colors::RESET
        );
    }

    fn on_cell_error(&self, _cell_id: &CellId, error: &EvaluationError) {
        println!("{}✗{}", colors::RED, colors::RESET);
        eprintln!("{}    Error:{} {}", colors::RED, colors::RESET, error);
    }

    fn on_cell_skipped(&self, cell_id: &CellId) {
        println!("{}  - Skipped {}{}", colors::DIM, cell_id, colors::RESET);
    }
}

/// Print captured outputs of the cells that produced any.
pub fn print_outputs(results: &[CellResult]) {
    let with_output: Vec<&CellResult> = results
        .iter()
        .filter(|r| r.output.as_deref().is_some_and(|o| !o.is_empty()))
        .collect();
    if with_output.is_empty() {
        return;
    }

    println!("\n{}Outputs:{}", colors::BOLD, colors::RESET);
    colors::rule();
    for result in with_output {
        println!("{}{}{}", colors::CYAN, result.id, colors::RESET);
        if let Some(output) = result.output.as_deref() {
            for line in output.trim_end().lines() {
                println!("  {}", line);
            }
        }
    }
}
