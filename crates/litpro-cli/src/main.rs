//! litpro CLI - Run, export and render literate markdown documents.

mod colors;
mod document;
mod export;
mod html;
mod run;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use litpro_eval::{EvalConfig, PythonConfig};

#[derive(Parser)]
#[command(name = "litpro")]
#[command(about = "Execute literate markdown documents in dependency order")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every cell of a document in dependency order
    Run {
        /// Path to the document (.md file)
        document: PathBuf,

        /// Write the JSON run report to this path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the execution plan without running anything
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        eval: EvalArgs,
    },

    /// Export cell sources as one source file
    Export {
        /// Path to the document (.md file)
        document: PathBuf,

        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keep document order instead of execution order
        #[arg(long)]
        narrative: bool,
    },

    /// Render the document as standalone HTML
    Html {
        /// Path to the document (.md file)
        document: PathBuf,

        /// Output path for the HTML file (default: <document>.html)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Run the document first and include outputs
        #[arg(long)]
        run: bool,

        /// Use the dark theme
        #[arg(long)]
        dark: bool,

        #[command(flatten)]
        eval: EvalArgs,
    },
}

#[derive(Args)]
struct EvalArgs {
    /// Per-cell timeout for python cells, in seconds (0 disables it)
    #[arg(long, value_name = "SECS", default_value_t = 60)]
    timeout: u64,

    /// Python interpreter to use (default: $LITPRO_PYTHON, python3, python)
    #[arg(long, value_name = "PATH")]
    python: Option<PathBuf>,
}

impl EvalArgs {
    fn config(&self) -> EvalConfig {
        EvalConfig {
            python: PythonConfig {
                interpreter: self.python.clone(),
                timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Helper to format litpro-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(litpro_err) = err.downcast_ref::<litpro_core::Error>() {
            anyhow::anyhow!("{}", litpro_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            document,
            output,
            dry_run,
            eval,
        } => {
            run::execute(&document, output.as_deref(), dry_run, eval.config())
                .await
                .map_err(format_error)?;
        }

        Commands::Export {
            document,
            output,
            narrative,
        } => {
            export::execute(&document, output.as_deref(), narrative).map_err(format_error)?;
        }

        Commands::Html {
            document,
            output,
            run,
            dark,
            eval,
        } => {
            html::execute(&document, output.as_deref(), run, dark, eval.config())
                .await
                .map_err(format_error)?;
        }
    }

    Ok(())
}
