//! ANSI styling for litpro's terminal output.
//!
//! `run` and `html --run` print a per-cell progress line (cyan "Running",
//! green check, red cross, dim "Skipped"), a bold document header over a
//! rule, and a colored summary. Errors and interrupts go to stderr in red
//! and yellow.

use std::io::{self, Write};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
/// Table headings, timings and skipped cells.
pub const DIM: &str = "\x1b[2m";
/// Completed cells and successful summaries.
pub const GREEN: &str = "\x1b[32m";
/// Interrupts and aborted runs.
pub const YELLOW: &str = "\x1b[33m";
/// Cell ids and document names.
pub const CYAN: &str = "\x1b[36m";
/// Failed cells.
pub const RED: &str = "\x1b[31m";

const RULE_WIDTH: usize = 50;

/// Print the rule under a header or section title.
pub fn rule() {
    println!("{}", "─".repeat(RULE_WIDTH));
}

/// Flush stdout so a "Running <cell>..." line shows before the cell finishes.
#[inline]
pub fn flush_stdout() {
    io::stdout().flush().ok();
}
