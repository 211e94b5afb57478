//! Export of documents to other formats.
//!
//! - [`SourceExporter`] concatenates cell sources into one runnable file.
//! - [`HtmlRenderer`] renders the whole document as a standalone page.

mod html;
mod source;

pub use html::{HtmlOptions, HtmlRenderer, escape_html};
pub use source::{ExportOrder, SourceExporter, comment_prefix};

use std::io::Write;
use std::path::Path;

use crate::error::{Error, Result};

/// Write rendered output to `path`, or to stdout when no path is given.
pub fn write_output(path: Option<&Path>, contents: &str) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, contents).map_err(|e| {
            Error::Serialization(format!("failed to write {}: {}", path.display(), e))
        }),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(contents.as_bytes())
                .and_then(|()| stdout.flush())
                .map_err(|e| Error::Serialization(format!("failed to write to stdout: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_output_to_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.py");
        write_output(Some(&path), "x = 1\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "x = 1\n");
    }

    #[test]
    fn test_write_output_failure_is_serialization_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing-dir").join("out.py");
        let err = write_output(Some(&path), "x").unwrap_err();
        assert!(matches!(err, Error::Serialization(ref msg) if msg.contains("out.py")));
    }
}
