//! Export command: flatten cell sources into one file.

use std::path::Path;

use litpro_core::export::write_output;
use litpro_core::{ExportOrder, SourceExporter};

use crate::document::LoadedDocument;

pub fn execute(document_path: &Path, output_path: Option<&Path>, narrative: bool) -> anyhow::Result<()> {
    let loaded = LoadedDocument::load(document_path)?;

    let order = if narrative {
        ExportOrder::Document
    } else {
        ExportOrder::Execution
    };
    let source = SourceExporter::new()
        .with_order(order)
        .export(&loaded.document, &loaded.order);

    write_output(output_path, &source)?;
    if let Some(path) = output_path {
        eprintln!("Exported {} cells to {}", loaded.document.len(), path.display());
    }
    Ok(())
}
