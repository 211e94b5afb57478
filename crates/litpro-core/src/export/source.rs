//! Export cells as one plain source file.

use crate::graph::{Cell, Document, ExecutionOrder};

/// Which order cells are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportOrder {
    /// Dependency order, so the file can run top to bottom.
    #[default]
    Execution,
    /// The order cells appear in the document.
    Document,
}

/// Concatenates cell sources with identifying header comments.
#[derive(Debug, Clone, Default)]
pub struct SourceExporter {
    order: ExportOrder,
}

impl SourceExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_order(mut self, order: ExportOrder) -> Self {
        self.order = order;
        self
    }

    /// Render the export.
    ///
    /// `order` is used for [`ExportOrder::Execution`]; ids it names that are
    /// not in the document are ignored. The output is byte-for-byte
    /// deterministic for a given document and order.
    pub fn export(&self, document: &Document, order: &ExecutionOrder) -> String {
        let cells: Vec<&Cell> = match self.order {
            ExportOrder::Execution => order
                .iter()
                .filter_map(|id| document.get(id.as_str()))
                .collect(),
            ExportOrder::Document => document.iter().collect(),
        };

        let file_prefix = cells
            .first()
            .map(|cell| comment_prefix(&cell.language))
            .unwrap_or("//");
        let mut header = format!("{} Exported from litpro", file_prefix);
        if let Some(title) = document.title() {
            header.push_str(&format!(": {}", title));
        }

        let mut blocks = Vec::with_capacity(cells.len() + 1);
        blocks.push(header);
        blocks.extend(cells.into_iter().map(cell_block));

        let mut out = blocks.join("\n\n");
        out.push('\n');
        out
    }
}

fn cell_block(cell: &Cell) -> String {
    let prefix = comment_prefix(&cell.language);
    let mut block = format!("{} Cell: {}", prefix, cell.id);
    if !cell.dependencies.is_empty() {
        let deps: Vec<&str> = cell.dependencies.iter().map(|d| d.as_str()).collect();
        block.push_str(&format!(" (depends: {})", deps.join(", ")));
    }
    let source = cell.source.trim_end_matches(['\n', '\r']);
    if !source.is_empty() {
        block.push('\n');
        block.push_str(source);
    }
    block
}

/// Line comment prefix for a language tag.
pub fn comment_prefix(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "python" | "py" | "calc" | "sh" | "bash" | "zsh" | "fish" | "shell" | "ruby" | "rb"
        | "r" | "julia" | "jl" | "perl" | "pl" | "yaml" | "yml" | "toml" => "#",
        "sql" | "lua" | "haskell" | "hs" => "--",
        _ => "//",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{CellId, CellParser, DependencyGraph};

    fn parse(text: &str) -> (Document, ExecutionOrder) {
        let doc = CellParser::new().parse_str(text).unwrap();
        let order = DependencyGraph::build(&doc).unwrap().execution_order().unwrap();
        (doc, order)
    }

    const DOC: &str = "\
<!-- cell:report depends:data -->
```python
print(total)
```

<!-- cell:data -->
```python
total = 3
```
";

    #[test]
    fn test_execution_order_export() {
        let (doc, order) = parse(DOC);
        let out = SourceExporter::new().export(&doc, &order);
        assert_eq!(
            out,
            "# Exported from litpro\n\n# Cell: data\ntotal = 3\n\n# Cell: report (depends: data)\nprint(total)\n"
        );
    }

    #[test]
    fn test_document_order_export() {
        let (doc, order) = parse(DOC);
        let out = SourceExporter::new()
            .with_order(ExportOrder::Document)
            .export(&doc, &order);
        let report = out.find("Cell: report").unwrap();
        let data = out.find("Cell: data").unwrap();
        assert!(report < data);
    }

    #[test]
    fn test_export_is_deterministic() {
        let (doc, order) = parse(DOC);
        let exporter = SourceExporter::new();
        assert_eq!(exporter.export(&doc, &order), exporter.export(&doc, &order));
    }

    #[test]
    fn test_empty_document() {
        let doc = Document::default();
        let out = SourceExporter::new().export(&doc, &ExecutionOrder::new(Vec::new()));
        assert_eq!(out, "// Exported from litpro\n");
    }

    #[test]
    fn test_trailing_blank_lines_trimmed() {
        let cell = Cell::new("a", "sql", "select 1;\n\n");
        let doc = Document::from_cells(vec![cell]).unwrap();
        let order = ExecutionOrder::new(vec![CellId::new("a")]);
        let out = SourceExporter::new().export(&doc, &order);
        assert_eq!(out, "-- Exported from litpro\n\n-- Cell: a\nselect 1;\n");
    }

    #[test]
    fn test_title_in_header() {
        let (doc, order) = parse(&format!("# Audio Notes\n\n{}", DOC));
        let out = SourceExporter::new().export(&doc, &order);
        assert!(out.starts_with("# Exported from litpro: Audio Notes\n\n# Cell: data\n"));
    }

    #[test]
    fn test_comment_prefixes() {
        assert_eq!(comment_prefix("Python"), "#");
        assert_eq!(comment_prefix("calc"), "#");
        assert_eq!(comment_prefix("sql"), "--");
        assert_eq!(comment_prefix("rust"), "//");
        assert_eq!(comment_prefix("javascript"), "//");
    }
}
