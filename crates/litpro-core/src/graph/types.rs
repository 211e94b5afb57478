//! Types for the graph engine.

use std::borrow::Borrow;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::execute::EvaluationError;

/// Unique identifier for a cell within a document.
///
/// This is the id written after `cell:` in the marker, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellId(String);

impl CellId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CellId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CellId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CellId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CellId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Source span information for error reporting.
///
/// All lines are 1-based lines of the document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    /// Line holding the cell marker.
    pub marker_line: usize,
    /// Line holding the opening fence.
    pub fence_line: usize,
    /// Line holding the closing fence.
    pub end_line: usize,
}

impl SourceSpan {
    /// Document line of the given 1-based line inside the cell body.
    pub fn document_line(&self, cell_line: usize) -> usize {
        self.fence_line + cell_line
    }
}

/// How a cell marker was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerStyle {
    /// `<!-- cell:id ... -->`, invisible in a markdown preview.
    Comment,
    /// `--- cell:id ... ---`, the visible legacy form.
    Delimited,
}

/// Execution lifecycle of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CellStatus {
    #[default]
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped,
}

impl std::fmt::Display for CellStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            CellStatus::Pending => "pending",
            CellStatus::Running => "running",
            CellStatus::Succeeded => "succeeded",
            CellStatus::Failed => "failed",
            CellStatus::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// One executable cell extracted from a document.
#[derive(Debug, Clone)]
pub struct Cell {
    /// Unique identifier
    pub id: CellId,
    /// Code between the fences, verbatim
    pub source: String,
    /// Language tag of the fence, lowercased
    pub language: String,
    /// Cells that must run (and succeed) first, in declaration order
    pub dependencies: Vec<CellId>,
    /// Names the author declared as carried forward (advisory)
    pub persist: Vec<String>,
    /// Position in document order, starting at 0
    pub position: usize,
    /// Location in the document
    pub span: SourceSpan,
    /// Marker form the cell was declared with
    pub marker: MarkerStyle,
    /// Lifecycle state of the latest run
    pub status: CellStatus,
    /// Captured output of the latest run
    pub output: Option<String>,
    /// Failure of the latest run
    pub error: Option<EvaluationError>,
}

impl Cell {
    pub fn new(id: impl Into<CellId>, language: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            language: language.into(),
            dependencies: Vec::new(),
            persist: Vec::new(),
            position: 0,
            span: SourceSpan::default(),
            marker: MarkerStyle::Comment,
            status: CellStatus::Pending,
            output: None,
            error: None,
        }
    }

    /// Clear the results of a previous run.
    pub(crate) fn reset(&mut self) {
        self.status = CellStatus::Pending;
        self.output = None;
        self.error = None;
    }
}

/// Narrative text between cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProseBlock {
    /// Position of the cell this prose precedes (`cells.len()` for trailing prose)
    pub before: usize,
    /// The text, trimmed of surrounding blank lines
    pub text: String,
}

/// A parsed literate document: cells in document order plus an id index.
#[derive(Debug, Clone, Default)]
pub struct Document {
    title: Option<String>,
    cells: Vec<Cell>,
    index: FxHashMap<CellId, usize>,
    prose: Vec<ProseBlock>,
}

impl Document {
    /// Build a document from cells in document order.
    ///
    /// Positions are reassigned from the order of `cells`. The caller is
    /// responsible for id uniqueness; the parser checks it before calling.
    pub(crate) fn from_parts(
        title: Option<String>,
        mut cells: Vec<Cell>,
        prose: Vec<ProseBlock>,
    ) -> Self {
        let mut index = FxHashMap::default();
        for (position, cell) in cells.iter_mut().enumerate() {
            cell.position = position;
            index.insert(cell.id.clone(), position);
        }
        Self {
            title,
            cells,
            index,
            prose,
        }
    }

    /// Build a document from cells assembled programmatically.
    ///
    /// Fails with [`Error::DuplicateCellId`] if two cells share an id.
    pub fn from_cells(cells: Vec<Cell>) -> Result<Self> {
        let mut seen: FxHashMap<&str, usize> = FxHashMap::default();
        for cell in &cells {
            if let Some(first_line) = seen.insert(cell.id.as_str(), cell.span.marker_line) {
                return Err(Error::DuplicateCellId {
                    id: cell.id.to_string(),
                    first_line,
                    second_line: cell.span.marker_line,
                });
            }
        }
        Ok(Self::from_parts(None, cells, Vec::new()))
    }

    /// Document title (first `# ` heading in the narrative).
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Cells in document order.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Mutable access to all cells, for the orchestrator's status updates.
    pub(crate) fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    /// Narrative blocks in document order.
    pub fn prose(&self) -> &[ProseBlock] {
        &self.prose
    }

    /// Get a cell by id.
    pub fn get(&self, id: &str) -> Option<&Cell> {
        self.index.get(id).map(|&idx| &self.cells[idx])
    }

    /// Get a mutable reference to a cell by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Cell> {
        match self.index.get(id) {
            Some(&idx) => self.cells.get_mut(idx),
            None => None,
        }
    }

    /// Whether a cell with this id exists.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Get the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Check if the document has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Iterate over cells in document order.
    pub fn iter(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cell(id: &str) -> Cell {
        Cell::new(id, "calc", "x = 1")
    }

    #[test]
    fn test_positions_follow_document_order() {
        let doc = Document::from_parts(
            None,
            vec![make_cell("b"), make_cell("a"), make_cell("c")],
            Vec::new(),
        );
        assert_eq!(doc.get("b").unwrap().position, 0);
        assert_eq!(doc.get("a").unwrap().position, 1);
        assert_eq!(doc.get("c").unwrap().position, 2);
        let ids: Vec<_> = doc.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_lookup_by_str() {
        let mut doc = Document::from_parts(None, vec![make_cell("setup")], Vec::new());
        assert!(doc.contains("setup"));
        assert!(doc.get("missing").is_none());

        doc.get_mut("setup").unwrap().status = CellStatus::Succeeded;
        assert_eq!(doc.get("setup").unwrap().status, CellStatus::Succeeded);
    }

    #[test]
    fn test_from_cells_rejects_duplicates() {
        let result = Document::from_cells(vec![make_cell("a"), make_cell("a")]);
        assert!(matches!(result, Err(Error::DuplicateCellId { id, .. }) if id == "a"));
    }

    #[test]
    fn test_span_maps_cell_lines_to_document_lines() {
        let span = SourceSpan {
            marker_line: 4,
            fence_line: 5,
            end_line: 9,
        };
        assert_eq!(span.document_line(1), 6);
        assert_eq!(span.document_line(3), 8);
    }
}
