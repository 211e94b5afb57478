//! Cell parser extracting marked, fenced code cells from literate documents.
//!
//! A cell is a marker line followed by a fenced code block:
//!
//! ````text
//! <!-- cell:compute depends:setup persist:result -->
//! ```python
//! result = x + 2
//! ```
//! ````
//!
//! The visible legacy form `--- cell:compute depends:setup ---` is accepted too,
//! optionally followed by a closing `---` line after the fence. Both forms
//! produce the same [`Cell`].

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use rustc_hash::FxHashMap;

use super::types::{Cell, CellId, CellStatus, Document, MarkerStyle, ProseBlock, SourceSpan};
use crate::error::{Error, Result};

static COMMENT_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*<!--\s*(?i:cell)\s*:\s*(?P<body>.*?)\s*-->\s*$").expect("valid marker regex")
});

static DELIMITED_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*---\s*(?i:cell)\s*:\s*(?P<body>.*?)\s*---\s*$").expect("valid marker regex")
});

static LIST_COMMAS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*,\s*").expect("valid comma regex"));

/// Attributes carried by a marker line.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Marker {
    id: String,
    dependencies: Vec<String>,
    persist: Vec<String>,
    style: MarkerStyle,
}

/// An opening code fence.
#[derive(Debug, Clone, Copy)]
struct Fence<'a> {
    ch: char,
    len: usize,
    info: &'a str,
}

/// Parser for extracting cells from literate documents.
pub struct CellParser {
    // Reserved for future configuration
}

impl CellParser {
    /// Create a new parser.
    pub fn new() -> Self {
        Self {}
    }

    /// Parse a document file and extract all cells.
    pub fn parse_file(&self, path: &Path) -> Result<Document> {
        let source = std::fs::read_to_string(path)?;
        tracing::debug!("Parsing {}", path.display());
        self.parse_str(&source)
    }

    /// Parse document text and extract all cells.
    pub fn parse_str(&self, source: &str) -> Result<Document> {
        let lines: Vec<&str> = source.lines().collect();
        let mut cells: Vec<Cell> = Vec::new();
        let mut prose = Vec::new();
        let mut title = None;
        let mut seen: FxHashMap<String, usize> = FxHashMap::default();
        let mut pending_prose: Vec<&str> = Vec::new();

        let mut i = 0;
        while i < lines.len() {
            let line = lines[i];

            if let Some(marker) = Self::parse_marker(line, i + 1)? {
                Self::flush_prose(&mut pending_prose, cells.len(), &mut prose);

                let marker_line = i + 1;
                if let Some(&first_line) = seen.get(&marker.id) {
                    return Err(Error::DuplicateCellId {
                        id: marker.id,
                        first_line,
                        second_line: marker_line,
                    });
                }

                let (cell, next) = Self::parse_cell_body(&lines, i, marker)?;
                seen.insert(cell.id.to_string(), marker_line);
                cells.push(cell);
                i = next;
                continue;
            }

            // Unmarked fences belong to the narrative; markers inside them are text.
            if let Some(fence) = Self::opening_fence(line) {
                let close = Self::find_closing_fence(&lines, i + 1, fence).unwrap_or(lines.len() - 1);
                pending_prose.extend_from_slice(&lines[i..=close]);
                i = close + 1;
                continue;
            }

            if title.is_none()
                && let Some(heading) = line.trim().strip_prefix("# ")
            {
                let heading = heading.trim();
                if !heading.is_empty() {
                    title = Some(heading.to_string());
                }
            }

            pending_prose.push(line);
            i += 1;
        }
        Self::flush_prose(&mut pending_prose, cells.len(), &mut prose);

        tracing::debug!("Extracted {} cells", cells.len());
        Ok(Document::from_parts(title, cells, prose))
    }

    /// Parse the fenced block following the marker on line index `marker_idx`.
    ///
    /// Returns the cell and the index of the first line after it.
    fn parse_cell_body(lines: &[&str], marker_idx: usize, marker: Marker) -> Result<(Cell, usize)> {
        let marker_line = marker_idx + 1;

        let mut fence_idx = marker_idx + 1;
        while fence_idx < lines.len() && lines[fence_idx].trim().is_empty() {
            fence_idx += 1;
        }

        let fence = lines
            .get(fence_idx)
            .and_then(|line| Self::opening_fence(line))
            .ok_or_else(|| Error::MalformedCell {
                line: marker_line,
                message: format!(
                    "marker for cell '{}' is not followed by a fenced code block",
                    marker.id
                ),
            })?;

        let language = fence
            .info
            .split_whitespace()
            .next()
            .map(|tag| tag.trim_start_matches('{').trim_end_matches('}').to_lowercase())
            .filter(|tag| !tag.is_empty())
            .ok_or_else(|| Error::MalformedCell {
                line: fence_idx + 1,
                message: format!("code fence for cell '{}' has no language tag", marker.id),
            })?;

        let close_idx = Self::find_closing_fence(lines, fence_idx + 1, fence).ok_or_else(|| {
            Error::UnterminatedFence {
                id: marker.id.clone(),
                line: fence_idx + 1,
            }
        })?;

        let source = lines[fence_idx + 1..close_idx].join("\n");
        if source.trim().is_empty() {
            return Err(Error::MalformedCell {
                line: fence_idx + 1,
                message: format!("cell '{}' has an empty code block", marker.id),
            });
        }

        let mut next = close_idx + 1;
        if marker.style == MarkerStyle::Delimited {
            let mut probe = next;
            while probe < lines.len() && lines[probe].trim().is_empty() {
                probe += 1;
            }
            if lines.get(probe).is_some_and(|line| line.trim() == "---") {
                next = probe + 1;
            }
        }

        let cell = Cell {
            id: CellId::new(marker.id),
            source,
            language,
            dependencies: marker.dependencies.into_iter().map(CellId::new).collect(),
            persist: marker.persist,
            position: 0,
            span: SourceSpan {
                marker_line,
                fence_line: fence_idx + 1,
                end_line: close_idx + 1,
            },
            marker: marker.style,
            status: CellStatus::Pending,
            output: None,
            error: None,
        };

        Ok((cell, next))
    }

    /// Recognize a marker line. Returns `Ok(None)` for ordinary lines.
    fn parse_marker(line: &str, line_no: usize) -> Result<Option<Marker>> {
        let (caps, style) = if let Some(caps) = COMMENT_MARKER.captures(line) {
            (caps, MarkerStyle::Comment)
        } else if let Some(caps) = DELIMITED_MARKER.captures(line) {
            (caps, MarkerStyle::Delimited)
        } else {
            return Ok(None);
        };

        let body = LIST_COMMAS.replace_all(&caps["body"], ",");
        let mut tokens = body.split_whitespace();

        let malformed = |message: String| Error::MalformedCell {
            line: line_no,
            message,
        };

        let id = tokens
            .next()
            .ok_or_else(|| malformed("cell marker has no id".to_string()))?;
        if id.contains(',') || id.contains(':') {
            return Err(malformed(format!("invalid cell id '{}'", id)));
        }

        let mut marker = Marker {
            id: id.to_string(),
            dependencies: Vec::new(),
            persist: Vec::new(),
            style,
        };

        for token in tokens {
            let (key, value) = token
                .split_once(':')
                .ok_or_else(|| malformed(format!("unrecognized marker attribute '{}'", token)))?;
            let target = match key.to_ascii_lowercase().as_str() {
                "depends" => &mut marker.dependencies,
                "persist" => &mut marker.persist,
                _ => {
                    return Err(malformed(format!(
                        "unrecognized marker attribute '{}'",
                        key
                    )));
                }
            };
            for item in value.split(',') {
                if item.is_empty() {
                    return Err(malformed(format!(
                        "empty name in '{}' list of cell '{}'",
                        key, marker.id
                    )));
                }
                if !target.iter().any(|existing| existing == item) {
                    target.push(item.to_string());
                }
            }
        }

        Ok(Some(marker))
    }

    /// Recognize an opening fence (three or more backticks or tildes).
    fn opening_fence(line: &str) -> Option<Fence<'_>> {
        let trimmed = line.trim_start();
        let ch = trimmed.chars().next().filter(|&c| c == '`' || c == '~')?;
        let len = trimmed.chars().take_while(|&c| c == ch).count();
        if len < 3 {
            return None;
        }
        let info = trimmed[len..].trim();
        // Backtick fences may not carry backticks in the info string.
        if ch == '`' && info.contains('`') {
            return None;
        }
        Some(Fence { ch, len, info })
    }

    /// Find the index of the line closing `fence`, starting at `from`.
    fn find_closing_fence(lines: &[&str], from: usize, fence: Fence<'_>) -> Option<usize> {
        (from..lines.len()).find(|&idx| {
            let trimmed = lines[idx].trim();
            let run = trimmed.chars().take_while(|&c| c == fence.ch).count();
            run >= fence.len && run == trimmed.chars().count()
        })
    }

    fn flush_prose(pending: &mut Vec<&str>, before: usize, prose: &mut Vec<ProseBlock>) {
        let text = pending.join("\n");
        pending.clear();
        let text = text.trim_matches('\n').trim_end();
        if !text.trim().is_empty() {
            prose.push(ProseBlock {
                before,
                text: text.to_string(),
            });
        }
    }
}

impl Default for CellParser {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Document {
        CellParser::new().parse_str(source).unwrap()
    }

    #[test]
    fn test_comment_marker() {
        let doc = parse(
            "# Title\n\n<!-- cell:compute depends:setup persist:result -->\n```python\nresult = x + 2\n```\n",
        );
        assert_eq!(doc.len(), 1);
        let cell = doc.get("compute").unwrap();
        assert_eq!(cell.language, "python");
        assert_eq!(cell.source, "result = x + 2");
        assert_eq!(cell.dependencies, vec![CellId::new("setup")]);
        assert_eq!(cell.persist, vec!["result".to_string()]);
        assert_eq!(cell.marker, MarkerStyle::Comment);
        assert_eq!(cell.span.marker_line, 3);
        assert_eq!(cell.span.fence_line, 4);
        assert_eq!(cell.span.end_line, 6);
    }

    #[test]
    fn test_both_forms_parse_identically() {
        let invisible = parse("<!-- cell:a depends:b,c persist:x -->\n```calc\nx = 1\n```\n");
        let visible = parse("--- cell:a depends:b,c persist:x ---\n```calc\nx = 1\n```\n---\n");

        let a = invisible.get("a").unwrap();
        let b = visible.get("a").unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.source, b.source);
        assert_eq!(a.language, b.language);
        assert_eq!(a.dependencies, b.dependencies);
        assert_eq!(a.persist, b.persist);
        assert_eq!(a.span, b.span);
        assert_eq!(b.marker, MarkerStyle::Delimited);
        // The closing delimiter is not narrative.
        assert!(visible.prose().is_empty());
    }

    #[test]
    fn test_keywords_are_case_insensitive() {
        let doc = parse("<!-- CELL:b Depends:a PERSIST:y -->\n```Calc\ny = 2\n```\n");
        let cell = doc.get("b").unwrap();
        assert_eq!(cell.dependencies, vec![CellId::new("a")]);
        assert_eq!(cell.persist, vec!["y".to_string()]);
        assert_eq!(cell.language, "calc");
    }

    #[test]
    fn test_list_whitespace_and_duplicates() {
        let doc = parse("<!-- cell:d depends:a, b ,a -->\n```calc\nd = 1\n```\n");
        let deps: Vec<_> = doc
            .get("d")
            .unwrap()
            .dependencies
            .iter()
            .map(|d| d.as_str().to_string())
            .collect();
        assert_eq!(deps, vec!["a", "b"]);
    }

    #[test]
    fn test_source_is_verbatim() {
        let body = "def f(x):\n    return x * 2\n\n\nprint(f(21))  # trailing spaces  ";
        let doc = parse(&format!("<!-- cell:f -->\n```python\n{}\n```\n", body));
        assert_eq!(doc.get("f").unwrap().source, body);
    }

    #[test]
    fn test_blank_lines_between_marker_and_fence() {
        let doc = parse("<!-- cell:a -->\n\n\n~~~~calc\nx = 1\n~~~~\n");
        let cell = doc.get("a").unwrap();
        assert_eq!(cell.span.fence_line, 4);
        assert_eq!(cell.source, "x = 1");
    }

    #[test]
    fn test_longer_fence_contains_shorter() {
        let doc = parse("<!-- cell:a -->\n````calc\nx = 1\n```\ny = 2\n````\n");
        assert_eq!(doc.get("a").unwrap().source, "x = 1\n```\ny = 2");
    }

    #[test]
    fn test_duplicate_id_names_both_lines() {
        let err = CellParser::new()
            .parse_str("<!-- cell:a -->\n```calc\nx = 1\n```\n\n<!-- cell:a -->\n```calc\nx = 2\n```\n")
            .unwrap_err();
        match err {
            Error::DuplicateCellId {
                id,
                first_line,
                second_line,
            } => {
                assert_eq!(id, "a");
                assert_eq!(first_line, 1);
                assert_eq!(second_line, 6);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_marker_without_fence() {
        let err = CellParser::new()
            .parse_str("<!-- cell:a -->\nsome prose\n```calc\nx = 1\n```\n")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedCell { line: 1, .. }));
    }

    #[test]
    fn test_marker_at_end_of_document() {
        let err = CellParser::new().parse_str("text\n<!-- cell:a -->\n").unwrap_err();
        assert!(matches!(err, Error::MalformedCell { line: 2, .. }));
    }

    #[test]
    fn test_empty_fence() {
        let err = CellParser::new()
            .parse_str("<!-- cell:a -->\n```calc\n   \n```\n")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedCell { line: 2, .. }));
    }

    #[test]
    fn test_missing_language_tag() {
        let err = CellParser::new()
            .parse_str("<!-- cell:a -->\n```\nx = 1\n```\n")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedCell { .. }));
    }

    #[test]
    fn test_unterminated_fence() {
        let err = CellParser::new()
            .parse_str("<!-- cell:a -->\n```calc\nx = 1\n")
            .unwrap_err();
        assert!(matches!(err, Error::UnterminatedFence { ref id, line: 2 } if id == "a"));
    }

    #[test]
    fn test_unknown_attribute() {
        let err = CellParser::new()
            .parse_str("<!-- cell:a needs:b -->\n```calc\nx = 1\n```\n")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedCell { .. }));
    }

    #[test]
    fn test_empty_dependency_name() {
        let err = CellParser::new()
            .parse_str("<!-- cell:a depends:b, -->\n```calc\nx = 1\n```\n")
            .unwrap_err();
        assert!(matches!(err, Error::MalformedCell { .. }));
    }

    #[test]
    fn test_unknown_dependencies_are_not_validated() {
        let doc = parse("<!-- cell:a depends:ghost -->\n```calc\nx = 1\n```\n");
        assert_eq!(doc.get("a").unwrap().dependencies, vec![CellId::new("ghost")]);
    }

    #[test]
    fn test_markers_inside_unmarked_fences_are_prose() {
        let doc = parse(
            "Example syntax:\n\n```markdown\n<!-- cell:example -->\n```\n\n<!-- cell:real -->\n```calc\nx = 1\n```\n",
        );
        assert_eq!(doc.len(), 1);
        assert!(doc.get("example").is_none());
        assert!(doc.prose()[0].text.contains("cell:example"));
    }

    #[test]
    fn test_plain_comments_are_prose() {
        let doc = parse("<!-- just a note -->\n<!-- cell:a -->\n```calc\nx = 1\n```\n");
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.prose()[0].text, "<!-- just a note -->");
    }

    #[test]
    fn test_title_and_prose_positions() {
        let doc = parse(
            "# Sound Analysis\n\nIntro text.\n\n<!-- cell:a -->\n```calc\nx = 1\n```\n\nMiddle.\n\n<!-- cell:b -->\n```calc\ny = 2\n```\n\nOutro.\n",
        );
        assert_eq!(doc.title(), Some("Sound Analysis"));
        let prose: Vec<_> = doc.prose().iter().map(|p| (p.before, p.text.as_str())).collect();
        assert_eq!(
            prose,
            vec![
                (0, "# Sound Analysis\n\nIntro text."),
                (1, "Middle."),
                (2, "Outro."),
            ]
        );
    }

    #[test]
    fn test_document_order_positions() {
        let doc = parse(
            "<!-- cell:z -->\n```calc\nz = 1\n```\n<!-- cell:y -->\n```calc\ny = 1\n```\n<!-- cell:x -->\n```calc\nx = 1\n```\n",
        );
        let positions: Vec<_> = doc.iter().map(|c| (c.id.as_str(), c.position)).collect();
        assert_eq!(positions, vec![("z", 0), ("y", 1), ("x", 2)]);
    }

    #[test]
    fn test_parse_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("doc.md");
        std::fs::write(&path, "<!-- cell:a -->\n```calc\nx = 1\n```\n").unwrap();

        let doc = CellParser::new().parse_file(&path).unwrap();
        assert!(doc.contains("a"));

        let missing = CellParser::new().parse_file(&temp.path().join("nope.md"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
