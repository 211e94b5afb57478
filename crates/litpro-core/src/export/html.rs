//! Standalone HTML rendering of a document.

use crate::graph::{Cell, CellStatus, Document, ProseBlock};

/// Rendering options.
#[derive(Debug, Clone, Default)]
pub struct HtmlOptions {
    /// Page title; defaults to the document title
    pub title: Option<String>,
    /// Use the dark theme
    pub dark: bool,
}

/// Renders a document as a single self-contained HTML5 page.
///
/// Prose and cells appear in document order. Cells that carry results from a
/// run (status, output, error) show them under their source.
#[derive(Debug, Clone, Default)]
pub struct HtmlRenderer {
    options: HtmlOptions,
}

impl HtmlRenderer {
    pub fn new(options: HtmlOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, document: &Document) -> String {
        let title = self
            .options
            .title
            .as_deref()
            .or(document.title())
            .unwrap_or("Literate Document");

        let mut body = String::new();
        // The document's own `# ` heading already renders as part of the prose.
        if document.title().is_none() {
            body.push_str(&format!("<h1>{}</h1>\n", escape_html(title)));
        }

        let mut prose = document.prose().iter().peekable();
        for cell in document.iter() {
            while let Some(block) = prose.next_if(|b| b.before <= cell.position) {
                body.push_str(&render_prose(block));
            }
            body.push_str(&render_cell(cell));
        }
        for block in prose {
            body.push_str(&render_prose(block));
        }

        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
{css}
</style>
</head>
<body class="{theme}">
<main class="container">
{body}</main>
</body>
</html>
"#,
            title = escape_html(title),
            css = STYLE,
            theme = if self.options.dark { "dark" } else { "light" },
            body = body,
        )
    }
}

fn render_cell(cell: &Cell) -> String {
    let mut html = format!(
        "<section class=\"cell\" id=\"cell-{id}\">\n<div class=\"cell-header\">\n<span class=\"cell-id\">Cell: {id}</span>\n<span class=\"cell-lang\">{lang}</span>\n",
        id = escape_html(cell.id.as_str()),
        lang = escape_html(&cell.language),
    );

    if !cell.dependencies.is_empty() {
        let deps: Vec<&str> = cell.dependencies.iter().map(|d| d.as_str()).collect();
        html.push_str(&format!(
            "<span class=\"cell-meta\">depends: {}</span>\n",
            escape_html(&deps.join(", "))
        ));
    }
    if !cell.persist.is_empty() {
        html.push_str(&format!(
            "<span class=\"cell-meta\">persist: {}</span>\n",
            escape_html(&cell.persist.join(", "))
        ));
    }
    if cell.status != CellStatus::Pending {
        html.push_str(&format!(
            "<span class=\"status status-{status}\">{status}</span>\n",
            status = cell.status
        ));
    }
    html.push_str("</div>\n");

    html.push_str(&format!(
        "<pre><code class=\"language-{}\">{}</code></pre>\n",
        escape_html(&cell.language),
        escape_html(&cell.source)
    ));

    if let Some(output) = cell.output.as_deref().filter(|o| !o.is_empty()) {
        html.push_str(&format!(
            "<div class=\"cell-output\">\n<div class=\"output-header\">Output</div>\n<pre>{}</pre>\n</div>\n",
            escape_html(output.trim_end())
        ));
    }
    if let Some(ref error) = cell.error {
        html.push_str(&format!(
            "<div class=\"cell-error\">\n<pre>{}</pre>\n</div>\n",
            escape_html(&error.to_string())
        ));
    }

    html.push_str("</section>\n");
    html
}

/// Render narrative text: `#` headings, blank-line separated paragraphs and
/// unmarked code fences.
fn render_prose(block: &ProseBlock) -> String {
    let mut html = String::from("<div class=\"prose\">\n");
    let mut paragraph: Vec<&str> = Vec::new();
    let mut code: Option<Vec<&str>> = None;

    for line in block.text.lines() {
        let trimmed = line.trim();
        let is_fence = trimmed.starts_with("```") || trimmed.starts_with("~~~");
        if let Some(lines) = code.as_mut() {
            if is_fence {
                html.push_str(&format!("<pre><code>{}</code></pre>\n", escape_html(&lines.join("\n"))));
                code = None;
            } else {
                lines.push(line);
            }
        } else if is_fence {
            flush_paragraph(&mut paragraph, &mut html);
            code = Some(Vec::new());
        } else if trimmed.is_empty() {
            flush_paragraph(&mut paragraph, &mut html);
        } else if let Some((level, text)) = heading(trimmed) {
            flush_paragraph(&mut paragraph, &mut html);
            html.push_str(&format!("<h{level}>{}</h{level}>\n", escape_html(text)));
        } else {
            paragraph.push(trimmed);
        }
    }
    flush_paragraph(&mut paragraph, &mut html);
    if let Some(lines) = code {
        html.push_str(&format!("<pre><code>{}</code></pre>\n", escape_html(&lines.join("\n"))));
    }

    html.push_str("</div>\n");
    html
}

fn flush_paragraph(paragraph: &mut Vec<&str>, html: &mut String) {
    if !paragraph.is_empty() {
        html.push_str(&format!("<p>{}</p>\n", escape_html(&paragraph.join("\n"))));
        paragraph.clear();
    }
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|&c| c == '#').count();
    if !(1..=6).contains(&level) {
        return None;
    }
    line[level..]
        .strip_prefix(' ')
        .map(|text| (level, text.trim()))
}

/// Escape text for inclusion in HTML content or attribute values.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

const STYLE: &str = r#"body.light { --bg: #ffffff; --fg: #1f2328; --muted: #656d76; --panel: #f6f8fa; --border: #d0d7de; --ok: #1a7f37; --err: #cf222e; }
body.dark { --bg: #0d1117; --fg: #e6edf3; --muted: #8d96a0; --panel: #161b22; --border: #30363d; --ok: #3fb950; --err: #f85149; }
body { margin: 0; background: var(--bg); color: var(--fg); font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Helvetica, Arial, sans-serif; line-height: 1.5; }
.container { max-width: 900px; margin: 0 auto; padding: 2rem 1.5rem; }
.prose p { margin: 0.75rem 0; }
.cell { border: 1px solid var(--border); border-radius: 6px; margin: 1.25rem 0; overflow: hidden; }
.cell-header { display: flex; gap: 0.75rem; align-items: baseline; padding: 0.5rem 0.75rem; background: var(--panel); border-bottom: 1px solid var(--border); font-size: 0.85rem; }
.cell-id { font-weight: 600; }
.cell-lang, .cell-meta { color: var(--muted); }
.status { margin-left: auto; font-weight: 600; }
.status-succeeded { color: var(--ok); }
.status-failed { color: var(--err); }
.status-skipped { color: var(--muted); }
pre { margin: 0; padding: 0.75rem; overflow-x: auto; font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace; font-size: 0.85rem; }
.cell-output { border-top: 1px dashed var(--border); }
.output-header { padding: 0.25rem 0.75rem 0; color: var(--muted); font-size: 0.75rem; text-transform: uppercase; }
.cell-error { border-top: 1px solid var(--err); color: var(--err); }"#;
