//! Recovers tables from OCR text where the column structure survived only as
//! spacing, pipes or a repeating token count.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use super::registry::PatternRegistry;
use crate::chunk::Chunk;
use crate::entity::{Entity, EntityType, SourceSpan, TableKind};
use crate::error::Rejection;

static GAP: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t+| {2,}").expect("static regex"));

static NUMERIC_CELL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:0[xX][0-9A-Fa-f]+|[+-]?\d+(?:\.\d+)?[A-Za-zµμ%]*)$").expect("static regex")
});

static IDENTIFIER_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*[+#-]?$").expect("static regex"));

const MAX_WEAK_TOKENS: usize = 8;
const MAX_WEAK_CHARS: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Blank,
    Strong,
    Weak(usize),
    Prose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitMode {
    Pipe,
    Gap,
    Whitespace,
}

/// Result of scanning one chunk for tables.
#[derive(Debug, Clone, Default)]
pub struct TableScan {
    pub tables: Vec<Entity>,
    /// Byte ranges of accepted regions. No other rule may match inside them.
    pub consumed: Vec<(usize, usize)>,
    pub rejections: Vec<Rejection>,
}

impl TableScan {
    #[must_use]
    pub fn is_consumed(&self, start: usize, end: usize) -> bool {
        self.consumed.iter().any(|&(s, e)| s < end && start < e)
    }
}

struct Line<'a> {
    number: usize,
    offset: usize,
    text: &'a str,
    shape: Shape,
}

#[derive(Debug, Clone, Default)]
pub struct TableReconstructor {
    /// Short lines this registry recognizes are left to the extractor
    /// instead of being read as token-count rows.
    registry: Option<Arc<PatternRegistry>>,
}

impl TableReconstructor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_registry(mut self, registry: Arc<PatternRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    #[must_use]
    pub fn reconstruct(&self, chunk: &Chunk) -> TableScan {
        let lines: Vec<Line<'_>> = chunk
            .lines()
            .enumerate()
            .map(|(idx, (offset, text))| Line {
                number: idx + 1,
                offset,
                text,
                shape: self.classify(text),
            })
            .collect();

        let mut scan = TableScan::default();
        let mut run: Vec<&Line<'_>> = Vec::new();

        for (idx, line) in lines.iter().enumerate() {
            if is_candidate(&lines, idx) {
                run.push(line);
                continue;
            }
            if run.len() >= 2 {
                self.accept_region(chunk.id, &run, &mut scan);
            }
            run.clear();
        }
        if run.len() >= 2 {
            self.accept_region(chunk.id, &run, &mut scan);
        }

        scan
    }

    fn accept_region(&self, chunk_id: usize, region: &[&Line<'_>], scan: &mut TableScan) {
        let mode = split_mode(region);
        let split: Vec<(usize, Vec<String>)> = region
            .iter()
            .map(|line| (line.number, split_cells(line.text, mode)))
            .collect();

        let first_line = region[0].number;
        let code_like = split.iter().skip(1).flat_map(|(_, cells)| cells).any(|c| {
            NUMERIC_CELL.is_match(c) || (IDENTIFIER_CELL.is_match(c) && c.len() >= 2)
        });
        if !code_like {
            tracing::trace!(line = first_line, "region reads as prose, not a table");
            return;
        }

        let columns = modal_width(split.iter().map(|(_, cells)| cells.len()));
        let mut row_rejections = Vec::new();
        let mut rows = Vec::new();
        for (number, cells) in split {
            if cells.len() == columns {
                rows.push(cells);
            } else {
                row_rejections.push(Rejection::MalformedTableRow {
                    line: number,
                    found: cells.len(),
                    expected: columns,
                });
            }
        }

        if rows.len() < 2 || columns < 2 {
            tracing::trace!(line = first_line, rows = rows.len(), "discarding table region");
            scan.rejections.push(Rejection::MalformedTableRegion {
                line: first_line,
                rows: rows.len(),
            });
            return;
        }

        for rejection in &row_rejections {
            tracing::trace!(%rejection, "dropping table row");
        }
        scan.rejections.extend(row_rejections);

        let header_detected = rows[0].iter().all(|c| !NUMERIC_CELL.is_match(c))
            && rows[1..].iter().flatten().any(|c| NUMERIC_CELL.is_match(c));
        let (headers, data) = if header_detected {
            let mut rows = rows;
            let headers = rows.remove(0);
            (headers, rows)
        } else {
            let headers = (1..=columns).map(|n| format!("Column {n}")).collect();
            (headers, rows)
        };

        let kind = if header_detected {
            kind_from_headers(&headers)
        } else {
            kind_from_cells(&data)
        };

        let last = region[region.len() - 1];
        let start = region[0].offset;
        let end = last.offset + last.text.len();
        let name = format!("Table {}", scan.tables.len() + 1);

        let table = Entity::new(
            EntityType::Table,
            name,
            serde_json::Value::from(data.clone()).to_string(),
            SourceSpan::new(chunk_id, start, end),
        )
        .with_attribute("headers", serde_json::Value::from(headers).to_string())
        .with_attribute("kind", kind.as_str())
        .with_attribute("header_detected", header_detected.to_string())
        .with_attribute("row_count", data.len().to_string())
        .with_attribute("column_count", columns.to_string())
        .with_rule("table_reconstructor");

        scan.tables.push(table);
        scan.consumed.push((start, end));
    }

    fn classify(&self, line: &str) -> Shape {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Shape::Blank;
        }
        if trimmed.matches('|').count() >= 2 || gap_cells(trimmed).len() >= 3 {
            return Shape::Strong;
        }

        let tokens = trimmed.split_whitespace().count();
        let weak = (2..=MAX_WEAK_TOKENS).contains(&tokens)
            && !trimmed.contains(['=', ':'])
            && !trimmed.ends_with(['.', '!', '?', ',', ';'])
            && trimmed.chars().count() <= MAX_WEAK_CHARS
            && !self
                .registry
                .as_ref()
                .is_some_and(|registry| registry.recognizes(trimmed));
        if weak {
            Shape::Weak(tokens)
        } else {
            Shape::Prose
        }
    }
}

/// Strong lines always qualify. Weak lines need a neighbor that is strong or
/// has about the same token count, which keeps a row with one split or
/// merged token inside its region.
fn is_candidate(lines: &[Line<'_>], idx: usize) -> bool {
    match lines[idx].shape {
        Shape::Strong => true,
        Shape::Weak(tokens) => {
            let before = idx.checked_sub(1).and_then(|i| lines.get(i));
            let after = lines.get(idx + 1);
            before.into_iter().chain(after).any(|n| match n.shape {
                Shape::Strong => true,
                Shape::Weak(other) => other.abs_diff(tokens) <= 1,
                Shape::Blank | Shape::Prose => false,
            })
        }
        Shape::Blank | Shape::Prose => false,
    }
}

fn kind_from_headers(headers: &[String]) -> TableKind {
    let text = headers.join(" ").to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));
    if has(&["pin", "ball", "pad"]) {
        TableKind::Pin
    } else if has(&["bit", "field"]) {
        TableKind::BitField
    } else if has(&["reg", "addr", "offset"]) {
        TableKind::Register
    } else if has(&["error", "fault", "code"]) {
        TableKind::Error
    } else if has(&["min", "max", "typ", "unit", "param", "voltage", "current"]) {
        TableKind::Spec
    } else {
        TableKind::Generic
    }
}

fn kind_from_cells(rows: &[Vec<String>]) -> TableKind {
    let cells = || rows.iter().flatten().map(String::as_str);
    if cells().any(|c| c.starts_with("0x") || c.starts_with("0X")) {
        return TableKind::Register;
    }
    let first_is_number = rows
        .iter()
        .all(|r| r.first().is_some_and(|c| c.parse::<u32>().is_ok()));
    let second_is_signal = rows
        .iter()
        .all(|r| r.get(1).is_some_and(|c| IDENTIFIER_CELL.is_match(c)));
    if first_is_number && second_is_signal {
        return TableKind::Pin;
    }
    let has_unit = cells().any(|c| {
        NUMERIC_CELL.is_match(c)
            && ["V", "A", "s", "Hz"]
                .iter()
                .any(|unit| c.ends_with(unit))
    });
    if has_unit {
        TableKind::Spec
    } else {
        TableKind::Generic
    }
}

fn split_mode(region: &[&Line<'_>]) -> SplitMode {
    if region.iter().any(|l| l.text.contains('|')) {
        SplitMode::Pipe
    } else if region.iter().all(|l| gap_cells(l.text.trim()).len() >= 2) {
        SplitMode::Gap
    } else {
        SplitMode::Whitespace
    }
}

fn gap_cells(text: &str) -> Vec<&str> {
    GAP.split(text)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

fn split_cells(line: &str, mode: SplitMode) -> Vec<String> {
    let trimmed = line.trim();
    match mode {
        SplitMode::Pipe => {
            let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
            let inner = inner.strip_suffix('|').unwrap_or(inner);
            inner.split('|').map(|c| c.trim().to_string()).collect()
        }
        SplitMode::Gap => gap_cells(trimmed).into_iter().map(String::from).collect(),
        SplitMode::Whitespace => trimmed.split_whitespace().map(String::from).collect(),
    }
}

/// Most frequent width; ties go to the width seen first.
fn modal_width(widths: impl Iterator<Item = usize>) -> usize {
    let mut counts: Vec<(usize, usize)> = Vec::new();
    for width in widths {
        match counts.iter_mut().find(|(w, _)| *w == width) {
            Some((_, n)) => *n += 1,
            None => counts.push((width, 1)),
        }
    }
    let mut best = (0, 0);
    for (width, n) in counts {
        if n > best.1 {
            best = (width, n);
        }
    }
    best.0
}
