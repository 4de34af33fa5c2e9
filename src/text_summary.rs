//! Text summary builder for CLI output.
//!
//! Turns a rendered view into human-readable lines for text mode.

use crate::presenter::{
    CitationCard, CitationsView, DisclosureView, ResultView, TableView, ViewBody,
    NO_DETAIL_PLACEHOLDER,
};

/// Pre-formatted lines for text output.
pub struct TextSummary {
    pub lines: Vec<String>,
}

/// Build text lines for a view. `disclosure_open` expands the raw evidence section.
pub fn build_text_summary(view: &ResultView, disclosure_open: bool) -> TextSummary {
    let mut lines = Vec::new();
    lines.push(format!("Route: {}", view.route_label));

    if let Some(summary) = view.summary.as_deref() {
        lines.push(String::new());
        lines.push("Executive Summary".to_string());
        lines.push(format!("  {summary}"));
    }

    lines.push(String::new());
    match &view.body {
        ViewBody::Table(table) => push_table(&mut lines, "SQL Result", table),
        ViewBody::Citations(citations) => push_citations(&mut lines, citations),
        ViewBody::Fused {
            narrative,
            table,
            citations,
        } => {
            lines.push("Executive Intelligence Summary".to_string());
            lines.push(format!("  {narrative}"));
            lines.push(String::new());
            push_table(&mut lines, "SQL Result", table);
            lines.push(String::new());
            push_citations(&mut lines, citations);
        }
        ViewBody::Placeholder => lines.push(NO_DETAIL_PLACEHOLDER.to_string()),
    }

    lines.push(String::new());
    if disclosure_open {
        push_disclosure(&mut lines, &view.disclosure);
    } else {
        lines.push("AI Engine Details (hidden)".to_string());
    }

    TextSummary { lines }
}

fn push_table(lines: &mut Vec<String>, title: &str, table: &TableView) {
    lines.push(format!("{title} ({} rows)", table.row_count));
    lines.extend(table_lines(table));
}

/// Column-aligned table lines: header, rule, one line per row.
pub fn table_lines(table: &TableView) -> Vec<String> {
    if table.columns.is_empty() {
        return Vec::new();
    }
    let mut widths: Vec<usize> = table.columns.iter().map(|c| c.chars().count()).collect();
    for row in &table.rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let fmt_row = |cells: &[String]| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{c:<w$}", w = *w))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(table.rows.len() + 2);
    out.push(fmt_row(&table.columns));
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for row in &table.rows {
        out.push(fmt_row(row));
    }
    out
}

fn push_citations(lines: &mut Vec<String>, citations: &CitationsView) {
    lines.push("Document Insights".to_string());
    if !citations.narrative.is_empty() {
        lines.push(format!("  {}", citations.narrative));
    }
    lines.push(format!("Sources ({})", citations.cards.len()));
    for (i, card) in citations.cards.iter().enumerate() {
        push_card(lines, i + 1, card);
    }
}

fn push_card(lines: &mut Vec<String>, n: usize, card: &CitationCard) {
    lines.push(format!(
        "  {n}. {} | Relevance: {} | Chunk {}",
        card.filename, card.score, card.chunk_index
    ));
    if !card.preview.is_empty() {
        lines.push(format!("     {}", card.preview));
    }
}

fn push_disclosure(lines: &mut Vec<String>, d: &DisclosureView) {
    lines.push("AI Engine Details".to_string());
    lines.extend(disclosure_lines(d));
}

/// Body of the evidence disclosure, without its heading.
pub fn disclosure_lines(d: &DisclosureView) -> Vec<String> {
    let mut lines = Vec::new();
    if d.is_empty() {
        lines.push(format!("  {NO_DETAIL_PLACEHOLDER}"));
        return lines;
    }
    if let Some(statement) = d.statement.as_deref() {
        lines.push("Generated SQL".to_string());
        lines.push(format!("  {statement}"));
    }
    if let Some(table) = d.table.as_ref() {
        lines.push(format!("Results ({} rows)", table.row_count));
        lines.extend(table_lines(table).into_iter().map(|l| format!("  {l}")));
    }
    if let Some(narrative) = d.document_narrative.as_deref() {
        lines.push("RAG Response".to_string());
        lines.push(format!("  {narrative}"));
        lines.push(format!("Sources ({})", d.citations.len()));
        for (i, card) in d.citations.iter().enumerate() {
            push_card(&mut lines, i + 1, card);
        }
    }
    lines
}
