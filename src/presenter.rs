//! Route-polymorphic rendering of settled answers into a view tree.
//!
//! `render` is pure: it never mutates the answer and never performs I/O, so
//! re-displaying a history entry yields exactly the view it produced before.
//! Surfaces (text output, TUI) draw the returned tree.

use crate::model::{AnswerResult, Citation, ClassifiedAnswer, DocumentEvidence, StructuredEvidence};
use serde_json::Value;
use std::fmt;

/// Shown when an answer cannot be presented as its declared route.
pub const NO_DETAIL_PLACEHOLDER: &str = "No detailed data available";

/// Longest preview shown on a citation card. The disclosure view shows it whole.
pub const CARD_PREVIEW_CHARS: usize = 160;

#[derive(Debug, Clone, PartialEq)]
pub struct ResultView {
    pub route_label: String,
    /// Narrative attached to a single-strategy answer, when the backend sent one.
    pub summary: Option<String>,
    pub body: ViewBody,
    pub disclosure: DisclosureView,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewBody {
    Table(TableView),
    Citations(CitationsView),
    Fused {
        narrative: String,
        table: TableView,
        citations: CitationsView,
    },
    Placeholder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableView {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub row_count: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitationsView {
    pub narrative: String,
    pub cards: Vec<CitationCard>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CitationCard {
    pub filename: String,
    pub score: ScoreLabel,
    pub chunk_index: u64,
    pub preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScoreLabel {
    Value(String),
    Unavailable,
}

impl fmt::Display for ScoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreLabel::Value(s) => f.write_str(s),
            ScoreLabel::Unavailable => f.write_str("unavailable"),
        }
    }
}

/// Raw evidence exactly as received, for every route.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DisclosureView {
    pub statement: Option<String>,
    pub table: Option<TableView>,
    pub document_narrative: Option<String>,
    pub citations: Vec<CitationCard>,
}

impl DisclosureView {
    pub fn is_empty(&self) -> bool {
        self.statement.is_none() && self.table.is_none() && self.document_narrative.is_none()
    }
}

pub fn render(result: &AnswerResult) -> ResultView {
    let summary = Some(result.narrative.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let (body, summary) = match result.classify() {
        Ok(ClassifiedAnswer::Sql { structured }) => (ViewBody::Table(table_view(structured)), summary),
        Ok(ClassifiedAnswer::Documents { documents }) => {
            (ViewBody::Citations(citations_view(documents, true)), summary)
        }
        Ok(ClassifiedAnswer::Hybrid {
            narrative,
            structured,
            documents,
        }) => (
            ViewBody::Fused {
                narrative: narrative.to_string(),
                table: table_view(structured),
                citations: citations_view(documents, true),
            },
            // The banner already carries the narrative.
            None,
        ),
        Err(_) => (ViewBody::Placeholder, summary),
    };

    ResultView {
        route_label: result.route.label().to_string(),
        summary,
        body,
        disclosure: disclosure_view(result),
    }
}

fn disclosure_view(result: &AnswerResult) -> DisclosureView {
    let mut view = DisclosureView::default();
    if let Some(sql) = result.structured_evidence.as_ref() {
        view.statement = Some(sql.statement.clone());
        view.table = Some(table_view(sql));
    }
    if let Some(docs) = result.document_evidence.as_ref() {
        view.document_narrative = Some(docs.narrative.clone());
        view.citations = citations_view(docs, false).cards;
    }
    view
}

/// Columns come from the first row. Cells a later row lacks render empty;
/// keys the first row lacks are not shown.
fn table_view(evidence: &StructuredEvidence) -> TableView {
    let columns = evidence.columns();
    let rows = evidence
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();
    TableView {
        columns,
        rows,
        row_count: evidence.row_count,
    }
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn citations_view(evidence: &DocumentEvidence, clamp: bool) -> CitationsView {
    CitationsView {
        narrative: evidence.narrative.clone(),
        cards: evidence
            .citations
            .iter()
            .map(|c| citation_card(c, clamp))
            .collect(),
    }
}

fn citation_card(c: &Citation, clamp: bool) -> CitationCard {
    CitationCard {
        filename: c.filename.clone(),
        score: score_label(c.relevance_score),
        chunk_index: c.chunk_index,
        preview: if clamp {
            clamp_chars(&c.preview, CARD_PREVIEW_CHARS)
        } else {
            c.preview.clone()
        },
    }
}

pub fn score_label(score: Option<f64>) -> ScoreLabel {
    match score {
        Some(s) if s.is_finite() => ScoreLabel::Value(format!("{s:.2}")),
        _ => ScoreLabel::Unavailable,
    }
}

fn clamp_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
