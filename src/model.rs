use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::SystemTime;

/// A user question as submitted. Each submission creates a new `Query`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub question: String,
    pub submitted_at: SystemTime,
}

impl Query {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            submitted_at: SystemTime::now(),
        }
    }
}

/// Backend strategy that produced an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Sql,
    Documents,
    Hybrid,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Sql => "SQL",
            Route::Documents => "DOCUMENTS",
            Route::Hybrid => "HYBRID",
        }
    }

    fn parse(tag: &str) -> Option<Self> {
        match tag {
            "SQL" => Some(Route::Sql),
            "DOCUMENTS" => Some(Route::Documents),
            "HYBRID" => Some(Route::Hybrid),
            _ => None,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Route tag as it arrived on the wire.
///
/// Unknown tags are kept rather than rejected at decode time so the presenter
/// can degrade to a placeholder instead of failing the whole request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum RouteTag {
    Known(Route),
    Unrecognized(String),
}

impl RouteTag {
    pub fn known(&self) -> Option<Route> {
        match self {
            RouteTag::Known(r) => Some(*r),
            RouteTag::Unrecognized(_) => None,
        }
    }

    pub fn label(&self) -> &str {
        match self {
            RouteTag::Known(r) => r.as_str(),
            RouteTag::Unrecognized(s) if s.is_empty() => "UNKNOWN",
            RouteTag::Unrecognized(s) => s,
        }
    }
}

impl Default for RouteTag {
    fn default() -> Self {
        RouteTag::Unrecognized(String::new())
    }
}

impl From<Route> for RouteTag {
    fn from(r: Route) -> Self {
        RouteTag::Known(r)
    }
}

impl From<Option<String>> for RouteTag {
    fn from(tag: Option<String>) -> Self {
        match tag {
            Some(s) => match Route::parse(&s) {
                Some(r) => RouteTag::Known(r),
                None => RouteTag::Unrecognized(s),
            },
            None => RouteTag::default(),
        }
    }
}

impl From<RouteTag> for String {
    fn from(tag: RouteTag) -> Self {
        match tag {
            RouteTag::Known(r) => r.as_str().to_string(),
            RouteTag::Unrecognized(s) => s,
        }
    }
}

/// A single result row, keyed by column name in the order the backend sent.
pub type Row = Map<String, Value>;

/// Settled answer payload for a query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnswerResult {
    #[serde(default)]
    pub route: RouteTag,
    #[serde(rename = "answer", alias = "narrative", default, deserialize_with = "null_as_default")]
    pub narrative: String,
    #[serde(
        rename = "raw_sql",
        alias = "sql_result",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub structured_evidence: Option<StructuredEvidence>,
    #[serde(
        rename = "raw_rag",
        alias = "rag_result",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub document_evidence: Option<DocumentEvidence>,
}

/// Generated SQL and the rows it returned.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StructuredEvidence {
    #[serde(rename = "sql")]
    pub statement: String,
    pub row_count: u64,
    #[serde(rename = "results")]
    pub rows: Vec<Row>,
}

impl StructuredEvidence {
    /// Column names, taken from the first row. Later rows are assumed to
    /// share the same key set.
    pub fn columns(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowsWire {
    Many(Vec<Row>),
    One(Row),
}

#[derive(Deserialize)]
struct StructuredWire {
    #[serde(default, deserialize_with = "null_as_default")]
    sql: String,
    #[serde(default)]
    row_count: Option<u64>,
    #[serde(default)]
    results: Option<RowsWire>,
}

impl<'de> Deserialize<'de> for StructuredEvidence {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = StructuredWire::deserialize(deserializer)?;
        // Multi-statement answers are sometimes collapsed into a single object.
        let rows = match wire.results {
            Some(RowsWire::Many(rows)) => rows,
            Some(RowsWire::One(row)) => vec![row],
            None => Vec::new(),
        };
        Ok(StructuredEvidence {
            statement: wire.sql,
            row_count: wire.row_count.unwrap_or(rows.len() as u64),
            rows,
        })
    }
}

/// Retrieval narrative plus the ranked chunks it was built from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentEvidence {
    #[serde(rename = "answer", default, deserialize_with = "null_as_default")]
    pub narrative: String,
    #[serde(rename = "sources", default, deserialize_with = "null_as_default")]
    pub citations: Vec<Citation>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub filename: String,
    #[serde(default)]
    pub relevance_score: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chunk_index: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub preview: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Why an answer payload cannot be presented as its declared route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedResult {
    #[error("unrecognized route {0:?}")]
    UnknownRoute(String),
    #[error("{route} answer is missing structured evidence")]
    MissingStructured { route: Route },
    #[error("{route} answer is missing document evidence")]
    MissingDocuments { route: Route },
}

/// An answer checked against its declared route.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClassifiedAnswer<'a> {
    Sql {
        structured: &'a StructuredEvidence,
    },
    Documents {
        documents: &'a DocumentEvidence,
    },
    Hybrid {
        narrative: &'a str,
        structured: &'a StructuredEvidence,
        documents: &'a DocumentEvidence,
    },
}

impl AnswerResult {
    /// Match the payload against its route tag, reporting the first invariant it breaks.
    pub fn classify(&self) -> Result<ClassifiedAnswer<'_>, MalformedResult> {
        let route = match &self.route {
            RouteTag::Known(r) => *r,
            RouteTag::Unrecognized(s) => return Err(MalformedResult::UnknownRoute(s.clone())),
        };
        let structured = self.structured_evidence.as_ref();
        let documents = self.document_evidence.as_ref();
        match route {
            Route::Sql => structured
                .map(|structured| ClassifiedAnswer::Sql { structured })
                .ok_or(MalformedResult::MissingStructured { route }),
            Route::Documents => documents
                .map(|documents| ClassifiedAnswer::Documents { documents })
                .ok_or(MalformedResult::MissingDocuments { route }),
            Route::Hybrid => match (structured, documents) {
                (Some(structured), Some(documents)) => Ok(ClassifiedAnswer::Hybrid {
                    narrative: &self.narrative,
                    structured,
                    documents,
                }),
                (None, _) => Err(MalformedResult::MissingStructured { route }),
                (_, None) => Err(MalformedResult::MissingDocuments { route }),
            },
        }
    }
}

/// Immutable snapshot of an answered question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub question: String,
    pub answered_at: String,
    pub result: AnswerResult,
}

/// Wall-clock time as `HH:MM:SS`, local when the offset is known.
pub fn clock_time() -> String {
    let now =
        time::OffsetDateTime::now_local().unwrap_or_else(|_| time::OffsetDateTime::now_utc());
    now.format(time::macros::format_description!("[hour]:[minute]:[second]"))
        .unwrap_or_else(|_| "--:--:--".into())
}

/// Cosmetic step indicator shown while a query is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ProgressStage {
    #[default]
    Idle,
    IntentDetection,
    StructuredExecution,
    DocumentRetrieval,
    Complete,
}

impl ProgressStage {
    /// Steps shown on the timeline, in order.
    pub const STEPS: [ProgressStage; 4] = [
        ProgressStage::IntentDetection,
        ProgressStage::StructuredExecution,
        ProgressStage::DocumentRetrieval,
        ProgressStage::Complete,
    ];

    pub fn index(self) -> u8 {
        match self {
            ProgressStage::Idle => 0,
            ProgressStage::IntentDetection => 1,
            ProgressStage::StructuredExecution => 2,
            ProgressStage::DocumentRetrieval => 3,
            ProgressStage::Complete => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ProgressStage::Idle => "Idle",
            ProgressStage::IntentDetection => "Intent Detection",
            ProgressStage::StructuredExecution => "SQL Execution",
            ProgressStage::DocumentRetrieval => "Document Retrieval",
            ProgressStage::Complete => "AI Fusion",
        }
    }

    /// Next simulated stage. The ticker never advances past document retrieval;
    /// only a real completion reaches `Complete`.
    pub fn simulated_next(self) -> Self {
        match self {
            ProgressStage::Idle | ProgressStage::IntentDetection => {
                ProgressStage::StructuredExecution
            }
            ProgressStage::StructuredExecution | ProgressStage::DocumentRetrieval => {
                ProgressStage::DocumentRetrieval
            }
            ProgressStage::Complete => ProgressStage::Complete,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
}

/// Transient user-facing message, delivered by whatever surface is active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

/// Events emitted by the lifecycle controller and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Submitted {
        query: Query,
    },
    StageChanged {
        stage: ProgressStage,
    },
    Answered {
        // Box to keep the enum small; entries carry full result rows.
        entry: Box<HistoryEntry>,
        /// History after the new entry was recorded, most recent first.
        history: Vec<HistoryEntry>,
    },
    Malformed {
        question: String,
        result: Box<AnswerResult>,
        reason: MalformedResult,
    },
    Failed {
        question: String,
        error: String,
    },
    Rejected {
        reason: String,
    },
    /// A history entry shown again, with the question it answered.
    Displayed {
        entry: Box<HistoryEntry>,
    },
    Notify(Notification),
}
