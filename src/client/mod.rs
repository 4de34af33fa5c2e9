//! Backend access: the unified query endpoint plus upload and maintenance calls.

mod http;
mod upload;

pub use http::HttpQueryClient;
pub use upload::{check_upload, UploadError, UploadReceipt, MAX_UPLOAD_BYTES, SUPPORTED_EXTENSIONS};

use crate::model::AnswerResult;
use async_trait::async_trait;

/// Fallback text when the server gives no usable detail.
pub const GENERIC_QUERY_FAILURE: &str = "Query failed";

/// Failure of a single query round-trip.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),
    /// The server answered with an error status.
    #[error("server error ({status}): {}", .message.as_deref().unwrap_or(GENERIC_QUERY_FAILURE))]
    Server { status: u16, message: Option<String> },
    /// The server answered successfully but the body was not an answer payload.
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

impl QueryError {
    /// Text to show the user: the server's detail verbatim, or a generic fallback.
    pub fn user_message(&self) -> String {
        match self {
            QueryError::Server {
                message: Some(m), ..
            } if !m.trim().is_empty() => m.clone(),
            _ => GENERIC_QUERY_FAILURE.to_string(),
        }
    }
}

/// Seam between the lifecycle controller and the transport.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn submit(&self, question: &str) -> Result<AnswerResult, QueryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_detail_is_surfaced_verbatim() {
        let err = QueryError::Server {
            status: 500,
            message: Some("RAG pipeline failed: collection empty".into()),
        };
        assert_eq!(err.user_message(), "RAG pipeline failed: collection empty");
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn missing_or_blank_detail_falls_back() {
        let blank = QueryError::Server {
            status: 502,
            message: Some("  ".into()),
        };
        assert_eq!(blank.user_message(), GENERIC_QUERY_FAILURE);
        let network = QueryError::Network("connection refused".into());
        assert_eq!(network.user_message(), GENERIC_QUERY_FAILURE);
    }
}
