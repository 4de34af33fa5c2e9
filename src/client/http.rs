use super::upload::{inspect, UploadError, UploadReceipt};
use super::{QueryBackend, QueryError};
use crate::config::Settings;
use crate::model::AnswerResult;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{multipart, Response, Url};
use std::path::Path;
use std::time::Duration;

/// HTTP client for the question-answering backend.
#[derive(Debug, Clone)]
pub struct HttpQueryClient {
    http: reqwest::Client,
    base_url: Url,
    top_k: u32,
}

impl HttpQueryClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        // Endpoints are joined relative to the base, which needs a trailing slash.
        let mut raw = settings.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base_url =
            Url::parse(&raw).with_context(|| format!("invalid base url {}", settings.base_url))?;
        let mut builder = reqwest::Client::builder()
            .user_agent(format!("querio-cli/{}", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("build http client")?;
        Ok(Self {
            http,
            base_url,
            top_k: settings.top_k,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, QueryError> {
        self.base_url
            .join(path)
            .map_err(|e| QueryError::Network(format!("bad endpoint {path}: {e}")))
    }

    /// Upload a single document for indexing.
    pub async fn upload(&self, path: &Path) -> Result<UploadReceipt, UploadError> {
        let checked = inspect(path)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| UploadError::Read(e.to_string()))?;
        let part = multipart::Part::bytes(bytes)
            .file_name(checked.filename.clone())
            .mime_str(checked.mime)
            .map_err(|e| UploadError::Request(QueryError::Network(e.to_string())))?;
        let form = multipart::Form::new().part("file", part);

        let url = self.endpoint("upload").map_err(UploadError::Request)?;
        let resp = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Request(QueryError::Network(e.to_string())))?;
        let resp = ensure_success(resp).await.map_err(UploadError::Request)?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| UploadError::Request(QueryError::InvalidBody(e.to_string())))?;
        let chunks = body.get("chunks").and_then(|v| v.as_u64()).unwrap_or(0);
        tracing::info!(file = %checked.filename, chunks, "document uploaded");
        Ok(UploadReceipt {
            filename: checked.filename,
            size_bytes: checked.size_bytes,
            chunks,
        })
    }

    /// Drop every indexed document chunk on the server.
    pub async fn clear_vectors(&self) -> Result<(), QueryError> {
        let url = self.endpoint("vectors/clear")?;
        let resp = self
            .http
            .delete(url)
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;
        ensure_success(resp).await?;
        Ok(())
    }

    /// Returns the server's reported status string.
    pub async fn health(&self) -> Result<String, QueryError> {
        let url = self.endpoint("health")?;
        let resp = self
            .http
            .get(url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;
        let resp = ensure_success(resp).await?;
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| QueryError::InvalidBody(e.to_string()))?;
        Ok(body
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string())
    }
}

#[async_trait]
impl QueryBackend for HttpQueryClient {
    async fn submit(&self, question: &str) -> Result<AnswerResult, QueryError> {
        let url = self.endpoint("query")?;
        let top_k = self.top_k.to_string();
        tracing::debug!(%url, %top_k, "sending query");
        let resp = self
            .http
            .post(url)
            .query(&[("question", question), ("top_k", top_k.as_str())])
            .send()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;
        let resp = ensure_success(resp).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| QueryError::Network(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| QueryError::InvalidBody(e.to_string()))
    }
}

/// Turn an error status into `QueryError::Server`, keeping the `detail` field when present.
async fn ensure_success(resp: Response) -> Result<Response, QueryError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(QueryError::Server {
        status: status.as_u16(),
        message: extract_detail(&body),
    })
}

/// Pull a human-readable message out of an error body.
///
/// FastAPI sends `{"detail": "..."}` for raised errors and a list of
/// `{"msg": ...}` objects for validation failures.
fn extract_detail(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    match v.get("detail")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(items) => {
            let msgs: Vec<&str> = items
                .iter()
                .filter_map(|i| i.get("msg").and_then(|m| m.as_str()))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_string() {
        assert_eq!(
            extract_detail(r#"{"detail": "Ollama is not running"}"#).as_deref(),
            Some("Ollama is not running")
        );
    }

    #[test]
    fn detail_validation_list() {
        let body = r#"{"detail": [{"loc": ["query", "question"], "msg": "field required"}]}"#;
        assert_eq!(extract_detail(body).as_deref(), Some("field required"));
    }

    #[test]
    fn detail_absent_or_not_json() {
        assert_eq!(extract_detail("Internal Server Error"), None);
        assert_eq!(extract_detail(r#"{"error": "x"}"#), None);
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let settings = Settings {
            base_url: "not a url".into(),
            ..Settings::default()
        };
        assert!(HttpQueryClient::new(&settings).is_err());
    }
}
