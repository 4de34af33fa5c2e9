use axum::extract::{Multipart, Query};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use querio_cli::client::{HttpQueryClient, QueryBackend, QueryError, UploadError};
use querio_cli::config::Settings;
use querio_cli::model::{ClassifiedAnswer, Route};
use serde_json::{json, Value};
use std::collections::HashMap;

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(base_url: String) -> HttpQueryClient {
    HttpQueryClient::new(&Settings {
        base_url,
        top_k: 4,
        ..Default::default()
    })
    .unwrap()
}

async fn echo_query(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({
        "route": "HYBRID",
        "answer": format!("asked {} with top_k={}", params["question"], params["top_k"]),
        "sql_result": {
            "sql": "SELECT region, SUM(total) AS revenue FROM orders GROUP BY region",
            "row_count": 2,
            "results": [{"region": "EU", "revenue": 1200.5}, {"region": "US", "revenue": 900}]
        },
        "rag_result": {
            "answer": "Refunds are issued within 14 days.",
            "sources": [{"filename": "policy.pdf", "relevance_score": 0.87, "chunk_index": 2, "preview": "Refunds are..."}]
        }
    }))
}

#[tokio::test]
async fn decodes_hybrid_answer_and_sends_parameters() {
    let base = serve(Router::new().route("/query", post(echo_query))).await;
    let result = client(base)
        .submit("revenue by region and refund policy")
        .await
        .unwrap();

    assert_eq!(result.route.known(), Some(Route::Hybrid));
    assert_eq!(
        result.narrative,
        "asked revenue by region and refund policy with top_k=4"
    );
    match result.classify().unwrap() {
        ClassifiedAnswer::Hybrid {
            structured,
            documents,
            ..
        } => {
            assert_eq!(structured.row_count, 2);
            assert_eq!(structured.columns(), ["region", "revenue"]);
            assert_eq!(documents.citations[0].filename, "policy.pdf");
            assert_eq!(documents.citations[0].relevance_score, Some(0.87));
        }
        other => panic!("expected hybrid, got {other:?}"),
    }
}

#[tokio::test]
async fn base_url_with_path_prefix_is_kept() {
    let api = Router::new().route("/query", post(echo_query));
    let base = serve(Router::new().nest("/api", api)).await;
    let result = client(format!("{base}/api")).submit("q").await.unwrap();
    assert_eq!(result.route.known(), Some(Route::Hybrid));
}

#[tokio::test]
async fn server_detail_becomes_the_message() {
    let router = Router::new().route(
        "/query",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"detail": "SQL generation failed: model offline"})),
            )
        }),
    );
    let err = client(serve(router).await).submit("q").await.unwrap_err();
    assert!(matches!(err, QueryError::Server { status: 500, .. }));
    assert_eq!(err.user_message(), "SQL generation failed: model offline");
}

#[tokio::test]
async fn error_without_detail_falls_back() {
    let router = Router::new().route(
        "/query",
        post(|| async { (StatusCode::BAD_GATEWAY, "upstream down").into_response() }),
    );
    let err = client(serve(router).await).submit("q").await.unwrap_err();
    assert_eq!(err.user_message(), "Query failed");
}

#[tokio::test]
async fn non_json_success_is_invalid_body() {
    let router = Router::new().route("/query", post(|| async { "<html>maintenance</html>" }));
    let err = client(serve(router).await).submit("q").await.unwrap_err();
    assert!(matches!(err, QueryError::InvalidBody(_)), "{err:?}");
}

#[tokio::test]
async fn refused_connection_is_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let err = client(format!("http://{addr}")).submit("q").await.unwrap_err();
    assert!(matches!(err, QueryError::Network(_)), "{err:?}");
    assert_eq!(err.user_message(), "Query failed");
}

#[tokio::test]
async fn uploads_file_as_multipart() {
    async fn upload(mut form: Multipart) -> Json<Value> {
        let mut seen = None;
        while let Some(field) = form.next_field().await.unwrap() {
            if field.name() == Some("file") {
                let name = field.file_name().map(str::to_owned);
                let bytes = field.bytes().await.unwrap();
                seen = Some((name, bytes.len()));
            }
        }
        let (name, len) = seen.expect("file field");
        Json(json!({"status": "success", "filename": name, "chunks": len / 4}))
    }

    let base = serve(Router::new().route("/upload", post(upload))).await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.md");
    std::fs::write(&path, "# Refunds\nWithin 14 days.\n").unwrap();

    let receipt = client(base).upload(&path).await.unwrap();
    assert_eq!(receipt.filename, "notes.md");
    assert_eq!(receipt.size_bytes, 26);
    assert_eq!(receipt.chunks, 6);
}

#[tokio::test]
async fn unsupported_upload_is_refused_before_sending() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    std::fs::write(&path, "a,b\n1,2\n").unwrap();
    // Nothing listens here; the request must not be attempted.
    let err = client("http://127.0.0.1:9".into())
        .upload(&path)
        .await
        .unwrap_err();
    assert!(matches!(err, UploadError::UnsupportedType(_)), "{err:?}");
}

#[tokio::test]
async fn clear_and_health() {
    let router = Router::new()
        .route(
            "/vectors/clear",
            delete(|| async { Json(json!({"status": "success"})) }),
        )
        .route("/health", get(|| async { Json(json!({"status": "ok"})) }));
    let c = client(serve(router).await);
    c.clear_vectors().await.unwrap();
    assert_eq!(c.health().await.unwrap(), "ok");
}
