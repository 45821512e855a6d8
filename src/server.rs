use std::any::Any;
use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::analyzer::{AnalysisError, Analyzer};
use crate::config::AppConfig;
use crate::db::Database;
use crate::models::{AnalyzeRequest, AnalyzeResponse, HealthStatus};

const EMPTY_NARRATIVE_MESSAGE: &str = "Please provide a narrative";
const ANALYSIS_FAILED_MESSAGE: &str = "Error analyzing narrative";
const SERVER_ERROR_MESSAGE: &str = "Server Error";

#[derive(Clone)]
struct AppState {
    db: Database,
    analyzer: Analyzer,
}

pub async fn run_server(config: AppConfig, db: Database, analyzer: Analyzer) -> Result<()> {
    let app = router(AppState { db, analyzer });

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze_handler))
        .route("/health", get(health_handler))
        .fallback(not_found_handler)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn not_found_handler() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: SERVER_ERROR_MESSAGE,
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!("handler panicked: {}", detail);

    ApiError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: SERVER_ERROR_MESSAGE,
    }
    .into_response()
}

async fn analyze_handler(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    // An unreadable body is treated as a missing narrative.
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("rejected analyze body: {}", rejection);
            AnalyzeRequest::default()
        }
    };

    let narrative = request.narrative.unwrap_or_default();
    let recommendations = state.analyzer.analyze(&narrative).await?;

    Ok(Json(AnalyzeResponse {
        success: true,
        recommendations,
    }))
}

async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    match state.db.section_count().await {
        Ok(count) => (
            StatusCode::OK,
            Json(HealthStatus {
                status: "ok".to_string(),
                sections: Some(count),
            }),
        ),
        Err(err) => {
            tracing::warn!("health check failed: {:#}", err);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthStatus {
                    status: "unavailable".to_string(),
                    sections: None,
                }),
            )
        }
    }
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: &'static str,
}

impl From<AnalysisError> for ApiError {
    fn from(value: AnalysisError) -> Self {
        match value {
            AnalysisError::EmptyNarrative => Self {
                status: StatusCode::BAD_REQUEST,
                message: EMPTY_NARRATIVE_MESSAGE,
            },
            AnalysisError::Catalog(err) => {
                tracing::error!("analysis error: {:#}", err);
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    message: ANALYSIS_FAILED_MESSAGE,
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::bail;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, HeaderMap, Method, Request};
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::catalog::CatalogStore;
    use crate::config::MatchingConfig;
    use crate::models::{Judgment, Section};
    use crate::seed::Seeder;
    use crate::text::EnglishNormalizer;

    struct UnreachableCatalog;

    #[async_trait]
    impl CatalogStore for UnreachableCatalog {
        async fn list_sections(&self) -> anyhow::Result<Vec<Section>> {
            bail!("database file is locked")
        }

        async fn find_judgments_by_section_code(
            &self,
            _code: &str,
            _limit: usize,
        ) -> anyhow::Result<Vec<Judgment>> {
            bail!("database file is locked")
        }
    }

    async fn seeded_state() -> AppState {
        let db = Database::in_memory().await.unwrap();
        Seeder::new(db.clone()).ensure_seeded().await.unwrap();
        let analyzer = Analyzer::new(
            Arc::new(db.clone()),
            Arc::new(EnglishNormalizer::new()),
            MatchingConfig::default(),
        );
        AppState { db, analyzer }
    }

    async fn call_analyze(state: AppState, narrative: Option<&str>) -> (StatusCode, Value) {
        let request = AnalyzeRequest {
            narrative: narrative.map(str::to_string),
        };
        let response = analyze_handler(State(state), Ok(Json(request)))
            .await
            .into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn analyze_returns_recommendations() {
        let (status, body) =
            call_analyze(seeded_state().await, Some("He stole my wallet and ran away.")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let recs = body["recommendations"].as_array().unwrap();
        assert_eq!(recs[0]["code"], "IPC 379");
        assert_eq!(recs[0]["title"], "Theft");
        assert_eq!(recs[0]["score"], 0.375);
        assert_eq!(
            recs[0]["judgments"][0]["caseName"],
            "Kishan Chand v. State of Haryana"
        );
        assert!(recs[0]["judgments"][0].get("court").is_none());
    }

    #[tokio::test]
    async fn murder_narrative_caps_judgments_at_two() {
        let (status, body) = call_analyze(
            seeded_state().await,
            Some("The victim was killed; it was a brutal murder and the death was confirmed."),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        let recs = body["recommendations"].as_array().unwrap();
        assert!(recs.len() <= 5);
        let murder = recs.iter().find(|r| r["code"] == "IPC 302").unwrap();
        assert_eq!(murder["judgments"].as_array().unwrap().len(), 2);
        for rec in recs {
            let score = rec["score"].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[tokio::test]
    async fn empty_or_missing_narrative_is_a_bad_request() {
        for narrative in [Some(""), None] {
            let (status, body) = call_analyze(seeded_state().await, narrative).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["success"], false);
            assert_eq!(body["error"], "Please provide a narrative");
            assert!(body.get("recommendations").is_none());
        }
    }

    #[tokio::test]
    async fn unmatched_narrative_succeeds_with_no_recommendations() {
        let (status, body) =
            call_analyze(seeded_state().await, Some("We had tea in the garden.")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["recommendations"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn catalog_failure_hides_details() {
        let db = Database::in_memory().await.unwrap();
        let analyzer = Analyzer::new(
            Arc::new(UnreachableCatalog),
            Arc::new(EnglishNormalizer::new()),
            MatchingConfig::default(),
        );

        let (status, body) = call_analyze(AppState { db, analyzer }, Some("stolen car")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Error analyzing narrative");
        assert!(!body.to_string().contains("locked"));
    }

    #[tokio::test]
    async fn health_reports_catalog_size() {
        let (status, Json(health)) = health_handler(State(seeded_state().await)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health.status, "ok");
        assert_eq!(health.sections, Some(7));
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_analyze(body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/api/analyze")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ORIGIN, "http://localhost:3000")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn explode() -> &'static str {
        panic!("handler blew up")
    }

    #[tokio::test]
    async fn routed_analyze_returns_recommendations_with_cors() {
        let app = router(seeded_state().await);
        let (status, headers, body) =
            send(app, post_analyze(r#"{"narrative": "They snatched her chain"}"#)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["recommendations"][0]["code"], "IPC 379");
        assert_eq!(
            headers
                .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }

    #[tokio::test]
    async fn malformed_json_body_is_a_bad_request() {
        let app = router(seeded_state().await);
        let (status, _, body) = send(app, post_analyze("{oops")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Please provide a narrative");
    }

    #[tokio::test]
    async fn body_without_narrative_is_a_bad_request() {
        let app = router(seeded_state().await);
        let (status, _, body) = send(app, post_analyze(r#"{"story": "stolen bike"}"#)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please provide a narrative");
    }

    #[tokio::test]
    async fn unknown_route_returns_json_error() {
        let app = router(seeded_state().await);
        let request = Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(app, request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Server Error");
    }

    #[tokio::test]
    async fn panicking_handler_returns_json_error() {
        let app = Router::new()
            .route("/boom", get(explode))
            .layer(CatchPanicLayer::custom(handle_panic));
        let request = Request::builder()
            .uri("/boom")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(app, request).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Server Error");
        assert!(!body.to_string().contains("blew up"));
    }
}
