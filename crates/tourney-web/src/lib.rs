//! JSON API over the scrape pipeline and the tournament store.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::net::TcpListener;
use tourney_core::{StoredTournament, TournamentRecord};
use tourney_sync::{connect_store, ScrapeConfig, ScrapePipeline};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "tourney-web";

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ScrapePipeline>,
}

impl AppState {
    pub fn new(pipeline: ScrapePipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ListQuery {
    #[serde(default = "default_limit")]
    limit: i64,
    #[serde(default)]
    offset: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Clone, Deserialize)]
struct ScrapeQuery {
    #[serde(alias = "seedUrl")]
    seed_url: String,
}

#[derive(Debug, Serialize)]
struct ListResponse {
    items: Vec<StoredTournament>,
}

#[derive(Debug, Serialize)]
struct ScrapeResponse {
    id: i64,
    saved: bool,
    data: TournamentRecord,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/tournaments", get(tournaments_handler))
        .route("/scrape", post(scrape_handler))
        .layer(CorsLayer::very_permissive())
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("TOURNEY_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let config = ScrapeConfig::from_env();
    let store = connect_store(&config).await?;
    let state = AppState::new(ScrapePipeline::new(&config, store)?);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "serving tournament api");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": VERSION, "mode": "public" }))
}

async fn tournaments_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Response {
    let store = state.pipeline.store();
    match store.list(query.limit.max(0), query.offset.max(0)).await {
        Ok(items) => Json(ListResponse { items }).into_response(),
        Err(err) => error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Listing failed: {err}")),
    }
}

async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScrapeQuery>,
) -> Response {
    let record = match state.pipeline.scrape(&query.seed_url).await {
        Ok(record) => record,
        Err(err) => {
            warn!(url = %query.seed_url, error = %err, "scrape failed");
            return error_response(StatusCode::BAD_REQUEST, format!("Scrape failed: {err}"));
        }
    };
    match state.pipeline.save(&record).await {
        Ok(stored) => Json(ScrapeResponse {
            id: stored.id,
            saved: true,
            data: stored.record,
        })
        .into_response(),
        Err(err) => {
            warn!(url = %query.seed_url, error = %err, "storing scrape failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("Persistence failed: {err}"))
        }
    }
}

fn error_response(status: StatusCode, detail: String) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::Request;
    use chrono::NaiveDate;
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tourney_storage::{FetcherConfig, MemoryTournamentStore, PageFetcher, TournamentStore};
    use tower::ServiceExt;

    use super::*;

    fn test_app(store: Arc<MemoryTournamentStore>) -> Router {
        let fetcher = PageFetcher::new(FetcherConfig::default(), None).unwrap();
        app(AppState::new(ScrapePipeline::with_fetcher(
            fetcher,
            store,
            Duration::from_secs(2),
        )))
    }

    async fn body_json(resp: Response) -> Value {
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_app(Arc::new(MemoryTournamentStore::new()));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["mode"], "public");
        assert_eq!(body["version"], VERSION);
    }

    #[tokio::test]
    async fn tournaments_are_listed_in_start_date_order() {
        let store = Arc::new(MemoryTournamentStore::new());
        let mut later = TournamentRecord::minimal("Later", "https://example.org/later");
        later.start_date = NaiveDate::from_ymd_opt(2025, 8, 1);
        let mut sooner = TournamentRecord::minimal("Sooner", "https://example.org/sooner");
        sooner.start_date = NaiveDate::from_ymd_opt(2025, 6, 1);
        store.upsert_by_identity(&later).await.unwrap();
        store.upsert_by_identity(&sooner).await.unwrap();

        let resp = test_app(Arc::clone(&store))
            .oneshot(
                Request::builder()
                    .uri("/tournaments?limit=10&offset=0")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "Sooner");
        assert_eq!(items[0]["start_date"], "2025-06-01");
        assert_eq!(items[1]["source_link"], "https://example.org/later");
    }

    #[tokio::test]
    async fn scrape_of_unreachable_url_is_a_client_error() {
        let store = Arc::new(MemoryTournamentStore::new());
        let resp = test_app(Arc::clone(&store))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/scrape?seedUrl=http://127.0.0.1:1/tournament/j60-antalya/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = body_json(resp).await;
        assert!(body["detail"].as_str().unwrap().starts_with("Scrape failed: "));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn scrape_without_url_is_rejected() {
        let resp = test_app(Arc::new(MemoryTournamentStore::new()))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/scrape")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
