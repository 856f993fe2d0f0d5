//! HTTP handlers for REST API endpoints

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, response::Html, routing, Json, Router};
use serde::Deserialize;
use tracing::info;

use herbswap_core::{parse_target, FormulaDatabase};
use herbswap_search::context::{
    DEFAULT_MAX_CFORMULAS, DEFAULT_MAX_DOSE, DEFAULT_MAX_SFORMULAS, DEFAULT_PENALTY_FACTOR,
    DEFAULT_TOP_N,
};
use herbswap_search::{find_best_matches, SearchContext, Strategy};

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use crate::responses::{FormulaListResponse, HerbListResponse, MatchEntry, SearchResponse};

/// Request body for the search endpoint
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchRequest {
    /// Whitespace-separated `name:amount` items.
    pub items: String,

    /// Treat every item name as a raw herb, without formula expansion.
    pub raw: bool,

    /// Whitespace-separated formula keys to exclude.
    pub excludes: String,

    /// Number of results to return.
    pub top_n: usize,

    /// Maximum compound formulas per combination.
    pub max_cformulas: usize,

    /// Maximum simple formulas per combination.
    pub max_sformulas: usize,

    /// Smallest useful compound-formula dosage.
    pub min_cformula_dose: f64,

    /// Smallest useful simple-formula dosage.
    pub min_sformula_dose: f64,

    /// Upper dosage bound for compound formulas.
    pub max_cformula_dose: f64,

    /// Upper dosage bound for simple formulas.
    pub max_sformula_dose: f64,

    /// Weight on herbs the target does not ask for.
    pub penalty_factor: f64,

    /// Search strategy.
    pub strategy: Strategy,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            items: String::new(),
            raw: false,
            excludes: String::new(),
            top_n: DEFAULT_TOP_N,
            max_cformulas: DEFAULT_MAX_CFORMULAS,
            max_sformulas: DEFAULT_MAX_SFORMULAS,
            min_cformula_dose: 0.0,
            min_sformula_dose: 0.0,
            max_cformula_dose: DEFAULT_MAX_DOSE,
            max_sformula_dose: DEFAULT_MAX_DOSE,
            penalty_factor: DEFAULT_PENALTY_FACTOR,
            strategy: Strategy::default(),
        }
    }
}

impl SearchRequest {
    fn to_context(&self, database: &FormulaDatabase) -> ApiResult<SearchContext> {
        let target = parse_target(database, &self.items, self.raw)?;
        let defaults = SearchContext::default();
        Ok(SearchContext::new(target)
            .with_excludes(self.excludes.split_whitespace().map(String::from))
            .with_limits(self.max_cformulas, self.max_sformulas)
            .with_penalty_factor(self.penalty_factor)
            .with_dose_bounds(
                self.min_cformula_dose,
                self.min_sformula_dose,
                self.max_cformula_dose,
                self.max_sformula_dose,
            )
            .with_beam(
                self.top_n,
                defaults.beam_width_factor,
                defaults.beam_multiplier,
            ))
    }
}

/// State shared across all handlers
///
/// The database is immutable after load, so plain `Arc` sharing is enough;
/// every search builds its own fit cache.
#[derive(Clone)]
pub struct AppState {
    /// Loaded formula database
    pub database: Arc<FormulaDatabase>,

    /// Immutable server configuration
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new AppState instance with database and configuration
    pub fn new(database: FormulaDatabase, config: ServerConfig) -> Self {
        Self {
            database: Arc::new(database),
            config: Arc::new(config),
        }
    }
}

/// GET / - Embedded search form
pub async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

/// POST /api/search - Run a substitute search
pub async fn search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> ApiResult<Json<SearchResponse>> {
    let context = request.to_context(&state.database)?;
    let target = context.target.clone();
    let strategy = request.strategy;
    info!(
        "searching: {} target herbs, strategy {:?}, top_n {}",
        target.len(),
        strategy,
        context.top_n
    );

    // The search is CPU-bound; keep it off the async workers.
    let database = Arc::clone(&state.database);
    let started = Instant::now();
    let matches = tokio::task::spawn_blocking(move || {
        find_best_matches(&database, &context, strategy)
    })
    .await
    .map_err(|e| ApiError::internal(format!("search task failed: {e}")))??;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!("search finished: {} matches in {}ms", matches.len(), elapsed_ms);

    let matches = matches
        .iter()
        .map(|candidate| MatchEntry::build(candidate, &state.database, &target))
        .collect();
    Ok(Json(SearchResponse {
        matches,
        elapsed_ms,
    }))
}

/// GET /api/formulas - List all formula keys
pub async fn list_formulas(State(state): State<AppState>) -> Json<FormulaListResponse> {
    let mut formulas: Vec<String> = state.database.keys().map(String::from).collect();
    formulas.sort();
    Json(FormulaListResponse { formulas })
}

/// GET /api/herbs - List all known herbs
pub async fn list_herbs(State(state): State<AppState>) -> Json<HerbListResponse> {
    let herbs = state
        .database
        .herbs()
        .into_iter()
        .map(String::from)
        .collect();
    Json(HerbListResponse { herbs })
}

/// GET /api/health - Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "herbswap-serve",
        "version": env!("CARGO_PKG_VERSION"),
        "formulas": state.database.len(),
    }))
}

/// Create router with all endpoints
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", routing::get(index))
        .route("/api/health", routing::get(health_check))
        .route("/api/search", routing::post(search))
        .route("/api/formulas", routing::get(list_formulas))
        .route("/api/herbs", routing::get(list_herbs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    fn state() -> AppState {
        let database = FormulaDatabase::from_compositions([
            (
                "桂枝湯".to_string(),
                [("桂枝", 0.6), ("白芍", 0.6)].into_iter().collect(),
            ),
            (
                "桂枝去芍藥湯".to_string(),
                [("桂枝", 0.6), ("生薑", 0.6)].into_iter().collect(),
            ),
        ]);
        AppState::new(database, ServerConfig::default())
    }

    fn app() -> Router {
        create_router().with_state(state())
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_check() {
        let response = app()
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["formulas"], 2);
    }

    #[tokio::test]
    async fn test_index_serves_form() {
        let response = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_search_finds_exact_match() {
        let request = Request::post("/api/search")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"items": "桂枝湯:5.0"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let best = &body["matches"][0];
        assert_eq!(best["combination"][0]["key"], "桂枝湯");
        assert!((best["match_percentage"].as_f64().unwrap() - 100.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn test_search_unknown_item_is_unprocessable() {
        let request = Request::post("/api/search")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"items": "人參:3.0"}"#))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_search_invalid_parameter_is_unprocessable() {
        let request = Request::post("/api/search")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                r#"{"items": "桂枝湯:5.0", "penalty_factor": -1.0}"#,
            ))
            .unwrap();
        let response = app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_list_formulas_sorted() {
        let response = app()
            .oneshot(Request::get("/api/formulas").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        let formulas: Vec<&str> = body["formulas"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(formulas.len(), 2);
        let mut sorted = formulas.clone();
        sorted.sort();
        assert_eq!(formulas, sorted);
    }

    #[tokio::test]
    async fn test_list_herbs() {
        let response = app()
            .oneshot(Request::get("/api/herbs").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        let herbs = body["herbs"].as_array().unwrap();
        assert_eq!(herbs.len(), 3);
    }
}
