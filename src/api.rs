use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::core::error::ScrapeError;
use crate::tools::{analyze_menu, run_scrape, PipelineOptions, ScrapeOutcome, ScrapeTarget};
use crate::types::*;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(scrape_handler))
        .route("/scrape", get(scrape_handler))
        .route("/health", get(health_check))
        .route("/analyze/menu", post(analyze_menu_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "dish-scout",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn scrape_error(e: &ScrapeError) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: e.to_string(),
            stage: Some(e.kind().to_string()),
        }),
    )
}

async fn scrape_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScrapeQuery>,
) -> Result<Json<ScrapeResponse>, ApiError> {
    let target = ScrapeTarget::resolve(
        &state.config,
        query.item.as_deref(),
        query.lat.as_deref(),
        query.long.as_deref(),
    );
    let options = PipelineOptions::from_config(&state.config).with_query(&query);

    match run_scrape(&state, &target, &options).await {
        Ok(ScrapeOutcome::Completed(report)) => {
            if report.is_empty() {
                info!("No valid cards for '{}'", target.item);
            }
            Ok(Json(report.into_response()))
        }
        Ok(ScrapeOutcome::NoMatch) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("search API request not found for '{}'", target.item),
                stage: Some("NoMatch".to_string()),
            }),
        )),
        Err(e) => {
            error!("Scrape error: {}", e);
            Err(scrape_error(&e))
        }
    }
}

async fn analyze_menu_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MenuAnalysisRequest>,
) -> Result<Json<MenuAnalysisResponse>, ApiError> {
    if request.items.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "menu has no items to analyze".to_string(),
                stage: None,
            }),
        ));
    }

    let options = PipelineOptions::from_config(&state.config);
    let max_concurrent = state.config.batch.resolve_max_concurrent();
    let item_timeout = state.config.resolve_item_timeout();

    Ok(Json(
        analyze_menu(&state, request, options, max_concurrent, item_timeout).await,
    ))
}
