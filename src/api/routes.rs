use axum::{
    routing::{get, post},
    Router,
    extract::{rejection::JsonRejection, Json, State},
    response::Html,
};
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::AppError;
use crate::api::models::{ScrapeRequest, ScrapeResult};
use crate::api::response::{self, Reply};
use crate::scraper::scrape;
use crate::ui::INDEX_HTML;
use crate::AppState;

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/scrape", post(scrape_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(app_state)
}

async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn scrape_handler(
    State(state): State<AppState>,
    body: std::result::Result<Json<ScrapeRequest>, JsonRejection>,
) -> Reply<ScrapeResult> {
    let req = match body {
        Ok(Json(req)) => req,
        Err(rejection) => {
            let err = AppError::InvalidRequest(rejection.body_text());
            warn!("{}", err);
            return response::from_error(&err);
        }
    };
    info!("Processing request for URL: {}", req.url);
    let start_time = std::time::Instant::now();

    let result = scrape(&state.client, &req.url, state.config.preview_chars).await;
    let elapsed = start_time.elapsed();

    match result {
        Ok(scraped) => {
            info!(
                "Scraped {} in {:?}: status {}, {} links",
                scraped.url, elapsed, scraped.status_code, scraped.link_count
            );
            response::success(scraped)
        }
        Err(err) => {
            match &err {
                AppError::MissingUrl => info!("Rejected request without a URL"),
                AppError::InvalidRequest(msg) => warn!("Bad request: {}", msg),
                AppError::FetchFailed(msg) => warn!("Fetch error after {:?}: {}", elapsed, msg),
                AppError::ConfigError(msg) => warn!("Config error: {}", msg),
            }
            response::from_error(&err)
        }
    }
}
