//! Country color API
//!
//! GET /api/country-colors[?refresh=true]

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::{error::ApiResult, types::ColorMap, AppState};

/// GET /api/country-colors query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ColorQuery {
    /// Discard the cached map before computing
    #[serde(default)]
    pub refresh: bool,
}

/// GET /api/country-colors
///
/// Returns the ISO code → `#RRGGBB` map, computing it when the cache is cold.
/// Runs are serialized so concurrent requests share one computation: the
/// second caller waits and then hits the freshly written cache.
pub async fn get_country_colors(
    State(state): State<AppState>,
    Query(query): Query<ColorQuery>,
) -> ApiResult<Json<ColorMap>> {
    let _run = state.run_lock.lock().await;

    if query.refresh {
        tracing::info!("Refresh requested, invalidating color cache");
        state.pipeline.cache().invalidate().await;
    }

    let on_progress = Arc::new(|percent: u8| {
        tracing::debug!(percent, "Country color progress");
    });
    let (colors, report) = state.pipeline.run(on_progress).await;

    tracing::info!(
        countries = colors.len(),
        from_cache = report.from_cache,
        catalog_failed = report.catalog_failed,
        "Served country colors"
    );

    Ok(Json(colors))
}

/// Build color routes
pub fn color_routes() -> Router<AppState> {
    Router::new().route("/api/country-colors", get(get_country_colors))
}
