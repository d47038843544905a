//! Top songs API
//!
//! GET /api/songs?countryCode=XX[&limit=N]

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{
    error::{ApiError, ApiResult},
    services::FetchError,
    types::Song,
    AppState,
};

/// Upper bound on `limit`
pub const MAX_SONG_LIMIT: usize = 100;

/// GET /api/songs query parameters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SongQuery {
    pub country_code: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/songs
///
/// Top songs for one country, best ranked first. `limit` defaults to the
/// configured song limit and is clamped to `1..=100`.
pub async fn get_top_songs(
    State(state): State<AppState>,
    Query(query): Query<SongQuery>,
) -> ApiResult<Json<Vec<Song>>> {
    let country_code = query
        .country_code
        .map(|code| code.trim().to_uppercase())
        .filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::BadRequest("countryCode is required".to_string()))?;

    let limit = query
        .limit
        .unwrap_or(state.pipeline.config().song_limit)
        .clamp(1, MAX_SONG_LIMIT);

    tracing::debug!(country_code = %country_code, limit, "Fetching top songs");

    let songs = state
        .pipeline
        .song_source()
        .fetch_top_songs(&country_code, limit)
        .await
        .map_err(|e| match e {
            FetchError::InvalidCountryCode(code) => {
                ApiError::BadRequest(format!("Invalid country code: {:?}", code))
            }
            other => {
                tracing::warn!(country_code = %country_code, "Top songs fetch failed: {}", other);
                ApiError::Upstream(other.to_string())
            }
        })?;

    Ok(Json(songs))
}

/// Build song routes
pub fn song_routes() -> Router<AppState> {
    Router::new().route("/api/songs", get(get_top_songs))
}
