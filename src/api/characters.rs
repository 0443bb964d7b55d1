//! Character endpoints.
//!
//! Every handler reads from the generation published at the time of the
//! request. Before the first generation exists they answer 503.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

use super::{ApiError, ApiResponse, AppState, BatchResponse, SearchResponse};
use crate::cache::CacheStats;
use crate::domain::{CharacterId, Rarity};
use crate::models::CharacterRecord;

pub const MAX_BATCH: usize = 10;
pub const DEFAULT_SEARCH_LIMIT: usize = 10;
pub const MAX_SEARCH_LIMIT: usize = 50;

#[derive(Debug, Deserialize)]
pub struct RandomQuery {
    pub rarity: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchQuery {
    pub count: Option<usize>,
    pub rarities: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub name: Option<String>,
    pub limit: Option<usize>,
}

fn parse_rarity(value: Option<&str>) -> Result<Rarity, ApiError> {
    match value.map(str::trim) {
        None | Some("") => Ok(Rarity::Common),
        Some(v) => v.parse().map_err(|e| ApiError::validation(format!("{e}"))),
    }
}

/// Comma separated tiers; blank entries are ignored.
fn parse_rarity_list(value: Option<&str>) -> Result<Vec<Rarity>, ApiError> {
    let tiers = value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<Rarity>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::validation(format!("{e}")))?;

    if tiers.is_empty() {
        Ok(vec![Rarity::Common])
    } else {
        Ok(tiers)
    }
}

/// `GET /api/characters/random?rarity=<tier>`
pub async fn random_character(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RandomQuery>,
) -> Result<Json<ApiResponse<Arc<CharacterRecord>>>, ApiError> {
    let tier = parse_rarity(query.rarity.as_deref())?;

    state
        .cache()
        .get_random_character(tier)?
        .map(|c| Json(ApiResponse::success(c)))
        .ok_or_else(|| ApiError::NotFound("No characters available".to_string()))
}

/// `GET /api/characters/batch?count=<n>&rarities=<csv>`
///
/// Slot `i` draws from `rarities[i]`, repeating the last tier once the
/// list runs out. Slots that yield nothing are left out.
pub async fn batch_characters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<BatchQuery>,
) -> Result<Json<ApiResponse<BatchResponse>>, ApiError> {
    let count = query.count.unwrap_or(1).clamp(1, MAX_BATCH);
    let tiers = parse_rarity_list(query.rarities.as_deref())?;

    let generation = state.cache().snapshot()?;
    let mut rng = rand::rng();

    let characters: Vec<_> = (0..count)
        .filter_map(|slot| {
            let tier = tiers.get(slot).or_else(|| tiers.last()).copied()?;
            generation.random(tier, &mut rng)
        })
        .collect();

    Ok(Json(ApiResponse::success(BatchResponse {
        count: characters.len(),
        characters,
    })))
}

/// `GET /api/characters/search?name=<q>&limit=<n>`
pub async fn search_characters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<ApiResponse<SearchResponse>>, ApiError> {
    let name = query
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::validation("Query parameter 'name' is required"))?;

    let limit = query
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let results = state.cache().search_characters(name, limit)?;

    Ok(Json(ApiResponse::success(SearchResponse {
        count: results.len(),
        results,
    })))
}

/// `GET /api/characters/stats`
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CacheStats>>, ApiError> {
    Ok(Json(ApiResponse::success(state.cache().get_stats()?)))
}

/// `GET /api/characters/refresh`
///
/// Rebuilds the cache before responding.
pub async fn refresh_cache(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<CacheStats>>, ApiError> {
    info!("Cache refresh requested via API");
    let stats = state.cache().refresh_cache().await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// `GET /api/characters/{id}`
pub async fn get_character(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Arc<CharacterRecord>>>, ApiError> {
    let id: CharacterId = id
        .parse()
        .map_err(|_| ApiError::validation(format!("Invalid character id '{id}'")))?;

    state
        .cache()
        .get_character_by_id(id)?
        .map(|c| Json(ApiResponse::success(c)))
        .ok_or_else(|| ApiError::not_found("Character", id))
}
