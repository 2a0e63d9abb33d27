use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use swiftair_core::model::flight::{Flight, FlightQuery, RouteEndpoints};

use crate::{error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_flights))
        .route("/destinations", get(destinations))
        .route("/{flight_id}", get(get_flight))
}

#[derive(Debug, Deserialize)]
struct FlightSearchParams {
    source: Option<String>,
    destination: Option<String>,
    date: Option<String>,
}

async fn list_flights(
    State(state): State<AppState>,
    Query(params): Query<FlightSearchParams>,
) -> Result<Json<Vec<Flight>>, ApiError> {
    let query = FlightQuery {
        source: params
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        destination: params
            .destination
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        // An unparseable date filter is ignored, matching every departure day.
        date: params
            .date
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()),
    };

    let flights = state
        .store
        .search_flights(&query)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(flights))
}

async fn get_flight(
    State(state): State<AppState>,
    Path(flight_id): Path<Uuid>,
) -> Result<Json<Flight>, ApiError> {
    let flight = state
        .store
        .find_flight(flight_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFoundError("Flight not found".to_string()))?;
    Ok(Json(flight))
}

async fn destinations(State(state): State<AppState>) -> Result<Json<RouteEndpoints>, ApiError> {
    let endpoints = state.store.route_endpoints().await.map_err(ApiError::from)?;
    Ok(Json(endpoints))
}
