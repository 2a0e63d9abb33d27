use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use swiftair_core::model::booking::{Booking, CreateBookingRequest};
use swiftair_core::model::flight::Flight;

use crate::{error::ApiError, extractor::CurrentUser, state::AppState};

/// Booking plus its flight, matching what clients render in one request.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: Booking,
    pub flight: Option<Flight>,
}

pub async fn with_flight(state: &AppState, booking: Booking) -> Result<BookingResponse, ApiError> {
    let flight = state
        .store
        .find_flight(booking.flight_id)
        .await
        .map_err(ApiError::from)?;
    Ok(BookingResponse { booking, flight })
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_bookings).post(create_booking))
        .route("/{booking_id}", get(get_booking).delete(cancel_booking))
}

async fn list_bookings(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<Vec<BookingResponse>>, ApiError> {
    let bookings = state.ledger.list_for(&caller.user).await?;
    let mut responses = Vec::with_capacity(bookings.len());
    for booking in bookings {
        responses.push(with_flight(&state, booking).await?);
    }
    Ok(Json(responses))
}

async fn create_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (booking, new_balance) = state.ledger.create(&caller.user, req).await?;
    let response = with_flight(&state, booking).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Booking confirmed",
            "booking": response,
            "new_balance": new_balance,
        })),
    ))
}

async fn get_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, ApiError> {
    let booking = state.ledger.get(&caller.user, booking_id).await?;
    Ok(Json(with_flight(&state, booking).await?))
}

/// Owner-initiated cancellation: same reversal as the admin path.
async fn cancel_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    state.ledger.cancel(&caller.user, booking_id).await?;
    Ok(Json(json!({ "message": "Booking cancelled" })))
}
