use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use swiftair_core::model::flight::Flight;
use swiftair_core::model::user::Role;
use swiftair_core::StoreError;

use crate::{
    auth::UserResponse,
    bookings::{with_flight, BookingResponse},
    error::ApiError,
    extractor::CurrentUser,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/{user_id}",
            get(get_user).put(update_user).delete(delete_user),
        )
        .route("/flights", post(create_flight))
        .route(
            "/flights/{flight_id}",
            put(update_flight).delete(delete_flight),
        )
        .route(
            "/bookings/{booking_id}",
            put(update_booking).delete(cancel_booking),
        )
}

fn require_admin(caller: &CurrentUser) -> Result<(), ApiError> {
    if !caller.is_admin() {
        return Err(ApiError::AuthorizationError(
            "Admin access required".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// User Management
// ============================================================================

async fn list_users(
    State(state): State<AppState>,
    caller: CurrentUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    require_admin(&caller)?;
    let users = state.store.list_users().await.map_err(ApiError::from)?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

async fn get_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&caller)?;
    let user = state
        .store
        .find_user(user_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFoundError("User not found".to_string()))?;
    Ok(Json(UserResponse::from(&user)))
}

#[derive(Debug, Deserialize)]
struct UpdateUserRequest {
    balance: Option<i64>,
    username: Option<String>,
}

async fn update_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    require_admin(&caller)?;
    let mut target = state
        .store
        .find_user(user_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFoundError("User not found".to_string()))?;

    // Balance only carries meaning for customers.
    if let Some(balance) = req.balance {
        if target.role == Role::Customer {
            if balance < 0 {
                return Err(ApiError::ValidationError(
                    "Balance cannot be negative".to_string(),
                ));
            }
            target.balance = balance;
        }
    }
    if let Some(username) = req.username {
        let username = username.trim().to_string();
        if !username.is_empty() {
            target.username = username;
        }
    }

    state
        .store
        .update_user(&target)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(UserResponse::from(&target)))
}

async fn delete_user(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&caller)?;
    let target = state
        .store
        .find_user(user_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFoundError("User not found".to_string()))?;
    if target.role == Role::Admin {
        return Err(ApiError::ValidationError("Cannot delete admin".to_string()));
    }

    state
        .store
        .delete_user(user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(json!({ "message": "User deleted" })))
}

// ============================================================================
// Flight Management
// ============================================================================

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ApiError::ValidationError("Invalid datetime format".to_string()))
}

fn default_economy_seats() -> i32 {
    60
}

fn default_business_seats() -> i32 {
    20
}

#[derive(Debug, Deserialize)]
struct CreateFlightRequest {
    flight_number: Option<String>,
    source: Option<String>,
    destination: Option<String>,
    departure_time: Option<String>,
    arrival_time: Option<String>,
    #[serde(default)]
    economy_price: i64,
    #[serde(default)]
    business_price: i64,
    #[serde(default = "default_economy_seats")]
    economy_seats: i32,
    #[serde(default = "default_business_seats")]
    business_seats: i32,
}

async fn create_flight(
    State(state): State<AppState>,
    caller: CurrentUser,
    Json(req): Json<CreateFlightRequest>,
) -> Result<(StatusCode, Json<Flight>), ApiError> {
    require_admin(&caller)?;

    let flight_number = req.flight_number.as_deref().unwrap_or("").trim().to_string();
    let source = req.source.as_deref().unwrap_or("").trim().to_string();
    let destination = req.destination.as_deref().unwrap_or("").trim().to_string();
    let (departure_raw, arrival_raw) = match (&req.departure_time, &req.arrival_time) {
        (Some(dep), Some(arr)) => (dep, arr),
        _ => {
            return Err(ApiError::ValidationError(
                "Missing required fields".to_string(),
            ))
        }
    };
    if flight_number.is_empty() || source.is_empty() || destination.is_empty() {
        return Err(ApiError::ValidationError(
            "Missing required fields".to_string(),
        ));
    }
    let departure_time = parse_datetime(departure_raw)?;
    let arrival_time = parse_datetime(arrival_raw)?;

    let flight = Flight {
        id: Uuid::new_v4(),
        flight_number,
        source,
        destination,
        departure_time,
        arrival_time,
        economy_price: req.economy_price,
        business_price: req.business_price,
        economy_seats: req.economy_seats,
        business_seats: req.business_seats,
        created_at: Utc::now(),
    };
    state.store.insert_flight(&flight).await.map_err(|e| match e {
        StoreError::Duplicate(_) => {
            ApiError::ConflictError("Flight number already exists".to_string())
        }
        other => other.into(),
    })?;

    Ok((StatusCode::CREATED, Json(flight)))
}

#[derive(Debug, Deserialize)]
struct UpdateFlightRequest {
    source: Option<String>,
    destination: Option<String>,
    departure_time: Option<String>,
    arrival_time: Option<String>,
    economy_price: Option<i64>,
    business_price: Option<i64>,
    economy_seats: Option<i32>,
    business_seats: Option<i32>,
}

async fn update_flight(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(flight_id): Path<Uuid>,
    Json(req): Json<UpdateFlightRequest>,
) -> Result<Json<Flight>, ApiError> {
    require_admin(&caller)?;
    let mut flight = state
        .store
        .find_flight(flight_id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFoundError("Flight not found".to_string()))?;

    if let Some(source) = req.source {
        flight.source = source;
    }
    if let Some(destination) = req.destination {
        flight.destination = destination;
    }
    if let Some(price) = req.economy_price {
        flight.economy_price = price;
    }
    if let Some(price) = req.business_price {
        flight.business_price = price;
    }
    if let Some(seats) = req.economy_seats {
        flight.economy_seats = seats;
    }
    if let Some(seats) = req.business_seats {
        flight.business_seats = seats;
    }
    if let Some(raw) = req.departure_time.as_deref() {
        flight.departure_time = parse_datetime(raw)?;
    }
    if let Some(raw) = req.arrival_time.as_deref() {
        flight.arrival_time = parse_datetime(raw)?;
    }

    state
        .store
        .update_flight(&flight)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(flight))
}

async fn delete_flight(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(flight_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&caller)?;
    match state.store.delete_flight(flight_id).await {
        Ok(()) => Ok(Json(json!({ "message": "Flight deleted" }))),
        Err(StoreError::NotFound) => {
            Err(ApiError::NotFoundError("Flight not found".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// Booking Management
// ============================================================================

#[derive(Debug, Deserialize)]
struct UpdateBookingRequest {
    status: Option<String>,
}

async fn update_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<UpdateBookingRequest>,
) -> Result<Json<BookingResponse>, ApiError> {
    require_admin(&caller)?;
    let booking = match req.status {
        Some(status) => {
            state
                .ledger
                .set_status(&caller.user, booking_id, &status)
                .await?
        }
        None => state.ledger.get(&caller.user, booking_id).await?,
    };
    Ok(Json(with_flight(&state, booking).await?))
}

/// Admin cancellation: the ledger reverses seats and balance atomically.
async fn cancel_booking(
    State(state): State<AppState>,
    caller: CurrentUser,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&caller)?;
    state.ledger.cancel(&caller.user, booking_id).await?;
    Ok(Json(json!({ "message": "Booking cancelled" })))
}
