use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use uuid::Uuid;

use swiftair_api::state::{AppState, AuthConfig};
use swiftair_api::{app, extractor::issue_token};
use swiftair_core::model::flight::Flight;
use swiftair_core::model::user::{Role, User};
use swiftair_core::BookingStore;
use swiftair_fare::FareEngine;
use swiftair_ledger::BookingLedger;
use swiftair_store::app_config::FareRules;
use swiftair_store::MemoryStore;

const TEST_SECRET: &str = "swiftair-test-jwt-secret-0123456789abcdef";

async fn test_app() -> (Router, AppState, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let store_dyn: Arc<dyn BookingStore> = store.clone();
    let ledger = Arc::new(BookingLedger::new(store_dyn.clone(), FareEngine::default()));
    let state = AppState {
        store: store_dyn,
        ledger,
        auth: AuthConfig {
            secret: TEST_SECRET.to_string(),
            expiration: 3600,
        },
        rules: FareRules {
            meal_rate: 500,
            baggage_rate: 300,
            default_customer_balance: 10_000_000,
        },
    };
    (app(state.clone()), state, store)
}

fn customer(balance: i64) -> User {
    User {
        id: Uuid::new_v4(),
        username: format!("user-{}", Uuid::new_v4().simple()),
        password_hash: "not-a-real-hash".to_string(),
        role: Role::Customer,
        balance,
        q1: None,
        q2: None,
        q3: None,
        a1_hash: None,
        a2_hash: None,
        a3_hash: None,
        created_at: Utc::now(),
    }
}

fn admin() -> User {
    User {
        role: Role::Admin,
        balance: 0,
        ..customer(0)
    }
}

fn flight(economy_seats: i32, business_seats: i32) -> Flight {
    let dep = Utc::now() + Duration::days(10);
    Flight {
        id: Uuid::new_v4(),
        flight_number: format!("SA{}", &Uuid::new_v4().simple().to_string()[..6]),
        source: "Mumbai".to_string(),
        destination: "Delhi".to_string(),
        departure_time: dep,
        arrival_time: dep + Duration::hours(2),
        economy_price: 5000,
        business_price: 12000,
        economy_seats,
        business_seats,
        created_at: Utc::now(),
    }
}

fn token_for(user: &User) -> String {
    issue_token(user, TEST_SECRET, 3600, false).expect("token")
}

fn booking_payload(flight_id: Uuid) -> Value {
    json!({
        "flight_id": flight_id,
        "trip_type": "one_way",
        "travel_class": "economy",
        "num_passengers": 2,
        "date_depart": "2026-09-01",
        "seats": ["12A", "12B"],
        "meal_preference": "veg",
        "extra_baggage_kg": 10,
    })
}

async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).expect("serialize")))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    };

    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, value)
}

#[tokio::test]
async fn test_booking_flow_end_to_end() {
    let (router, _state, store) = test_app().await;
    let user = customer(100_000);
    let fl = flight(60, 20);
    store.insert_user(&user).await.unwrap();
    store.insert_flight(&fl).await.unwrap();
    let token = token_for(&user);

    // Search finds the seeded flight
    let (status, body) = send(
        &router,
        Method::GET,
        "/api/flights/?source=mum&destination=del",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    // Book it
    let (status, body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token),
        Some(booking_payload(fl.id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Booking confirmed");
    // 5000*2 + 500*2 + 300*10 = 14000
    assert_eq!(body["booking"]["total_amount"], 14_000);
    assert_eq!(body["booking"]["status"], "confirmed");
    assert_eq!(body["new_balance"], 86_000);

    // Inventory moved in place
    let stored = store.find_flight(fl.id).await.unwrap().unwrap();
    assert_eq!(stored.economy_seats, 58);

    // The caller sees their booking, newest first, with the flight embedded
    let (status, body) = send(&router, Method::GET, "/api/bookings/", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["flight"]["flight_number"], fl.flight_number.as_str());

    // Balance is visible on /me
    let (status, body) = send(&router, Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["balance"], 86_000);
}

#[tokio::test]
async fn test_register_then_login_then_book() {
    let (router, _state, store) = test_app().await;
    let fl = flight(60, 20);
    store.insert_flight(&fl).await.unwrap();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(json!({
            "username": "asha",
            "password": "s3cret",
            "q1": 0, "q2": 1, "q3": 2,
            "a1": "Kumar", "a2": "Tuffy", "a3": "Pune",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["balance"], 10_000_000);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/auth/login",
        None,
        Some(json!({ "username": "asha", "password": "s3cret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, _body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token),
        Some(booking_payload(fl.id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_duplicate_username_is_conflict() {
    let (router, _state, _store) = test_app().await;
    let payload = json!({
        "username": "asha",
        "password": "s3cret",
        "q1": 0, "q2": 1, "q3": 2,
        "a1": "Kumar", "a2": "Tuffy", "a3": "Pune",
    });

    let (status, _) = send(
        &router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/auth/register",
        None,
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Username already exists");
}

#[tokio::test]
async fn test_insufficient_funds_reports_amounts() {
    let (router, _state, store) = test_app().await;
    let user = customer(1_000);
    let fl = flight(60, 20);
    store.insert_user(&user).await.unwrap();
    store.insert_flight(&fl).await.unwrap();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token_for(&user)),
        Some(booking_payload(fl.id)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Insufficient balance");
    assert_eq!(body["required"], 14_000);
    assert_eq!(body["balance"], 1_000);
}

#[tokio::test]
async fn test_insufficient_seats_reports_remaining() {
    let (router, _state, store) = test_app().await;
    let user = customer(10_000_000);
    let fl = flight(1, 20);
    store.insert_user(&user).await.unwrap();
    store.insert_flight(&fl).await.unwrap();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token_for(&user)),
        Some(booking_payload(fl.id)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not enough seats. Only 1 available.");
    assert_eq!(body["available"], 1);
}

#[tokio::test]
async fn test_only_customers_can_book() {
    let (router, _state, store) = test_app().await;
    let admin = admin();
    let fl = flight(60, 20);
    store.insert_user(&admin).await.unwrap();
    store.insert_flight(&fl).await.unwrap();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token_for(&admin)),
        Some(booking_payload(fl.id)),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Only customers can book flights");
}

#[tokio::test]
async fn test_admin_routes_reject_customers() {
    let (router, _state, store) = test_app().await;
    let user = customer(0);
    store.insert_user(&user).await.unwrap();

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/admin/users",
        Some(&token_for(&user)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admin access required");
}

#[tokio::test]
async fn test_unknown_flight_is_not_found() {
    let (router, _state, store) = test_app().await;
    let user = customer(100_000);
    store.insert_user(&user).await.unwrap();

    let (status, _body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token_for(&user)),
        Some(booking_payload(Uuid::new_v4())),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_and_expired_tokens_are_unauthorized() {
    let (router, _state, store) = test_app().await;
    let user = customer(100_000);
    store.insert_user(&user).await.unwrap();

    let (status, _) = send(&router, Method::GET, "/api/bookings/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Token that expired well past the decoder's leeway
    let claims = json!({
        "sub": user.id.to_string(),
        "role": "customer",
        "exp": (Utc::now() - Duration::hours(2)).timestamp(),
    });
    let expired = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap();
    let (status, _) = send(&router, Method::GET, "/api/bookings/", Some(&expired), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_cancellation_restores_seats_and_balance() {
    let (router, _state, store) = test_app().await;
    let user = customer(100_000);
    let adm = admin();
    let fl = flight(58, 20);
    store.insert_user(&user).await.unwrap();
    store.insert_user(&adm).await.unwrap();
    store.insert_flight(&fl).await.unwrap();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token_for(&user)),
        Some(booking_payload(fl.id)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();
    assert_eq!(
        store.find_flight(fl.id).await.unwrap().unwrap().economy_seats,
        56
    );

    let (status, body) = send(
        &router,
        Method::DELETE,
        &format!("/api/admin/bookings/{booking_id}"),
        Some(&token_for(&adm)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Booking cancelled");

    assert_eq!(
        store.find_flight(fl.id).await.unwrap().unwrap().economy_seats,
        58
    );
    assert_eq!(
        store.find_user(user.id).await.unwrap().unwrap().balance,
        100_000
    );
}

#[tokio::test]
async fn test_owner_cancellation_matches_admin_reversal() {
    let (router, _state, store) = test_app().await;
    let user = customer(100_000);
    let fl = flight(60, 20);
    store.insert_user(&user).await.unwrap();
    store.insert_flight(&fl).await.unwrap();
    let token = token_for(&user);

    let (_, body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token),
        Some(booking_payload(fl.id)),
    )
    .await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &router,
        Method::DELETE,
        &format!("/api/bookings/{booking_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        store.find_flight(fl.id).await.unwrap().unwrap().economy_seats,
        60
    );
    assert_eq!(
        store.find_user(user.id).await.unwrap().unwrap().balance,
        100_000
    );
}

#[tokio::test]
async fn test_customers_cannot_see_others_bookings() {
    let (router, _state, store) = test_app().await;
    let alice = customer(100_000);
    let bob = customer(100_000);
    let fl = flight(60, 20);
    store.insert_user(&alice).await.unwrap();
    store.insert_user(&bob).await.unwrap();
    store.insert_flight(&fl).await.unwrap();

    let (_, body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token_for(&alice)),
        Some(booking_payload(fl.id)),
    )
    .await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &router,
        Method::GET,
        &format!("/api/bookings/{booking_id}"),
        Some(&token_for(&bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/bookings/",
        Some(&token_for(&bob)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_admin_status_update_is_independent_of_inventory() {
    let (router, _state, store) = test_app().await;
    let user = customer(100_000);
    let adm = admin();
    let fl = flight(60, 20);
    store.insert_user(&user).await.unwrap();
    store.insert_user(&adm).await.unwrap();
    store.insert_flight(&fl).await.unwrap();

    let (_, body) = send(
        &router,
        Method::POST,
        "/api/bookings/",
        Some(&token_for(&user)),
        Some(booking_payload(fl.id)),
    )
    .await;
    let booking_id = body["booking"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        Method::PUT,
        &format!("/api/admin/bookings/{booking_id}"),
        Some(&token_for(&adm)),
        Some(json!({ "status": "checked_in" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "checked_in");

    assert_eq!(
        store.find_flight(fl.id).await.unwrap().unwrap().economy_seats,
        58
    );
}

#[tokio::test]
async fn test_admin_flight_crud_and_duplicate_number() {
    let (router, _state, store) = test_app().await;
    let adm = admin();
    store.insert_user(&adm).await.unwrap();
    let token = token_for(&adm);

    let payload = json!({
        "flight_number": "SA901",
        "source": "Mumbai",
        "destination": "Delhi",
        "departure_time": "2026-09-01T06:00:00Z",
        "arrival_time": "2026-09-01T08:00:00Z",
        "economy_price": 4500,
        "business_price": 12000,
    });
    let (status, body) = send(
        &router,
        Method::POST,
        "/api/admin/flights",
        Some(&token),
        Some(payload.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    // Capacity defaults
    assert_eq!(body["economy_seats"], 60);
    assert_eq!(body["business_seats"], 20);
    let flight_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/admin/flights",
        Some(&token),
        Some(payload),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Flight number already exists");

    let (status, body) = send(
        &router,
        Method::PUT,
        &format!("/api/admin/flights/{flight_id}"),
        Some(&token),
        Some(json!({ "economy_price": 4800 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["economy_price"], 4800);

    let (status, _) = send(
        &router,
        Method::DELETE,
        &format!("/api/admin/flights/{flight_id}"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &router,
        Method::GET,
        &format!("/api/flights/{flight_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_destinations_endpoint_lists_distinct_endpoints() {
    let (router, _state, store) = test_app().await;
    let mut first = flight(60, 20);
    first.source = "Mumbai".to_string();
    first.destination = "Delhi".to_string();
    let mut second = flight(60, 20);
    second.source = "Mumbai".to_string();
    second.destination = "Dubai".to_string();
    store.insert_flight(&first).await.unwrap();
    store.insert_flight(&second).await.unwrap();

    let (status, body) = send(&router, Method::GET, "/api/flights/destinations", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sources"], json!(["Mumbai"]));
    assert_eq!(body["destinations"], json!(["Delhi", "Dubai"]));
}
