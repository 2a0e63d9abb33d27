use chrono::{Duration, NaiveTime, Utc};
use tracing::info;
use uuid::Uuid;

use swiftair_core::model::flight::Flight;
use swiftair_core::model::user::{Role, User};
use swiftair_core::repository::{BookingStore, StoreError};

use crate::app_config::SeedConfig;

// (source, destination, economy price, business price)
const ROUTES: [(&str, &str, i64, i64); 10] = [
    ("Mumbai", "Delhi", 4_500, 12_000),
    ("Delhi", "Bangalore", 5_500, 14_000),
    ("Mumbai", "London", 45_000, 95_000),
    ("Delhi", "Dubai", 22_000, 55_000),
    ("Bangalore", "Singapore", 18_000, 42_000),
    ("Chennai", "Mumbai", 4_000, 11_000),
    ("Kolkata", "Delhi", 5_000, 13_000),
    ("Hyderabad", "Dubai", 20_000, 48_000),
    ("Mumbai", "New York", 65_000, 135_000),
    ("Delhi", "London", 42_000, 90_000),
];

const SCHEDULE_DAYS: i64 = 30;

/// Idempotent demo seeding: a default admin plus one flight per reference
/// route per day for the next 30 days, so a search always finds results.
/// Skipped entirely once the admin account exists.
pub async fn seed_database(store: &dyn BookingStore, cfg: &SeedConfig) -> Result<(), StoreError> {
    if store
        .find_user_by_username(&cfg.admin_username)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let password_hash = bcrypt::hash(&cfg.admin_password, bcrypt::DEFAULT_COST)
        .map_err(|e| StoreError::Backend(e.to_string()))?;
    let admin = User {
        id: Uuid::new_v4(),
        username: cfg.admin_username.clone(),
        password_hash,
        role: Role::Admin,
        balance: 0,
        q1: None,
        q2: None,
        q3: None,
        a1_hash: None,
        a2_hash: None,
        a3_hash: None,
        created_at: Utc::now(),
    };
    store.insert_user(&admin).await?;

    let midnight = Utc::now().date_naive().and_time(NaiveTime::MIN).and_utc();

    let mut flight_num = 1;
    for (route_idx, (source, destination, economy_price, business_price)) in
        ROUTES.iter().enumerate()
    {
        for day_offset in 0..SCHEDULE_DAYS {
            let departure_time =
                midnight + Duration::days(day_offset) + Duration::hours(6 + (route_idx as i64 % 12));
            let arrival_time = departure_time + Duration::hours(2 + (route_idx as i64 % 5));
            let flight = Flight {
                id: Uuid::new_v4(),
                flight_number: format!("SA{flight_num:03}"),
                source: source.to_string(),
                destination: destination.to_string(),
                departure_time,
                arrival_time,
                economy_price: *economy_price,
                business_price: *business_price,
                economy_seats: 60,
                business_seats: 20,
                created_at: Utc::now(),
            };
            store.insert_flight(&flight).await?;
            flight_num += 1;
        }
    }

    info!(
        flights = ROUTES.len() as i64 * SCHEDULE_DAYS,
        "seeded demo data"
    );
    Ok(())
}
