use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::flight::TravelClass;

/// Status a booking is created with. Admins may overwrite it with an
/// arbitrary string later; the ledger never interprets the value.
pub const STATUS_CONFIRMED: &str = "confirmed";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TripType {
    OneWay,
    Return,
}

impl TripType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripType::OneWay => "one_way",
            TripType::Return => "return",
        }
    }

    pub fn parse(s: &str) -> Option<TripType> {
        match s {
            "one_way" => Some(TripType::OneWay),
            "return" => Some(TripType::Return),
            _ => None,
        }
    }
}

impl Default for TripType {
    fn default() -> Self {
        TripType::OneWay
    }
}

/// A confirmed reservation, created only by the booking ledger inside the
/// same transaction that debits the balance and decrements the seat pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub trip_type: TripType,
    pub travel_class: TravelClass,
    pub num_passengers: i32,
    pub date_depart: NaiveDate,
    pub date_return: Option<NaiveDate>,
    pub seats: Vec<String>,
    pub meal_preference: Option<String>,
    pub extra_baggage_kg: i32,
    pub total_amount: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

fn default_passengers() -> i32 {
    1
}

/// Inbound booking payload. Dates arrive as `YYYY-MM-DD` strings and are
/// parsed by the ledger so a malformed value is a client error, not a crash.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBookingRequest {
    pub flight_id: Option<Uuid>,
    #[serde(default)]
    pub trip_type: TripType,
    #[serde(default)]
    pub travel_class: TravelClass,
    #[serde(default = "default_passengers")]
    pub num_passengers: i32,
    pub date_depart: Option<String>,
    pub date_return: Option<String>,
    #[serde(default)]
    pub seats: Vec<String>,
    pub meal_preference: Option<String>,
    #[serde(default)]
    pub extra_baggage_kg: i32,
}
