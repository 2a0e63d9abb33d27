use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fare tier. Each class has an independent price and seat pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TravelClass {
    Economy,
    Business,
}

impl Default for TravelClass {
    fn default() -> Self {
        TravelClass::Economy
    }
}

impl TravelClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            TravelClass::Economy => "economy",
            TravelClass::Business => "business",
        }
    }

    pub fn parse(s: &str) -> Option<TravelClass> {
        match s {
            "economy" => Some(TravelClass::Economy),
            "business" => Some(TravelClass::Business),
            _ => None,
        }
    }
}

/// A flight row. The seat counters are *remaining* inventory, mutated in
/// place inside the booking transaction; they never go below zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Flight {
    pub id: Uuid,
    pub flight_number: String,
    pub source: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub arrival_time: DateTime<Utc>,
    pub economy_price: i64,
    pub business_price: i64,
    pub economy_seats: i32,
    pub business_seats: i32,
    pub created_at: DateTime<Utc>,
}

impl Flight {
    pub fn price_for(&self, class: TravelClass) -> i64 {
        match class {
            TravelClass::Economy => self.economy_price,
            TravelClass::Business => self.business_price,
        }
    }

    pub fn seats_for(&self, class: TravelClass) -> i32 {
        match class {
            TravelClass::Economy => self.economy_seats,
            TravelClass::Business => self.business_seats,
        }
    }
}

/// Search filter for the flight listing. Route fields match as
/// case-insensitive substrings; the date matches the departure calendar day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlightQuery {
    pub source: Option<String>,
    pub destination: Option<String>,
    pub date: Option<NaiveDate>,
}

/// Distinct route endpoints, used to populate the search form.
#[derive(Debug, Serialize)]
pub struct RouteEndpoints {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
}
