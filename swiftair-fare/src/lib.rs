use serde::{Deserialize, Serialize};
use swiftair_core::model::booking::TripType;

pub const MIN_PASSENGERS: i32 = 1;
pub const MAX_PASSENGERS: i32 = 9;
pub const MAX_BAGGAGE_KG: i32 = 50;

/// Flat surcharge rates, in whole currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FareConfig {
    /// Per-passenger meal charge, applied when any meal preference is set.
    pub meal_rate: i64,
    /// Per-kilogram charge for extra baggage.
    pub baggage_rate: i64,
}

impl Default for FareConfig {
    fn default() -> Self {
        Self {
            meal_rate: 500,
            baggage_rate: 300,
        }
    }
}

/// Itemized result of a fare computation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FareQuote {
    pub base: i64,
    pub meal_charge: i64,
    pub baggage_charge: i64,
    pub total: i64,
}

/// Out-of-range passenger counts are clamped, not rejected.
pub fn clamp_passengers(n: i32) -> i32 {
    n.clamp(MIN_PASSENGERS, MAX_PASSENGERS)
}

pub fn clamp_baggage_kg(kg: i32) -> i32 {
    kg.clamp(0, MAX_BAGGAGE_KG)
}

/// Fare computation engine. Pure and deterministic: the same inputs always
/// produce the same quote.
pub struct FareEngine {
    config: FareConfig,
}

impl FareEngine {
    pub fn new(config: FareConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FareConfig {
        &self.config
    }

    /// Total charge for a booking leg:
    /// base fare per passenger, plus the meal surcharge per passenger when a
    /// preference is set, plus the baggage surcharge per kilogram, all
    /// doubled for a return trip.
    pub fn quote(
        &self,
        unit_price: i64,
        num_passengers: i32,
        has_meal: bool,
        baggage_kg: i32,
        trip_type: TripType,
    ) -> FareQuote {
        let passengers = clamp_passengers(num_passengers) as i64;
        let baggage_kg = clamp_baggage_kg(baggage_kg) as i64;

        let base = unit_price * passengers;
        let meal_charge = if has_meal {
            self.config.meal_rate * passengers
        } else {
            0
        };
        let baggage_charge = self.config.baggage_rate * baggage_kg;

        let mut total = base + meal_charge + baggage_charge;
        if trip_type == TripType::Return {
            total *= 2;
        }

        FareQuote {
            base,
            meal_charge,
            baggage_charge,
            total,
        }
    }
}

impl Default for FareEngine {
    fn default() -> Self {
        Self::new(FareConfig::default())
    }
}
