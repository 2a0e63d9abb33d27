use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use swiftair_core::model::booking::{Booking, CreateBookingRequest, TripType, STATUS_CONFIRMED};
use swiftair_core::model::user::{Role, User};
use swiftair_core::{BookingStore, StoreError};
use swiftair_fare::{clamp_baggage_kg, clamp_passengers, FareEngine};
use tracing::info;
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Flight not found")]
    FlightNotFound,

    #[error("Booking not found")]
    BookingNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Insufficient balance")]
    InsufficientFunds { required: i64, balance: i64 },

    #[error("Not enough seats. Only {available} available.")]
    InsufficientSeats { available: i32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The booking transaction logic. Every path that debits a balance or moves
/// a seat counter runs inside a single [`StoreTx`] unit of work, so the
/// funds/seats checks are evaluated against the same snapshot that the
/// writes commit against.
///
/// [`StoreTx`]: swiftair_core::StoreTx
pub struct BookingLedger {
    store: Arc<dyn BookingStore>,
    fares: FareEngine,
}

impl BookingLedger {
    pub fn new(store: Arc<dyn BookingStore>, fares: FareEngine) -> Self {
        Self { store, fares }
    }

    /// Create a booking for `caller`: validate the payload, price it against
    /// the locked flight row, check funds and inventory, then debit the
    /// balance, decrement the seat pool, and insert the booking as one
    /// atomic unit. Returns the booking together with the caller's new
    /// balance.
    pub async fn create(
        &self,
        caller: &User,
        req: CreateBookingRequest,
    ) -> Result<(Booking, i64), LedgerError> {
        if caller.role != Role::Customer {
            return Err(LedgerError::Forbidden(
                "Only customers can book flights".into(),
            ));
        }

        let flight_id = match req.flight_id {
            Some(id) => id,
            None => {
                return Err(LedgerError::Validation(
                    "flight_id and date_depart required".into(),
                ))
            }
        };
        let date_depart = match req.date_depart.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                .map_err(|_| LedgerError::Validation("Invalid date_depart".into()))?,
            None => {
                return Err(LedgerError::Validation(
                    "flight_id and date_depart required".into(),
                ))
            }
        };
        // Return date only applies to round trips; a malformed one is dropped
        // rather than rejected.
        let date_return = match req.trip_type {
            TripType::Return => req
                .date_return
                .as_deref()
                .and_then(|raw| NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()),
            TripType::OneWay => None,
        };

        let num_passengers = clamp_passengers(req.num_passengers);
        let extra_baggage_kg = clamp_baggage_kg(req.extra_baggage_kg);
        let meal_preference = req
            .meal_preference
            .filter(|m| !m.trim().is_empty());

        let mut tx = self.store.begin().await?;

        let flight = tx
            .flight_for_update(flight_id)
            .await?
            .ok_or(LedgerError::FlightNotFound)?;
        let user = tx
            .user_for_update(caller.id)
            .await?
            .ok_or(LedgerError::UserNotFound)?;

        let quote = self.fares.quote(
            flight.price_for(req.travel_class),
            num_passengers,
            meal_preference.is_some(),
            extra_baggage_kg,
            req.trip_type,
        );

        if user.balance < quote.total {
            return Err(LedgerError::InsufficientFunds {
                required: quote.total,
                balance: user.balance,
            });
        }
        let available = flight.seats_for(req.travel_class);
        if available < num_passengers {
            return Err(LedgerError::InsufficientSeats { available });
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            user_id: user.id,
            flight_id: flight.id,
            trip_type: req.trip_type,
            travel_class: req.travel_class,
            num_passengers,
            date_depart,
            date_return,
            seats: req.seats,
            meal_preference,
            extra_baggage_kg,
            total_amount: quote.total,
            status: STATUS_CONFIRMED.to_string(),
            created_at: Utc::now(),
        };

        tx.adjust_balance(user.id, -quote.total).await?;
        tx.adjust_seats(flight.id, req.travel_class, -num_passengers)
            .await?;
        tx.insert_booking(&booking).await?;
        tx.commit().await?;

        info!(
            booking_id = %booking.id,
            flight = %flight.flight_number,
            total = quote.total,
            "booking confirmed"
        );

        Ok((booking, user.balance - quote.total))
    }

    /// Cancel a booking: restore the passenger count to the matching class
    /// pool, credit the stored total back to the owner, and delete the
    /// record, all in one unit of work. Allowed for admins and the owner.
    pub async fn cancel(&self, caller: &User, booking_id: Uuid) -> Result<(), LedgerError> {
        let mut tx = self.store.begin().await?;

        let booking = tx
            .booking_for_update(booking_id)
            .await?
            .ok_or(LedgerError::BookingNotFound)?;
        if caller.role != Role::Admin && booking.user_id != caller.id {
            return Err(LedgerError::Forbidden("Forbidden".into()));
        }

        tx.adjust_seats(booking.flight_id, booking.travel_class, booking.num_passengers)
            .await?;
        tx.adjust_balance(booking.user_id, booking.total_amount)
            .await?;
        tx.delete_booking(booking_id).await?;
        tx.commit().await?;

        info!(booking_id = %booking_id, refund = booking.total_amount, "booking cancelled");

        Ok(())
    }

    /// Overwrite the status string. Independent of inventory and balance.
    pub async fn set_status(
        &self,
        caller: &User,
        booking_id: Uuid,
        status: &str,
    ) -> Result<Booking, LedgerError> {
        if caller.role != Role::Admin {
            return Err(LedgerError::Forbidden("Admin access required".into()));
        }

        match self.store.update_booking_status(booking_id, status).await {
            Ok(()) => {}
            Err(StoreError::NotFound) => return Err(LedgerError::BookingNotFound),
            Err(e) => return Err(e.into()),
        }
        self.store
            .find_booking(booking_id)
            .await?
            .ok_or(LedgerError::BookingNotFound)
    }

    pub async fn get(&self, caller: &User, booking_id: Uuid) -> Result<Booking, LedgerError> {
        let booking = self
            .store
            .find_booking(booking_id)
            .await?
            .ok_or(LedgerError::BookingNotFound)?;
        if caller.role != Role::Admin && booking.user_id != caller.id {
            return Err(LedgerError::Forbidden("Forbidden".into()));
        }
        Ok(booking)
    }

    /// Admins see every booking; customers only their own. Most recent first.
    pub async fn list_for(&self, caller: &User) -> Result<Vec<Booking>, LedgerError> {
        let owner = match caller.role {
            Role::Admin => None,
            Role::Customer => Some(caller.id),
        };
        Ok(self.store.list_bookings(owner).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use swiftair_core::model::flight::{Flight, TravelClass};
    use swiftair_fare::FareConfig;
    use swiftair_store::memory::MemoryStore;

    fn customer(balance: i64) -> User {
        User {
            id: Uuid::new_v4(),
            username: "asha".to_string(),
            password_hash: "x".to_string(),
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
            username: "admin".to_string(),
            ..customer(0)
        }
    }

    fn flight(economy_seats: i32, business_seats: i32) -> Flight {
        let dep = Utc::now() + Duration::days(7);
        Flight {
            id: Uuid::new_v4(),
            flight_number: "SA001".to_string(),
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

    fn request(flight_id: Uuid) -> CreateBookingRequest {
        CreateBookingRequest {
            flight_id: Some(flight_id),
            trip_type: TripType::OneWay,
            travel_class: TravelClass::Economy,
            num_passengers: 2,
            date_depart: Some("2026-09-01".to_string()),
            date_return: None,
            seats: vec!["12A".to_string(), "12B".to_string()],
            meal_preference: Some("veg".to_string()),
            extra_baggage_kg: 10,
        }
    }

    async fn ledger_with(
        users: Vec<User>,
        flights: Vec<Flight>,
    ) -> (BookingLedger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        for u in &users {
            store.insert_user(u).await.unwrap();
        }
        for f in &flights {
            store.insert_flight(f).await.unwrap();
        }
        let ledger = BookingLedger::new(store.clone(), FareEngine::new(FareConfig::default()));
        (ledger, store)
    }

    #[tokio::test]
    async fn test_create_debits_balance_and_decrements_seats() {
        let user = customer(100_000);
        let fl = flight(60, 20);
        let (ledger, store) = ledger_with(vec![user.clone()], vec![fl.clone()]).await;

        let (booking, new_balance) = ledger.create(&user, request(fl.id)).await.unwrap();

        // 5000*2 + 500*2 + 300*10
        assert_eq!(booking.total_amount, 14_000);
        assert_eq!(booking.status, STATUS_CONFIRMED);
        assert_eq!(new_balance, 86_000);

        let stored_flight = store.find_flight(fl.id).await.unwrap().unwrap();
        assert_eq!(stored_flight.economy_seats, 58);
        let stored_user = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored_user.balance, 86_000);
    }

    #[tokio::test]
    async fn test_create_rejects_non_customer() {
        let fl = flight(60, 20);
        let admin = admin();
        let (ledger, _store) = ledger_with(vec![admin.clone()], vec![fl.clone()]).await;

        let err = ledger.create(&admin, request(fl.id)).await.unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_missing_and_malformed_dates() {
        let user = customer(100_000);
        let fl = flight(60, 20);
        let (ledger, _store) = ledger_with(vec![user.clone()], vec![fl.clone()]).await;

        let mut req = request(fl.id);
        req.date_depart = None;
        assert!(matches!(
            ledger.create(&user, req).await.unwrap_err(),
            LedgerError::Validation(_)
        ));

        let mut req = request(fl.id);
        req.date_depart = Some("01/09/2026".to_string());
        assert!(matches!(
            ledger.create(&user, req).await.unwrap_err(),
            LedgerError::Validation(_)
        ));
    }

    #[tokio::test]
    async fn test_create_unknown_flight_is_not_found() {
        let user = customer(100_000);
        let (ledger, _store) = ledger_with(vec![user.clone()], vec![]).await;

        let err = ledger
            .create(&user, request(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::FlightNotFound));
    }

    #[tokio::test]
    async fn test_insufficient_funds_reports_amounts_and_changes_nothing() {
        let user = customer(1_000);
        let fl = flight(60, 20);
        let (ledger, store) = ledger_with(vec![user.clone()], vec![fl.clone()]).await;

        let err = ledger.create(&user, request(fl.id)).await.unwrap_err();
        match err {
            LedgerError::InsufficientFunds { required, balance } => {
                assert_eq!(required, 14_000);
                assert_eq!(balance, 1_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(
            store.find_flight(fl.id).await.unwrap().unwrap().economy_seats,
            60
        );
        assert_eq!(store.find_user(user.id).await.unwrap().unwrap().balance, 1_000);
    }

    #[tokio::test]
    async fn test_insufficient_seats_reports_remaining() {
        let user = customer(1_000_000);
        let fl = flight(1, 20);
        let (ledger, store) = ledger_with(vec![user.clone()], vec![fl.clone()]).await;

        let err = ledger.create(&user, request(fl.id)).await.unwrap_err();
        match err {
            LedgerError::InsufficientSeats { available } => assert_eq!(available, 1),
            other => panic!("unexpected error: {other:?}"),
        }

        // Nothing committed on the failure path.
        assert_eq!(
            store.find_user(user.id).await.unwrap().unwrap().balance,
            1_000_000
        );
    }

    #[tokio::test]
    async fn test_no_overdraft_even_at_exact_boundary() {
        let user = customer(14_000);
        let fl = flight(60, 20);
        let (ledger, store) = ledger_with(vec![user.clone()], vec![fl.clone()]).await;

        let (_, new_balance) = ledger.create(&user, request(fl.id)).await.unwrap();
        assert_eq!(new_balance, 0);
        assert_eq!(store.find_user(user.id).await.unwrap().unwrap().balance, 0);
    }

    #[tokio::test]
    async fn test_passenger_and_baggage_clamps_apply() {
        let user = customer(10_000_000);
        let fl = flight(60, 20);
        let (ledger, _store) = ledger_with(vec![user.clone()], vec![fl.clone()]).await;

        let mut req = request(fl.id);
        req.num_passengers = 42;
        req.extra_baggage_kg = 500;
        let (booking, _) = ledger.create(&user, req).await.unwrap();

        assert_eq!(booking.num_passengers, 9);
        assert_eq!(booking.extra_baggage_kg, 50);
        // 5000*9 + 500*9 + 300*50
        assert_eq!(booking.total_amount, 64_500);
    }

    #[tokio::test]
    async fn test_create_then_cancel_restores_everything() {
        let user = customer(250_000);
        let fl = flight(58, 20);
        let (ledger, store) = ledger_with(vec![user.clone()], vec![fl.clone()]).await;

        let (booking, _) = ledger.create(&user, request(fl.id)).await.unwrap();
        assert_eq!(
            store.find_flight(fl.id).await.unwrap().unwrap().economy_seats,
            56
        );

        ledger.cancel(&admin(), booking.id).await.unwrap();

        let stored_flight = store.find_flight(fl.id).await.unwrap().unwrap();
        assert_eq!(stored_flight.economy_seats, 58);
        let stored_user = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(stored_user.balance, 250_000);
        assert!(store.find_booking(booking.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_owner_may_cancel_other_customers_may_not() {
        let owner = customer(250_000);
        let stranger = customer(250_000);
        let fl = flight(60, 20);
        let (ledger, _store) =
            ledger_with(vec![owner.clone(), stranger.clone()], vec![fl.clone()]).await;

        let (booking, _) = ledger.create(&owner, request(fl.id)).await.unwrap();

        let err = ledger.cancel(&stranger, booking.id).await.unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden(_)));

        ledger.cancel(&owner, booking.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_bookings_for_last_seat_do_not_oversell() {
        let first = customer(1_000_000);
        let second = customer(1_000_000);
        let mut fl = flight(60, 1);
        fl.business_price = 12_000;
        let (ledger, store) =
            ledger_with(vec![first.clone(), second.clone()], vec![fl.clone()]).await;
        let ledger = Arc::new(ledger);

        let mut req = request(fl.id);
        req.travel_class = TravelClass::Business;
        req.num_passengers = 1;
        req.meal_preference = None;
        req.extra_baggage_kg = 0;

        let (a, b) = tokio::join!(
            ledger.create(&first, req.clone()),
            ledger.create(&second, req.clone())
        );

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1, "exactly one booking may win the last seat");

        let loser = if a.is_err() { a } else { b };
        match loser.unwrap_err() {
            LedgerError::InsufficientSeats { available } => assert_eq!(available, 0),
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(
            store.find_flight(fl.id).await.unwrap().unwrap().business_seats,
            0
        );
    }

    #[tokio::test]
    async fn test_status_update_leaves_inventory_and_balance_alone() {
        let user = customer(250_000);
        let fl = flight(60, 20);
        let (ledger, store) = ledger_with(vec![user.clone()], vec![fl.clone()]).await;

        let (booking, _) = ledger.create(&user, request(fl.id)).await.unwrap();
        let updated = ledger
            .set_status(&admin(), booking.id, "checked_in")
            .await
            .unwrap();

        assert_eq!(updated.status, "checked_in");
        assert_eq!(
            store.find_flight(fl.id).await.unwrap().unwrap().economy_seats,
            58
        );
        assert_eq!(
            store.find_user(user.id).await.unwrap().unwrap().balance,
            250_000 - 14_000
        );
    }

    #[tokio::test]
    async fn test_listing_is_scoped_and_newest_first() {
        let alice = customer(1_000_000);
        let bob = customer(1_000_000);
        let fl = flight(60, 20);
        let (ledger, _store) =
            ledger_with(vec![alice.clone(), bob.clone()], vec![fl.clone()]).await;

        let (first, _) = ledger.create(&alice, request(fl.id)).await.unwrap();
        let (second, _) = ledger.create(&alice, request(fl.id)).await.unwrap();
        ledger.create(&bob, request(fl.id)).await.unwrap();

        let mine = ledger.list_for(&alice).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, second.id);
        assert_eq!(mine[1].id, first.id);

        let all = ledger.list_for(&admin()).await.unwrap();
        assert_eq!(all.len(), 3);
    }
}
