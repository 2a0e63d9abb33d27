use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{
    booking::Booking,
    flight::{Flight, FlightQuery, RouteEndpoints, TravelClass},
    user::User,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    #[error("concurrent update conflict")]
    Conflict,

    #[error("unique constraint violated: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Persistence behind the booking ledger. Plain reads and the admin CRUD
/// operations run outside any transaction; everything that touches a balance
/// or a seat counter goes through a [`StoreTx`] unit of work.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Open a unit of work. Dropping the returned transaction without
    /// calling `commit` discards every change made through it.
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn list_users(&self) -> Result<Vec<User>, StoreError>;
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn update_user(&self, user: &User) -> Result<(), StoreError>;
    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    async fn find_flight(&self, id: Uuid) -> Result<Option<Flight>, StoreError>;
    /// Flights matching the filter, ascending by departure time.
    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, StoreError>;
    async fn route_endpoints(&self) -> Result<RouteEndpoints, StoreError>;
    async fn insert_flight(&self, flight: &Flight) -> Result<(), StoreError>;
    async fn update_flight(&self, flight: &Flight) -> Result<(), StoreError>;
    async fn delete_flight(&self, id: Uuid) -> Result<(), StoreError>;

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;
    /// Bookings, most recent first. `owner` scopes to a single customer.
    async fn list_bookings(&self, owner: Option<Uuid>) -> Result<Vec<Booking>, StoreError>;
    /// Status changes are independent of the financial transaction.
    async fn update_booking_status(&self, id: Uuid, status: &str) -> Result<(), StoreError>;
}

/// One atomic booking mutation. The `*_for_update` reads lock the row for
/// the lifetime of the transaction, so the checks the ledger performs on the
/// returned snapshot stay valid until commit.
#[async_trait]
pub trait StoreTx: Send {
    async fn user_for_update(&mut self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn flight_for_update(&mut self, id: Uuid) -> Result<Option<Flight>, StoreError>;
    async fn booking_for_update(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    /// Add `delta` seats to the given class pool. A missing flight row is a
    /// no-op: cancellation still succeeds after an admin deleted the flight.
    async fn adjust_seats(
        &mut self,
        flight_id: Uuid,
        class: TravelClass,
        delta: i32,
    ) -> Result<(), StoreError>;

    /// Add `delta` to the user's balance. A missing user row is a no-op.
    async fn adjust_balance(&mut self, user_id: Uuid, delta: i64) -> Result<(), StoreError>;

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError>;
    async fn delete_booking(&mut self, id: Uuid) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
