use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use swiftair_core::model::booking::Booking;
use swiftair_core::model::flight::{Flight, FlightQuery, RouteEndpoints, TravelClass};
use swiftair_core::model::user::User;
use swiftair_core::repository::{BookingStore, StoreError, StoreTx};

#[derive(Default, Clone)]
struct MemoryState {
    users: HashMap<Uuid, User>,
    flights: HashMap<Uuid, Flight>,
    bookings: HashMap<Uuid, Booking>,
}

/// In-memory store. A single mutex over the whole state serializes
/// transactions: `begin` takes the lock and holds it until commit or drop,
/// so two concurrent bookings against the same flight can never interleave
/// their check and write steps.
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Unit of work over a working copy of the state. Mutations land in the
/// copy; commit swaps the copy in while still holding the store lock, so a
/// dropped transaction leaves the shared state untouched.
struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn user_for_update(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn flight_for_update(&mut self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        Ok(self.working.flights.get(&id).cloned())
    }

    async fn booking_for_update(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.working.bookings.get(&id).cloned())
    }

    async fn adjust_seats(
        &mut self,
        flight_id: Uuid,
        class: TravelClass,
        delta: i32,
    ) -> Result<(), StoreError> {
        if let Some(flight) = self.working.flights.get_mut(&flight_id) {
            match class {
                TravelClass::Economy => flight.economy_seats += delta,
                TravelClass::Business => flight.business_seats += delta,
            }
        }
        Ok(())
    }

    async fn adjust_balance(&mut self, user_id: Uuid, delta: i64) -> Result<(), StoreError> {
        if let Some(user) = self.working.users.get_mut(&user_id) {
            user.balance += delta;
        }
        Ok(())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        self.working.bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn delete_booking(&mut self, id: Uuid) -> Result<(), StoreError> {
        self.working.bookings.remove(&id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let mut users: Vec<User> = self.state.lock().await.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(StoreError::Duplicate("username".into()));
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.users.contains_key(&user.id) {
            return Err(StoreError::NotFound);
        }
        state.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.users.remove(&id).ok_or(StoreError::NotFound)?;
        state.bookings.retain(|_, b| b.user_id != id);
        Ok(())
    }

    async fn find_flight(&self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        Ok(self.state.lock().await.flights.get(&id).cloned())
    }

    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, StoreError> {
        let source = query.source.as_deref().map(str::to_lowercase);
        let destination = query.destination.as_deref().map(str::to_lowercase);

        let mut flights: Vec<Flight> = self
            .state
            .lock()
            .await
            .flights
            .values()
            .filter(|f| {
                source
                    .as_deref()
                    .map_or(true, |s| f.source.to_lowercase().contains(s))
                    && destination
                        .as_deref()
                        .map_or(true, |d| f.destination.to_lowercase().contains(d))
                    && query
                        .date
                        .map_or(true, |d| f.departure_time.date_naive() == d)
            })
            .cloned()
            .collect();
        flights.sort_by_key(|f| f.departure_time);
        Ok(flights)
    }

    async fn route_endpoints(&self) -> Result<RouteEndpoints, StoreError> {
        let state = self.state.lock().await;
        let sources: BTreeSet<String> = state.flights.values().map(|f| f.source.clone()).collect();
        let destinations: BTreeSet<String> = state
            .flights
            .values()
            .map(|f| f.destination.clone())
            .collect();
        Ok(RouteEndpoints {
            sources: sources.into_iter().collect(),
            destinations: destinations.into_iter().collect(),
        })
    }

    async fn insert_flight(&self, flight: &Flight) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state
            .flights
            .values()
            .any(|f| f.flight_number == flight.flight_number)
        {
            return Err(StoreError::Duplicate("flight_number".into()));
        }
        state.flights.insert(flight.id, flight.clone());
        Ok(())
    }

    async fn update_flight(&self, flight: &Flight) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.flights.contains_key(&flight.id) {
            return Err(StoreError::NotFound);
        }
        state.flights.insert(flight.id, flight.clone());
        Ok(())
    }

    async fn delete_flight(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.flights.remove(&id).ok_or(StoreError::NotFound)?;
        state.bookings.retain(|_, b| b.flight_id != id);
        Ok(())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.state.lock().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, owner: Option<Uuid>) -> Result<Vec<Booking>, StoreError> {
        let mut bookings: Vec<Booking> = self
            .state
            .lock()
            .await
            .bookings
            .values()
            .filter(|b| owner.map_or(true, |id| b.user_id == id))
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn update_booking_status(&self, id: Uuid, status: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let booking = state.bookings.get_mut(&id).ok_or(StoreError::NotFound)?;
        booking.status = status.to_string();
        Ok(())
    }
}
