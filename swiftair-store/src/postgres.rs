use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use swiftair_core::model::booking::Booking;
use swiftair_core::model::flight::{Flight, FlightQuery, RouteEndpoints, TravelClass};
use swiftair_core::model::user::{Role, User};
use swiftair_core::repository::{BookingStore, StoreError, StoreTx};

const USER_COLUMNS: &str = "id, username, password_hash, role, balance, \
     q1, q2, q3, a1_hash, a2_hash, a3_hash, created_at";
const FLIGHT_COLUMNS: &str = "id, flight_number, source, destination, \
     departure_time, arrival_time, economy_price, business_price, \
     economy_seats, business_seats, created_at";
const BOOKING_COLUMNS: &str = "id, user_id, flight_id, trip_type, travel_class, \
     num_passengers, date_depart, date_return, seats, meal_preference, \
     extra_baggage_kg, total_amount, status, created_at";

/// Postgres-backed store. The transactional reads lock the flight and user
/// rows with `FOR UPDATE`, so concurrent bookings against the same flight
/// serialize at the database.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_sqlx(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        match db.code().as_deref() {
            Some("23505") => {
                return StoreError::Duplicate(db.constraint().unwrap_or("unique").to_string())
            }
            // serialization_failure / deadlock_detected: retryable
            Some("40001") | Some("40P01") => return StoreError::Conflict,
            _ => {}
        }
    }
    StoreError::Backend(e.to_string())
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let role_str: String = row.try_get("role").map_err(map_sqlx)?;
    let role = Role::parse(&role_str)
        .ok_or_else(|| StoreError::Backend(format!("unknown role in users row: {role_str}")))?;
    Ok(User {
        id: row.try_get("id").map_err(map_sqlx)?,
        username: row.try_get("username").map_err(map_sqlx)?,
        password_hash: row.try_get("password_hash").map_err(map_sqlx)?,
        role,
        balance: row.try_get("balance").map_err(map_sqlx)?,
        q1: row.try_get("q1").map_err(map_sqlx)?,
        q2: row.try_get("q2").map_err(map_sqlx)?,
        q3: row.try_get("q3").map_err(map_sqlx)?,
        a1_hash: row.try_get("a1_hash").map_err(map_sqlx)?,
        a2_hash: row.try_get("a2_hash").map_err(map_sqlx)?,
        a3_hash: row.try_get("a3_hash").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
    })
}

fn flight_from_row(row: &PgRow) -> Result<Flight, StoreError> {
    Ok(Flight {
        id: row.try_get("id").map_err(map_sqlx)?,
        flight_number: row.try_get("flight_number").map_err(map_sqlx)?,
        source: row.try_get("source").map_err(map_sqlx)?,
        destination: row.try_get("destination").map_err(map_sqlx)?,
        departure_time: row.try_get("departure_time").map_err(map_sqlx)?,
        arrival_time: row.try_get("arrival_time").map_err(map_sqlx)?,
        economy_price: row.try_get("economy_price").map_err(map_sqlx)?,
        business_price: row.try_get("business_price").map_err(map_sqlx)?,
        economy_seats: row.try_get("economy_seats").map_err(map_sqlx)?,
        business_seats: row.try_get("business_seats").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
    })
}

fn booking_from_row(row: &PgRow) -> Result<Booking, StoreError> {
    let trip_str: String = row.try_get("trip_type").map_err(map_sqlx)?;
    let trip_type = swiftair_core::model::booking::TripType::parse(&trip_str)
        .ok_or_else(|| StoreError::Backend(format!("unknown trip_type: {trip_str}")))?;
    let class_str: String = row.try_get("travel_class").map_err(map_sqlx)?;
    let travel_class = TravelClass::parse(&class_str)
        .ok_or_else(|| StoreError::Backend(format!("unknown travel_class: {class_str}")))?;
    Ok(Booking {
        id: row.try_get("id").map_err(map_sqlx)?,
        user_id: row.try_get("user_id").map_err(map_sqlx)?,
        flight_id: row.try_get("flight_id").map_err(map_sqlx)?,
        trip_type,
        travel_class,
        num_passengers: row.try_get("num_passengers").map_err(map_sqlx)?,
        date_depart: row.try_get("date_depart").map_err(map_sqlx)?,
        date_return: row.try_get("date_return").map_err(map_sqlx)?,
        seats: row.try_get("seats").map_err(map_sqlx)?,
        meal_preference: row.try_get("meal_preference").map_err(map_sqlx)?,
        extra_baggage_kg: row.try_get("extra_baggage_kg").map_err(map_sqlx)?,
        total_amount: row.try_get("total_amount").map_err(map_sqlx)?,
        status: row.try_get("status").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
    })
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTx for PgTx {
    async fn user_for_update(&mut self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn flight_for_update(&mut self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM flights WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(flight_from_row).transpose()
    }

    async fn booking_for_update(&mut self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn adjust_seats(
        &mut self,
        flight_id: Uuid,
        class: TravelClass,
        delta: i32,
    ) -> Result<(), StoreError> {
        let sql = match class {
            TravelClass::Economy => {
                "UPDATE flights SET economy_seats = economy_seats + $1 WHERE id = $2"
            }
            TravelClass::Business => {
                "UPDATE flights SET business_seats = business_seats + $1 WHERE id = $2"
            }
        };
        sqlx::query(sql)
            .bind(delta)
            .bind(flight_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn adjust_balance(&mut self, user_id: Uuid, delta: i64) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET balance = balance + $1 WHERE id = $2")
            .bind(delta)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO bookings (id, user_id, flight_id, trip_type, travel_class, \
             num_passengers, date_depart, date_return, seats, meal_preference, \
             extra_baggage_kg, total_amount, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.flight_id)
        .bind(booking.trip_type.as_str())
        .bind(booking.travel_class.as_str())
        .bind(booking.num_passengers)
        .bind(booking.date_depart)
        .bind(booking.date_return)
        .bind(&booking.seats)
        .bind(&booking.meal_preference)
        .bind(booking.extra_baggage_kg)
        .bind(booking.total_amount)
        .bind(&booking.status)
        .bind(booking.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn delete_booking(&mut self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx)
    }
}

#[async_trait]
impl BookingStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await.map_err(map_sqlx)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(user_from_row).collect()
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, username, password_hash, role, balance, \
             q1, q2, q3, a1_hash, a2_hash, a3_hash, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(user.balance)
        .bind(&user.q1)
        .bind(&user.q2)
        .bind(&user.q3)
        .bind(&user.a1_hash)
        .bind(&user.a2_hash)
        .bind(&user.a3_hash)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET username = $1, password_hash = $2, balance = $3, \
             q1 = $4, q2 = $5, q3 = $6, a1_hash = $7, a2_hash = $8, a3_hash = $9 \
             WHERE id = $10",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(user.balance)
        .bind(&user.q1)
        .bind(&user.q2)
        .bind(&user.q3)
        .bind(&user.a1_hash)
        .bind(&user.a2_hash)
        .bind(&user.a3_hash)
        .bind(user.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_flight(&self, id: Uuid) -> Result<Option<Flight>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM flights WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(flight_from_row).transpose()
    }

    async fn search_flights(&self, query: &FlightQuery) -> Result<Vec<Flight>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {FLIGHT_COLUMNS} FROM flights \
             WHERE ($1::text IS NULL OR source ILIKE '%' || $1 || '%') \
             AND ($2::text IS NULL OR destination ILIKE '%' || $2 || '%') \
             AND ($3::date IS NULL OR departure_time::date = $3) \
             ORDER BY departure_time"
        ))
        .bind(&query.source)
        .bind(&query.destination)
        .bind(query.date)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(flight_from_row).collect()
    }

    async fn route_endpoints(&self) -> Result<RouteEndpoints, StoreError> {
        let sources = sqlx::query("SELECT DISTINCT source FROM flights ORDER BY source")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?
            .iter()
            .map(|row| row.try_get("source").map_err(map_sqlx))
            .collect::<Result<Vec<String>, _>>()?;
        let destinations =
            sqlx::query("SELECT DISTINCT destination FROM flights ORDER BY destination")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx)?
                .iter()
                .map(|row| row.try_get("destination").map_err(map_sqlx))
                .collect::<Result<Vec<String>, _>>()?;
        Ok(RouteEndpoints {
            sources,
            destinations,
        })
    }

    async fn insert_flight(&self, flight: &Flight) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO flights (id, flight_number, source, destination, \
             departure_time, arrival_time, economy_price, business_price, \
             economy_seats, business_seats, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(flight.id)
        .bind(&flight.flight_number)
        .bind(&flight.source)
        .bind(&flight.destination)
        .bind(flight.departure_time)
        .bind(flight.arrival_time)
        .bind(flight.economy_price)
        .bind(flight.business_price)
        .bind(flight.economy_seats)
        .bind(flight.business_seats)
        .bind(flight.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(())
    }

    async fn update_flight(&self, flight: &Flight) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE flights SET source = $1, destination = $2, departure_time = $3, \
             arrival_time = $4, economy_price = $5, business_price = $6, \
             economy_seats = $7, business_seats = $8 WHERE id = $9",
        )
        .bind(&flight.source)
        .bind(&flight.destination)
        .bind(flight.departure_time)
        .bind(flight.arrival_time)
        .bind(flight.economy_price)
        .bind(flight.business_price)
        .bind(flight.economy_seats)
        .bind(flight.business_seats)
        .bind(flight.id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete_flight(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM flights WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_booking(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx)?;
        row.as_ref().map(booking_from_row).transpose()
    }

    async fn list_bookings(&self, owner: Option<Uuid>) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings \
             WHERE ($1::uuid IS NULL OR user_id = $1) \
             ORDER BY created_at DESC"
        ))
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(booking_from_row).collect()
    }

    async fn update_booking_status(&self, id: Uuid, status: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE bookings SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
