//! Postgres repositories.
//!
//! Every guarded mutation is a single conditional `UPDATE ... WHERE`
//! statement, so the precondition check and the write happen atomically
//! inside the database rather than as a read-then-write in application
//! code.

use std::time::Duration;

use agrirent_booking::models::{Booking, BookingStatus, DamageReport, PaymentStatus, RentalPhoto};
use agrirent_booking::repository::{
    BookingRepository, PhotoAppendOutcome, Transition, TransitionOutcome,
};
use agrirent_booking::review::{Review, ReviewRepository};
use agrirent_catalog::{Equipment, EquipmentRepository, ReserveOutcome};
use agrirent_core::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgClient {
    pub pool: PgPool,
}

impl PgClient {
    pub async fn new(connection_string: &str) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(connection_string)
            .await?;

        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        info!("Running database migrations...");
        sqlx::migrate!("../migrations").run(&self.pool).await?;
        info!("Migrations completed successfully.");
        Ok(())
    }
}

fn store_err(err: sqlx::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

fn parse_status(s: &str) -> Result<BookingStatus, StoreError> {
    match s {
        "CREATED" => Ok(BookingStatus::Created),
        "IN_PROGRESS" => Ok(BookingStatus::InProgress),
        "COMPLETED" => Ok(BookingStatus::Completed),
        "CANCELLED_BY_RENTER" => Ok(BookingStatus::CancelledByRenter),
        "CANCELLED_BY_LENDER" => Ok(BookingStatus::CancelledByLender),
        other => Err(StoreError::Serialization(format!(
            "unknown booking status '{}'",
            other
        ))),
    }
}

fn parse_payment_status(s: &str) -> Result<PaymentStatus, StoreError> {
    match s {
        "PENDING" => Ok(PaymentStatus::Pending),
        "PAID" => Ok(PaymentStatus::Paid),
        "REFUNDED" => Ok(PaymentStatus::Refunded),
        other => Err(StoreError::Serialization(format!(
            "unknown payment status '{}'",
            other
        ))),
    }
}

fn payment_status_str(s: PaymentStatus) -> &'static str {
    match s {
        PaymentStatus::Pending => "PENDING",
        PaymentStatus::Paid => "PAID",
        PaymentStatus::Refunded => "REFUNDED",
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    equipment_id: Uuid,
    renter_id: Uuid,
    owner_id: Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
    display_start: NaiveTime,
    display_end: NaiveTime,
    hours: i64,
    price_per_hour: i64,
    subtotal: i64,
    platform_fee: i64,
    gst: i64,
    total_amount: i64,
    handover_token: String,
    handover_verified_at: Option<DateTime<Utc>>,
    status: String,
    payment_status: String,
    damage_report: Option<serde_json::Value>,
    rental_photos: serde_json::Value,
    return_confirmed_by_renter: bool,
    return_confirmed_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> Result<Booking, StoreError> {
        let damage_report: Option<DamageReport> = match self.damage_report {
            Some(value) => Some(
                serde_json::from_value(value)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?,
            ),
            None => None,
        };
        let rental_photos: Vec<RentalPhoto> = serde_json::from_value(self.rental_photos)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Booking {
            id: self.id,
            equipment_id: self.equipment_id,
            renter_id: self.renter_id,
            owner_id: self.owner_id,
            start: self.start_at,
            end: self.end_at,
            display_start: self.display_start,
            display_end: self.display_end,
            hours: self.hours,
            price_per_hour: self.price_per_hour,
            subtotal: self.subtotal,
            platform_fee: self.platform_fee,
            gst: self.gst,
            total_amount: self.total_amount,
            handover_token: self.handover_token,
            handover_verified_at: self.handover_verified_at,
            status: parse_status(&self.status)?,
            payment_status: parse_payment_status(&self.payment_status)?,
            damage_report,
            rental_photos,
            return_confirmed_by_renter: self.return_confirmed_by_renter,
            return_confirmed_at: self.return_confirmed_at,
            cancellation_reason: self.cancellation_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, equipment_id, renter_id, owner_id, start_at, end_at, \
     display_start, display_end, hours, price_per_hour, subtotal, platform_fee, gst, \
     total_amount, handover_token, handover_verified_at, status, payment_status, \
     damage_report, rental_photos, return_confirmed_by_renter, return_confirmed_at, \
     cancellation_reason, created_at, updated_at";

pub struct PgBookings {
    pool: PgPool,
}

impl PgBookings {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_status(&self, id: Uuid) -> Result<Option<BookingStatus>, StoreError> {
        let row = sqlx::query("SELECT status FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        match row {
            Some(row) => {
                let status: String = row.get("status");
                Ok(Some(parse_status(&status)?))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl BookingRepository for PgBookings {
    async fn insert(&self, booking: &Booking) -> Result<(), StoreError> {
        let photos = serde_json::to_value(&booking.rental_photos)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        sqlx::query(
            "INSERT INTO bookings (id, equipment_id, renter_id, owner_id, start_at, end_at, \
             display_start, display_end, hours, price_per_hour, subtotal, platform_fee, gst, \
             total_amount, handover_token, status, payment_status, rental_photos, \
             return_confirmed_by_renter, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18, $19, $20, $21)",
        )
        .bind(booking.id)
        .bind(booking.equipment_id)
        .bind(booking.renter_id)
        .bind(booking.owner_id)
        .bind(booking.start)
        .bind(booking.end)
        .bind(booking.display_start)
        .bind(booking.display_end)
        .bind(booking.hours)
        .bind(booking.price_per_hour)
        .bind(booking.subtotal)
        .bind(booking.platform_fee)
        .bind(booking.gst)
        .bind(booking.total_amount)
        .bind(&booking.handover_token)
        .bind(booking.status.as_str())
        .bind(payment_status_str(booking.payment_status))
        .bind(photos)
        .bind(booking.return_confirmed_by_renter)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(
                db.constraint().unwrap_or("bookings").to_string(),
            ),
            _ => store_err(err),
        })?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row.map(BookingRow::into_booking).transpose()
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE renter_id = $1 OR owner_id = $1 \
             ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn active_token_exists(&self, token: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE handover_token = $1 \
             AND status IN ('CREATED', 'IN_PROGRESS')) AS present",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.get::<bool, _>("present"))
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: BookingStatus,
        change: Transition,
    ) -> Result<TransitionOutcome, StoreError> {
        let row = match change {
            Transition::Activate { at } => {
                sqlx::query_as::<_, BookingRow>(&format!(
                    "UPDATE bookings SET status = 'IN_PROGRESS', handover_verified_at = $3, \
                     updated_at = $3 WHERE id = $1 AND status = $2 RETURNING {}",
                    BOOKING_COLUMNS
                ))
                .bind(id)
                .bind(expected.as_str())
                .bind(at)
                .fetch_optional(&self.pool)
                .await
            }
            Transition::Complete { at } => {
                sqlx::query_as::<_, BookingRow>(&format!(
                    "UPDATE bookings SET status = 'COMPLETED', payment_status = 'PAID', \
                     updated_at = $3 WHERE id = $1 AND status = $2 RETURNING {}",
                    BOOKING_COLUMNS
                ))
                .bind(id)
                .bind(expected.as_str())
                .bind(at)
                .fetch_optional(&self.pool)
                .await
            }
            Transition::Cancel { to, reason, at } => {
                sqlx::query_as::<_, BookingRow>(&format!(
                    "UPDATE bookings SET status = $3, payment_status = 'REFUNDED', \
                     cancellation_reason = $4, updated_at = $5 \
                     WHERE id = $1 AND status = $2 RETURNING {}",
                    BOOKING_COLUMNS
                ))
                .bind(id)
                .bind(expected.as_str())
                .bind(to.as_str())
                .bind(reason)
                .bind(at)
                .fetch_optional(&self.pool)
                .await
            }
        }
        .map_err(store_err)?;

        match row {
            Some(row) => Ok(TransitionOutcome::Applied(row.into_booking()?)),
            None => match self.current_status(id).await? {
                Some(current) => Ok(TransitionOutcome::Conflict { current }),
                None => Ok(TransitionOutcome::NotFound),
            },
        }
    }

    async fn set_return_confirmed(&self, id: Uuid, at: DateTime<Utc>) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "UPDATE bookings SET return_confirmed_by_renter = TRUE, return_confirmed_at = $2, \
             updated_at = $2 WHERE id = $1 AND status = 'IN_PROGRESS' \
             AND return_confirmed_by_renter = FALSE",
        )
        .bind(id)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_damage_report(&self, id: Uuid, report: DamageReport) -> Result<bool, StoreError> {
        let value =
            serde_json::to_value(&report).map_err(|e| StoreError::Serialization(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE bookings SET damage_report = $2, updated_at = $3 \
             WHERE id = $1 AND status = 'IN_PROGRESS' AND damage_report IS NULL",
        )
        .bind(id)
        .bind(value)
        .bind(report.filed_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn append_rental_photos(
        &self,
        id: Uuid,
        photos: Vec<RentalPhoto>,
        max_total: usize,
    ) -> Result<PhotoAppendOutcome, StoreError> {
        let batch_len = photos.len() as i64;
        let value =
            serde_json::to_value(&photos).map_err(|e| StoreError::Serialization(e.to_string()))?;

        // The cap check rides inside the conditional update, so two
        // concurrent batches cannot jointly overshoot it.
        let result = sqlx::query(
            "UPDATE bookings SET rental_photos = rental_photos || $2::jsonb, updated_at = now() \
             WHERE id = $1 AND status = 'IN_PROGRESS' \
             AND jsonb_array_length(rental_photos) + $3 <= $4",
        )
        .bind(id)
        .bind(value)
        .bind(batch_len)
        .bind(max_total as i64)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        if result.rows_affected() == 1 {
            return Ok(PhotoAppendOutcome::Appended);
        }

        let row = sqlx::query(
            "SELECT status, jsonb_array_length(rental_photos) AS photo_count \
             FROM bookings WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        match row {
            None => Ok(PhotoAppendOutcome::NotFound),
            Some(row) => {
                let status: String = row.get("status");
                if parse_status(&status)? != BookingStatus::InProgress {
                    Ok(PhotoAppendOutcome::NotInProgress)
                } else {
                    let existing: i32 = row.get("photo_count");
                    Ok(PhotoAppendOutcome::CapExceeded {
                        existing: existing as usize,
                    })
                }
            }
        }
    }
}

#[derive(sqlx::FromRow)]
struct EquipmentRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    price_per_hour: i64,
    is_available: bool,
    rating: f64,
    review_count: i32,
    created_at: DateTime<Utc>,
}

impl From<EquipmentRow> for Equipment {
    fn from(row: EquipmentRow) -> Self {
        Equipment {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            price_per_hour: row.price_per_hour,
            is_available: row.is_available,
            rating: row.rating,
            review_count: row.review_count as u32,
            created_at: row.created_at,
        }
    }
}

pub struct PgEquipment {
    pool: PgPool,
}

impl PgEquipment {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EquipmentRepository for PgEquipment {
    async fn insert(&self, equipment: &Equipment) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO equipment (id, owner_id, name, price_per_hour, is_available, rating, \
             review_count, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(equipment.id)
        .bind(equipment.owner_id)
        .bind(&equipment.name)
        .bind(equipment.price_per_hour)
        .bind(equipment.is_available)
        .bind(equipment.rating)
        .bind(equipment.review_count as i32)
        .bind(equipment.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Equipment>, StoreError> {
        let row = sqlx::query_as::<_, EquipmentRow>(
            "SELECT id, owner_id, name, price_per_hour, is_available, rating, review_count, \
             created_at FROM equipment WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.map(Equipment::from))
    }

    async fn list_available(&self) -> Result<Vec<Equipment>, StoreError> {
        let rows = sqlx::query_as::<_, EquipmentRow>(
            "SELECT id, owner_id, name, price_per_hour, is_available, rating, review_count, \
             created_at FROM equipment WHERE is_available = TRUE ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows.into_iter().map(Equipment::from).collect())
    }

    async fn reserve(&self, id: Uuid) -> Result<ReserveOutcome, StoreError> {
        // Single conditional update: the availability check and the flip
        // are one statement, closing the read-then-write race.
        let result =
            sqlx::query("UPDATE equipment SET is_available = FALSE WHERE id = $1 AND is_available = TRUE")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(store_err)?;

        if result.rows_affected() == 1 {
            return Ok(ReserveOutcome::Reserved);
        }

        let row = sqlx::query("SELECT 1 AS one FROM equipment WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(if row.is_some() {
            ReserveOutcome::Unavailable
        } else {
            ReserveOutcome::NotFound
        })
    }

    async fn release(&self, id: Uuid) -> Result<(), StoreError> {
        sqlx::query("UPDATE equipment SET is_available = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }

    async fn update_rating(
        &self,
        id: Uuid,
        rating: f64,
        review_count: u32,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE equipment SET rating = $2, review_count = $3 WHERE id = $1")
            .bind(id)
            .bind(rating)
            .bind(review_count as i32)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}

pub struct PgReviews {
    pool: PgPool,
}

impl PgReviews {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReviewRepository for PgReviews {
    async fn insert(&self, review: &Review) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reviews (id, booking_id, equipment_id, renter_id, rating, comment, \
             created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(review.id)
        .bind(review.booking_id)
        .bind(review.equipment_id)
        .bind(review.renter_id)
        .bind(review.rating as i16)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn exists_for_booking(&self, booking_id: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM reviews WHERE booking_id = $1) AS present",
        )
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row.get::<bool, _>("present"))
    }

    async fn ratings_for_equipment(&self, equipment_id: Uuid) -> Result<Vec<u8>, StoreError> {
        let rows = sqlx::query("SELECT rating FROM reviews WHERE equipment_id = $1")
            .bind(equipment_id)
            .fetch_all(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<i16, _>("rating") as u8)
            .collect())
    }
}
