//! Row-level access. Every function takes a plain `&Connection` so callers can run
//! it either through [`Database::with_conn`] or inside [`Database::with_tx`].

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

use carpool_types::models::{Notification, RequestStatus, Ride, RideRequest, RideStatus};

use crate::Database;
use crate::models::{
    NotificationRow, RideRequestRow, RideRow, SharedRidesRow, UserRow, to_db_time,
};

impl Database {
    // -- Users --

    pub fn create_user(&self, id: Uuid, name: &str, email: &str, password_hash: &str) -> Result<()> {
        self.with_conn(|conn| insert_user(conn, &id.to_string(), name, email, password_hash))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| user_by_email(conn, email))
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| user_by_id(conn, &id.to_string()))
    }
}

/// True when `err` is SQLite refusing a write because of a UNIQUE constraint or
/// unique index.
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<rusqlite::Error>(),
        Some(rusqlite::Error::SqliteFailure(e, _))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// -- Users --

const USER_COLUMNS: &str = "id, name, email, password, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: row.get(4)?,
    })
}

pub fn insert_user(
    conn: &Connection,
    id: &str,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, name, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, email, password_hash, to_db_time(Utc::now())],
    )?;
    Ok(())
}

pub fn user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
            [email],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn user_by_id(conn: &Connection, id: &str) -> Result<Option<UserRow>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(row)
}

// -- Rides --

const RIDE_COLUMNS: &str = "r.id, r.driver_id, r.origin, r.destination, r.departure_time, \
                            r.seats_total, r.seats_remaining, r.status, r.created_at";

fn ride_from_row(row: &Row<'_>) -> rusqlite::Result<RideRow> {
    Ok(RideRow {
        id: row.get(0)?,
        driver_id: row.get(1)?,
        origin: row.get(2)?,
        destination: row.get(3)?,
        departure_time: row.get(4)?,
        seats_total: row.get(5)?,
        seats_remaining: row.get(6)?,
        status: row.get(7)?,
        created_at: row.get(8)?,
    })
}

pub fn insert_ride(conn: &Connection, ride: &Ride) -> Result<()> {
    conn.execute(
        "INSERT INTO rides (id, driver_id, origin, destination, departure_time,
                            seats_total, seats_remaining, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            ride.id.to_string(),
            ride.driver_id.to_string(),
            ride.origin,
            ride.destination,
            to_db_time(ride.departure_time),
            ride.seats_total,
            ride.seats_remaining,
            ride.status.as_str(),
            to_db_time(ride.created_at),
        ],
    )?;
    Ok(())
}

pub fn ride_by_id(conn: &Connection, id: Uuid) -> Result<Option<Ride>> {
    let row = conn
        .query_row(
            &format!("SELECT {RIDE_COLUMNS} FROM rides r WHERE r.id = ?1"),
            [id.to_string()],
            ride_from_row,
        )
        .optional()?;
    row.map(RideRow::into_ride).transpose()
}

/// All rides, soonest departure first.
pub fn list_rides(conn: &Connection) -> Result<Vec<Ride>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RIDE_COLUMNS} FROM rides r ORDER BY r.departure_time ASC, r.rowid ASC"
    ))?;
    let rows = stmt
        .query_map([], ride_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(RideRow::into_ride).collect()
}

/// Rides the user drives or holds an accepted seat on, soonest departure first.
pub fn rides_for_user(conn: &Connection, user_id: Uuid) -> Result<Vec<Ride>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RIDE_COLUMNS} FROM rides r
         WHERE r.driver_id = ?1
            OR EXISTS (SELECT 1 FROM ride_requests q
                       WHERE q.ride_id = r.id AND q.passenger_id = ?1 AND q.status = 'accepted')
         ORDER BY r.departure_time ASC, r.rowid ASC"
    ))?;
    let rows = stmt
        .query_map([user_id.to_string()], ride_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(RideRow::into_ride).collect()
}

/// Claims one seat. Returns false, changing nothing, when the ride is full.
pub fn take_seat(conn: &Connection, ride_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE rides SET seats_remaining = seats_remaining - 1
         WHERE id = ?1 AND seats_remaining > 0",
        [ride_id.to_string()],
    )?;
    Ok(changed == 1)
}

/// Gives one seat back. Returns false when every seat is already free.
pub fn release_seat(conn: &Connection, ride_id: Uuid) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE rides SET seats_remaining = seats_remaining + 1
         WHERE id = ?1 AND seats_remaining < seats_total",
        [ride_id.to_string()],
    )?;
    Ok(changed == 1)
}

/// Compare-and-set on the stored ride status.
pub fn transition_ride(conn: &Connection, ride_id: Uuid, from: RideStatus, to: RideStatus) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE rides SET status = ?3 WHERE id = ?1 AND status = ?2",
        params![ride_id.to_string(), from.as_str(), to.as_str()],
    )?;
    Ok(changed == 1)
}

// -- Ride requests --

const REQUEST_COLUMNS: &str = "q.id, q.ride_id, q.passenger_id, q.status, q.created_at, q.resolved_at";

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<RideRequestRow> {
    Ok(RideRequestRow {
        id: row.get(0)?,
        ride_id: row.get(1)?,
        passenger_id: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        resolved_at: row.get(5)?,
    })
}

pub fn insert_request(conn: &Connection, request: &RideRequest) -> Result<()> {
    conn.execute(
        "INSERT INTO ride_requests (id, ride_id, passenger_id, status, created_at, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            request.id.to_string(),
            request.ride_id.to_string(),
            request.passenger_id.to_string(),
            request.status.as_str(),
            to_db_time(request.created_at),
            request.resolved_at.map(to_db_time),
        ],
    )?;
    Ok(())
}

/// Looks a request up under the ride it claims to belong to.
pub fn request_by_id(conn: &Connection, ride_id: Uuid, request_id: Uuid) -> Result<Option<RideRequest>> {
    let row = conn
        .query_row(
            &format!("SELECT {REQUEST_COLUMNS} FROM ride_requests q WHERE q.id = ?1 AND q.ride_id = ?2"),
            [request_id.to_string(), ride_id.to_string()],
            request_from_row,
        )
        .optional()?;
    row.map(RideRequestRow::into_request).transpose()
}

/// The pending or accepted request of this passenger on this ride, if any.
pub fn outstanding_request(conn: &Connection, ride_id: Uuid, passenger_id: Uuid) -> Result<Option<RideRequest>> {
    let row = conn
        .query_row(
            &format!(
                "SELECT {REQUEST_COLUMNS} FROM ride_requests q
                 WHERE q.ride_id = ?1 AND q.passenger_id = ?2 AND q.status IN ('pending', 'accepted')"
            ),
            [ride_id.to_string(), passenger_id.to_string()],
            request_from_row,
        )
        .optional()?;
    row.map(RideRequestRow::into_request).transpose()
}

/// Every request on the ride, oldest first.
pub fn requests_for_ride(conn: &Connection, ride_id: Uuid) -> Result<Vec<RideRequest>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REQUEST_COLUMNS} FROM ride_requests q
         WHERE q.ride_id = ?1
         ORDER BY q.created_at ASC, q.rowid ASC"
    ))?;
    let rows = stmt
        .query_map([ride_id.to_string()], request_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(RideRequestRow::into_request).collect()
}

/// Compare-and-set on the request status. Only the caller that wins the swap gets
/// `true`, which is what keeps resolution side effects to exactly once.
pub fn transition_request(
    conn: &Connection,
    request_id: Uuid,
    from: RequestStatus,
    to: RequestStatus,
    at: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE ride_requests SET status = ?3, resolved_at = ?4 WHERE id = ?1 AND status = ?2",
        params![request_id.to_string(), from.as_str(), to.as_str(), to_db_time(at)],
    )?;
    Ok(changed == 1)
}

/// Users holding an accepted seat on the ride, in the order they asked.
pub fn accepted_passengers(conn: &Connection, ride_id: Uuid) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email, u.password, u.created_at
         FROM ride_requests q
         JOIN users u ON u.id = q.passenger_id
         WHERE q.ride_id = ?1 AND q.status = 'accepted'
         ORDER BY q.created_at ASC, q.rowid ASC",
    )?;
    let rows = stmt
        .query_map([ride_id.to_string()], user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// -- Notifications --

pub fn insert_notification(conn: &Connection, notification: &Notification) -> Result<()> {
    let payload = serde_json::to_string(&notification.payload)?;
    conn.execute(
        "INSERT INTO notifications (id, user_id, message, kind, payload, is_read, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            notification.id.to_string(),
            notification.user_id.to_string(),
            notification.message,
            notification.payload.kind(),
            payload,
            notification.read,
            to_db_time(notification.created_at),
        ],
    )?;
    Ok(())
}

/// Newest first. Rows written in the same instant come back in reverse insert order.
pub fn notifications_for_user(conn: &Connection, user_id: Uuid, unread_only: bool) -> Result<Vec<Notification>> {
    let sql = if unread_only {
        "SELECT id, user_id, message, payload, is_read, created_at FROM notifications
         WHERE user_id = ?1 AND is_read = 0
         ORDER BY created_at DESC, rowid DESC"
    } else {
        "SELECT id, user_id, message, payload, is_read, created_at FROM notifications
         WHERE user_id = ?1
         ORDER BY created_at DESC, rowid DESC"
    };

    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map([user_id.to_string()], |row| {
            Ok(NotificationRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                message: row.get(2)?,
                payload: row.get(3)?,
                is_read: row.get(4)?,
                created_at: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    rows.into_iter().map(NotificationRow::into_notification).collect()
}

/// Returns how many notifications flipped from unread to read.
pub fn mark_all_read(conn: &Connection, user_id: Uuid) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0",
        [user_id.to_string()],
    )?;
    Ok(changed)
}

// -- Leaderboard --

/// Distinct rides each user shared, as driver with at least one accepted passenger
/// or as an accepted passenger. Highest first, ties by name.
pub fn shared_rides(conn: &Connection, limit: u32) -> Result<Vec<SharedRidesRow>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, COUNT(DISTINCT s.ride_id) AS shared
         FROM (
             SELECT r.driver_id AS user_id, r.id AS ride_id
             FROM rides r
             WHERE EXISTS (SELECT 1 FROM ride_requests q
                           WHERE q.ride_id = r.id AND q.status = 'accepted')
             UNION
             SELECT q.passenger_id, q.ride_id
             FROM ride_requests q
             WHERE q.status = 'accepted'
         ) s
         JOIN users u ON u.id = s.user_id
         GROUP BY u.id, u.name
         ORDER BY shared DESC, u.name ASC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([limit], |row| {
            Ok(SharedRidesRow {
                user_id: row.get(0)?,
                name: row.get(1)?,
                rides_shared: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
