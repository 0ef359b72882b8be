use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;
use uuid::Uuid;

use carpool_db::{Database, queries};
use carpool_types::models::{NotificationPayload, Ride, RideDetail, RideStatus};

use crate::error::{CoreError, CoreResult};
use crate::load_user;
use crate::notifications::notify;

/// Upper bound on seats a single ride may offer.
pub const MAX_SEATS: u32 = 8;

#[derive(Debug, Clone)]
pub struct NewRide {
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seats: u32,
}

impl NewRide {
    fn validate(&self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.origin.trim().is_empty() {
            return Err(CoreError::Validation("origin is required".into()));
        }
        if self.destination.trim().is_empty() {
            return Err(CoreError::Validation("destination is required".into()));
        }
        if self.seats == 0 || self.seats > MAX_SEATS {
            return Err(CoreError::Validation(format!(
                "seats must be between 1 and {}",
                MAX_SEATS
            )));
        }
        if self.departure_time <= now {
            return Err(CoreError::Validation("departure time must be in the future".into()));
        }
        Ok(())
    }
}

/// Owns ride state: upcoming -> active -> completed, with completed terminal.
/// Seat counts belong to [`crate::RequestApproval`] and are never touched here.
#[derive(Clone)]
pub struct RideLifecycle {
    db: Arc<Database>,
}

impl RideLifecycle {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn create_ride(&self, driver_id: Uuid, new: NewRide, now: DateTime<Utc>) -> CoreResult<Ride> {
        new.validate(now)?;

        let ride = Ride {
            id: Uuid::new_v4(),
            driver_id,
            origin: new.origin.trim().to_string(),
            destination: new.destination.trim().to_string(),
            departure_time: new.departure_time,
            seats_total: new.seats,
            seats_remaining: new.seats,
            status: RideStatus::Upcoming,
            created_at: now,
        };

        self.db.with_tx(|tx| {
            load_user(tx, driver_id)?;
            queries::insert_ride(tx, &ride)?;
            Ok::<_, CoreError>(())
        })?;

        info!("Ride {} created by {} ({} seats)", ride.id, driver_id, ride.seats_total);
        Ok(ride)
    }

    /// upcoming -> active. Every accepted passenger is told the ride has started.
    pub fn start_ride(&self, ride_id: Uuid, caller_id: Uuid, now: DateTime<Utc>) -> CoreResult<Ride> {
        let (ride, notified) = self.db.with_tx(|tx| {
            let ride = load_owned_ride(tx, ride_id, caller_id, "start")?;

            if ride.effective_status(now) != RideStatus::Upcoming {
                return Err(CoreError::InvalidState(format!(
                    "ride {} is {} and cannot be started",
                    ride_id,
                    ride.effective_status(now)
                )));
            }
            if !queries::transition_ride(tx, ride_id, RideStatus::Upcoming, RideStatus::Active)? {
                return Err(CoreError::InvalidState(format!("ride {} is no longer upcoming", ride_id)));
            }

            let message = format!("Your ride to {} has started.", ride.destination);
            let notified = notify_passengers(tx, &ride, &message, NotificationPayload::RideStarted { ride_id }, now)?;

            Ok((Ride { status: RideStatus::Active, ..ride }, notified))
        })?;

        info!("Ride {} started, {} passengers notified", ride_id, notified);
        Ok(ride)
    }

    /// upcoming -> completed or active -> completed. Cancelling is an early finish;
    /// accepted passengers are told about it.
    pub fn cancel_ride(&self, ride_id: Uuid, caller_id: Uuid, now: DateTime<Utc>) -> CoreResult<Ride> {
        let (ride, notified) = self.db.with_tx(|tx| {
            let ride = load_owned_ride(tx, ride_id, caller_id, "cancel")?;

            let from = ride.effective_status(now);
            if from == RideStatus::Completed {
                return Err(CoreError::InvalidState(format!(
                    "ride {} is already completed",
                    ride_id
                )));
            }
            if !queries::transition_ride(tx, ride_id, from, RideStatus::Completed)? {
                return Err(CoreError::InvalidState(format!("ride {} changed state concurrently", ride_id)));
            }

            let message = format!("Your ride to {} has been cancelled.", ride.destination);
            let notified =
                notify_passengers(tx, &ride, &message, NotificationPayload::RideCancelled { ride_id }, now)?;

            Ok((Ride { status: RideStatus::Completed, ..ride }, notified))
        })?;

        info!("Ride {} cancelled, {} passengers notified", ride_id, notified);
        Ok(ride)
    }

    /// The ride with its driver and accepted passengers.
    pub fn get_ride(&self, ride_id: Uuid, now: DateTime<Utc>) -> CoreResult<RideDetail> {
        self.db.with_conn(|conn| {
            let Some(ride) = queries::ride_by_id(conn, ride_id)? else {
                return Ok(None);
            };
            let driver = queries::user_by_id(conn, &ride.driver_id.to_string())?
                .ok_or_else(|| anyhow::anyhow!("ride {} has no driver row", ride_id))?
                .summary()?;
            let passengers = queries::accepted_passengers(conn, ride_id)?
                .iter()
                .map(|row| row.summary())
                .collect::<anyhow::Result<Vec<_>>>()?;

            Ok(Some(RideDetail {
                ride: ride.at(now),
                driver,
                passengers,
            }))
        })?
        .ok_or_else(|| CoreError::not_found("ride", ride_id))
    }

    /// All rides by departure time, optionally only those in `filter` state.
    pub fn list_rides(&self, filter: Option<RideStatus>, now: DateTime<Utc>) -> CoreResult<Vec<Ride>> {
        let rides = self.db.with_conn(queries::list_rides)?;
        Ok(rides
            .into_iter()
            .map(|ride| ride.at(now))
            .filter(|ride| filter.is_none_or(|status| ride.status == status))
            .collect())
    }

    /// Rides the user drives or has an accepted seat on.
    pub fn rides_for_user(&self, user_id: Uuid, now: DateTime<Utc>) -> CoreResult<Vec<Ride>> {
        let rides = self.db.with_conn(|conn| queries::rides_for_user(conn, user_id))?;
        Ok(rides.into_iter().map(|ride| ride.at(now)).collect())
    }
}

fn load_owned_ride(conn: &Connection, ride_id: Uuid, caller_id: Uuid, action: &str) -> CoreResult<Ride> {
    let ride = queries::ride_by_id(conn, ride_id)?.ok_or_else(|| CoreError::not_found("ride", ride_id))?;
    if ride.driver_id != caller_id {
        return Err(CoreError::Forbidden(format!(
            "only the driver can {} ride {}",
            action, ride_id
        )));
    }
    Ok(ride)
}

fn notify_passengers(
    conn: &Connection,
    ride: &Ride,
    message: &str,
    payload: NotificationPayload,
    now: DateTime<Utc>,
) -> anyhow::Result<usize> {
    let passengers = queries::accepted_passengers(conn, ride.id)?;
    for passenger in &passengers {
        let user_id = passenger.summary()?.id;
        notify(conn, user_id, message.to_string(), payload.clone(), now)?;
    }
    Ok(passengers.len())
}
