use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use carpool_db::{Database, queries};
use carpool_types::models::{
    Decision, NotificationPayload, RequestStatus, RideRequest, RideStatus,
};

use crate::error::{CoreError, CoreResult};
use crate::load_user;
use crate::notifications::notify;

/// Owns join requests: pending -> accepted | rejected, plus a passenger's
/// withdrawal of a pending or accepted request. Accepting is the only path that
/// takes a seat and withdrawing an accepted request the only one that gives it back.
#[derive(Clone)]
pub struct RequestApproval {
    db: Arc<Database>,
}

impl RequestApproval {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Files a pending request for a seat and tells the driver about it.
    pub fn request_join(&self, ride_id: Uuid, passenger_id: Uuid, now: DateTime<Utc>) -> CoreResult<RideRequest> {
        let request = self.db.with_tx(|tx| {
            let ride = queries::ride_by_id(tx, ride_id)?.ok_or_else(|| CoreError::not_found("ride", ride_id))?;

            if ride.driver_id == passenger_id {
                return Err(CoreError::Forbidden("drivers cannot join their own ride".into()));
            }
            let status = ride.effective_status(now);
            if status != RideStatus::Upcoming {
                return Err(CoreError::InvalidState(format!(
                    "ride {} is {} and no longer takes requests",
                    ride_id, status
                )));
            }
            if let Some(existing) = queries::outstanding_request(tx, ride_id, passenger_id)? {
                return Err(CoreError::Conflict(format!(
                    "request {} for this ride is already {}",
                    existing.id, existing.status
                )));
            }

            let passenger = load_user(tx, passenger_id)?;
            let request = RideRequest {
                id: Uuid::new_v4(),
                ride_id,
                passenger_id,
                status: RequestStatus::Pending,
                created_at: now,
                resolved_at: None,
            };
            queries::insert_request(tx, &request).map_err(|e| {
                if queries::is_unique_violation(&e) {
                    CoreError::Conflict("an outstanding request for this ride already exists".into())
                } else {
                    CoreError::Storage(e)
                }
            })?;

            notify(
                tx,
                ride.driver_id,
                format!(
                    "{} wants to join your ride from {} to {}.",
                    passenger.name, ride.origin, ride.destination
                ),
                NotificationPayload::JoinRequested {
                    ride_id,
                    request_id: request.id,
                    passenger_id,
                },
                now,
            )?;

            Ok(request)
        })?;

        info!("Request {} filed by {} on ride {}", request.id, passenger_id, ride_id);
        Ok(request)
    }

    /// The driver accepts or rejects a pending request. Accepting claims a seat in
    /// the same transaction; either way the passenger is notified exactly once.
    pub fn resolve_request(
        &self,
        ride_id: Uuid,
        request_id: Uuid,
        caller_id: Uuid,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> CoreResult<RideRequest> {
        let result = self.db.with_tx(|tx| {
            let ride = queries::ride_by_id(tx, ride_id)?.ok_or_else(|| CoreError::not_found("ride", ride_id))?;
            if ride.driver_id != caller_id {
                return Err(CoreError::Forbidden(format!(
                    "only the driver can resolve requests on ride {}",
                    ride_id
                )));
            }

            let request = queries::request_by_id(tx, ride_id, request_id)?
                .ok_or_else(|| CoreError::not_found("request", request_id))?;
            if request.status != RequestStatus::Pending {
                return Err(CoreError::InvalidState(format!(
                    "request {} is already {}",
                    request_id, request.status
                )));
            }
            if ride.effective_status(now) == RideStatus::Completed {
                return Err(CoreError::InvalidState(format!("ride {} is completed", ride_id)));
            }

            let outcome = decision.outcome();
            if decision == Decision::Accept && !queries::take_seat(tx, ride_id)? {
                return Err(CoreError::Capacity(ride_id));
            }
            if !queries::transition_request(tx, request_id, RequestStatus::Pending, outcome, now)? {
                return Err(CoreError::InvalidState(format!(
                    "request {} was resolved concurrently",
                    request_id
                )));
            }

            let verdict = match decision {
                Decision::Accept => "approved",
                Decision::Reject => "declined",
            };
            notify(
                tx,
                request.passenger_id,
                format!(
                    "Your request to join the ride to {} has been {}.",
                    ride.destination, verdict
                ),
                NotificationPayload::RequestResolved {
                    ride_id,
                    request_id,
                    status: outcome,
                },
                now,
            )?;

            Ok(RideRequest {
                status: outcome,
                resolved_at: Some(now),
                ..request
            })
        });

        match &result {
            Ok(request) => info!("Request {} on ride {} {}", request_id, ride_id, request.status),
            Err(CoreError::Capacity(_)) => warn!("Request {} on ride {} hit a full ride", request_id, ride_id),
            Err(_) => {}
        }
        result
    }

    /// The passenger gives up a pending request or an accepted seat. An accepted
    /// seat goes back to the ride; the driver is notified either way.
    pub fn withdraw_request(
        &self,
        ride_id: Uuid,
        request_id: Uuid,
        caller_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<RideRequest> {
        let request = self.db.with_tx(|tx| {
            let ride = queries::ride_by_id(tx, ride_id)?.ok_or_else(|| CoreError::not_found("ride", ride_id))?;
            let request = queries::request_by_id(tx, ride_id, request_id)?
                .ok_or_else(|| CoreError::not_found("request", request_id))?;

            if request.passenger_id != caller_id {
                return Err(CoreError::Forbidden("only the passenger can withdraw a request".into()));
            }
            if !request.status.is_outstanding() {
                return Err(CoreError::InvalidState(format!(
                    "request {} is already {}",
                    request_id, request.status
                )));
            }
            if ride.effective_status(now) == RideStatus::Completed {
                return Err(CoreError::InvalidState(format!("ride {} is completed", ride_id)));
            }

            if !queries::transition_request(tx, request_id, request.status, RequestStatus::Withdrawn, now)? {
                return Err(CoreError::InvalidState(format!(
                    "request {} changed state concurrently",
                    request_id
                )));
            }
            if request.status == RequestStatus::Accepted && !queries::release_seat(tx, ride_id)? {
                return Err(anyhow::anyhow!("ride {} has no taken seat to release", ride_id).into());
            }

            let passenger = load_user(tx, caller_id)?;
            notify(
                tx,
                ride.driver_id,
                format!(
                    "{} cancelled their spot on your ride to {}.",
                    passenger.name, ride.destination
                ),
                NotificationPayload::RequestWithdrawn {
                    ride_id,
                    request_id,
                    passenger_id: caller_id,
                },
                now,
            )?;

            Ok(RideRequest {
                status: RequestStatus::Withdrawn,
                resolved_at: Some(now),
                ..request
            })
        })?;

        info!("Request {} on ride {} withdrawn", request_id, ride_id);
        Ok(request)
    }

    /// Every request on the ride, oldest first. Driver only.
    pub fn list_requests(&self, ride_id: Uuid, caller_id: Uuid) -> CoreResult<Vec<RideRequest>> {
        let ride = self
            .db
            .with_conn(|conn| queries::ride_by_id(conn, ride_id))?
            .ok_or_else(|| CoreError::not_found("ride", ride_id))?;
        if ride.driver_id != caller_id {
            return Err(CoreError::Forbidden(format!(
                "only the driver can list requests on ride {}",
                ride_id
            )));
        }
        Ok(self.db.with_conn(|conn| queries::requests_for_ride(conn, ride_id))?)
    }
}
