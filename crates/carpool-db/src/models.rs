//! Database row types. These map directly to SQLite rows and are converted into
//! the carpool-types models on the way out, so a corrupt row fails loudly instead
//! of leaking half-parsed values.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use carpool_types::models::{
    Notification, NotificationPayload, Ride, RideRequest, User, UserSummary,
};

/// Timestamps are stored as fixed-width RFC 3339 so text order is time order.
pub fn to_db_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn from_db_time(s: &str) -> Result<DateTime<Utc>> {
    let t = DateTime::parse_from_rfc3339(s).with_context(|| format!("bad timestamp '{}'", s))?;
    Ok(t.with_timezone(&Utc))
}

fn parse_id(s: &str) -> Result<Uuid> {
    s.parse().with_context(|| format!("bad id '{}'", s))
}

pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password: String,
    pub created_at: String,
}

impl UserRow {
    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            name: self.name,
            email: self.email,
            created_at: from_db_time(&self.created_at)?,
        })
    }

    pub fn summary(&self) -> Result<UserSummary> {
        Ok(UserSummary {
            id: parse_id(&self.id)?,
            name: self.name.clone(),
        })
    }
}

pub struct RideRow {
    pub id: String,
    pub driver_id: String,
    pub origin: String,
    pub destination: String,
    pub departure_time: String,
    pub seats_total: i64,
    pub seats_remaining: i64,
    pub status: String,
    pub created_at: String,
}

impl RideRow {
    pub fn into_ride(self) -> Result<Ride> {
        Ok(Ride {
            id: parse_id(&self.id)?,
            driver_id: parse_id(&self.driver_id)?,
            origin: self.origin,
            destination: self.destination,
            departure_time: from_db_time(&self.departure_time)?,
            seats_total: u32::try_from(self.seats_total)
                .with_context(|| format!("bad seats_total on ride {}", self.id))?,
            seats_remaining: u32::try_from(self.seats_remaining)
                .with_context(|| format!("bad seats_remaining on ride {}", self.id))?,
            status: self.status.parse()?,
            created_at: from_db_time(&self.created_at)?,
        })
    }
}

pub struct RideRequestRow {
    pub id: String,
    pub ride_id: String,
    pub passenger_id: String,
    pub status: String,
    pub created_at: String,
    pub resolved_at: Option<String>,
}

impl RideRequestRow {
    pub fn into_request(self) -> Result<RideRequest> {
        Ok(RideRequest {
            id: parse_id(&self.id)?,
            ride_id: parse_id(&self.ride_id)?,
            passenger_id: parse_id(&self.passenger_id)?,
            status: self.status.parse()?,
            created_at: from_db_time(&self.created_at)?,
            resolved_at: self.resolved_at.as_deref().map(from_db_time).transpose()?,
        })
    }
}

pub struct NotificationRow {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub payload: String,
    pub is_read: bool,
    pub created_at: String,
}

impl NotificationRow {
    pub fn into_notification(self) -> Result<Notification> {
        let payload: NotificationPayload = serde_json::from_str(&self.payload)
            .with_context(|| format!("bad payload on notification {}", self.id))?;
        Ok(Notification {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            message: self.message,
            read: self.is_read,
            created_at: from_db_time(&self.created_at)?,
            payload,
        })
    }
}

/// One row of the leaderboard query, before ranks are assigned.
pub struct SharedRidesRow {
    pub user_id: String,
    pub name: String,
    pub rides_shared: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, SubsecRound};

    #[test]
    fn db_time_sorts_lexically() {
        let a = Utc::now().trunc_subsecs(6);
        let b = a + Duration::microseconds(1);
        let c = a + Duration::days(400);
        assert!(to_db_time(a) < to_db_time(b));
        assert!(to_db_time(b) < to_db_time(c));
        assert_eq!(from_db_time(&to_db_time(b)).unwrap(), b);
    }

    #[test]
    fn corrupt_ride_row_is_rejected() {
        let row = RideRow {
            id: Uuid::new_v4().to_string(),
            driver_id: "not-a-uuid".into(),
            origin: "Berkeley, CA".into(),
            destination: "San Francisco, CA".into(),
            departure_time: to_db_time(Utc::now()),
            seats_total: 2,
            seats_remaining: 2,
            status: "upcoming".into(),
            created_at: to_db_time(Utc::now()),
        };
        assert!(row.into_ride().is_err());
    }
}
