use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user, as shown next to rides and requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
}

/// Returned when a stored status string is not one we know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl fmt::Display for ParseStatusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.kind, self.value)
    }
}

impl std::error::Error for ParseStatusError {}

// -- Rides --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideStatus {
    Upcoming,
    Active,
    Completed,
}

impl RideStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upcoming => "upcoming",
            Self::Active => "active",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upcoming" => Ok(Self::Upcoming),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            other => Err(ParseStatusError {
                kind: "ride status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub departure_time: DateTime<Utc>,
    pub seats_total: u32,
    pub seats_remaining: u32,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
}

impl Ride {
    /// State as users see it: a ride still marked upcoming whose departure time has
    /// passed counts as completed. Nothing ever writes this back to storage.
    pub fn effective_status(&self, now: DateTime<Utc>) -> RideStatus {
        match self.status {
            RideStatus::Upcoming if self.departure_time < now => RideStatus::Completed,
            status => status,
        }
    }

    /// Replaces the stored status with [`Ride::effective_status`] before the ride
    /// leaves the service layer.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.status = self.effective_status(now);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideDetail {
    #[serde(flatten)]
    pub ride: Ride,
    pub driver: UserSummary,
    pub passengers: Vec<UserSummary>,
}

// -- Ride requests --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Withdrawn => "withdrawn",
        }
    }

    /// Pending and accepted requests hold (or may come to hold) a seat; at most one
    /// of them may exist per ride and passenger.
    pub fn is_outstanding(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "withdrawn" => Ok(Self::Withdrawn),
            other => Err(ParseStatusError {
                kind: "request status",
                value: other.to_string(),
            }),
        }
    }
}

/// The driver's answer to a pending request. On the wire it reads as the status
/// the request ends up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    #[serde(rename = "accepted")]
    Accept,
    #[serde(rename = "rejected")]
    Reject,
}

impl Decision {
    pub fn outcome(self) -> RequestStatus {
        match self {
            Self::Accept => RequestStatus::Accepted,
            Self::Reject => RequestStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RideRequest {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

// -- Notifications --

/// What a notification is about. Serialized as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum NotificationPayload {
    /// Sent to the driver when a passenger asks for a seat
    JoinRequested {
        ride_id: Uuid,
        request_id: Uuid,
        passenger_id: Uuid,
    },

    /// Sent to the passenger once the driver accepted or rejected
    RequestResolved {
        ride_id: Uuid,
        request_id: Uuid,
        status: RequestStatus,
    },

    /// Sent to every accepted passenger when the driver starts the ride
    RideStarted { ride_id: Uuid },

    /// Sent to every accepted passenger when the driver cancels the ride
    RideCancelled { ride_id: Uuid },

    /// Sent to the driver when a passenger gives up their request or seat
    RequestWithdrawn {
        ride_id: Uuid,
        request_id: Uuid,
        passenger_id: Uuid,
    },
}

impl NotificationPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRequested { .. } => "join_requested",
            Self::RequestResolved { .. } => "request_resolved",
            Self::RideStarted { .. } => "ride_started",
            Self::RideCancelled { .. } => "ride_cancelled",
            Self::RequestWithdrawn { .. } => "request_withdrawn",
        }
    }

    pub fn ride_id(&self) -> Uuid {
        match self {
            Self::JoinRequested { ride_id, .. }
            | Self::RequestResolved { ride_id, .. }
            | Self::RideStarted { ride_id }
            | Self::RideCancelled { ride_id }
            | Self::RequestWithdrawn { ride_id, .. } => *ride_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: NotificationPayload,
}

// -- Leaderboard --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user: UserSummary,
    pub rides_shared: u32,
}
