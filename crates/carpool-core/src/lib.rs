//! Ride lifecycle and seat-request approval on top of the carpool store.
//!
//! Every mutating operation runs in a single immediate transaction: the state
//! transition, any seat change and the notifications it causes either all commit
//! or none do.

pub mod approval;
pub mod error;
pub mod leaderboard;
pub mod lifecycle;
pub mod matching;
pub mod notifications;

pub use approval::RequestApproval;
pub use error::{CoreError, CoreResult};
pub use lifecycle::{NewRide, RideLifecycle};
pub use matching::{KeywordMatcher, MatchQuery, MatchingAssistant, Matchmaker};
pub use notifications::NotificationSink;

use carpool_db::queries;
use carpool_types::models::UserSummary;
use rusqlite::Connection;
use uuid::Uuid;

pub(crate) fn load_user(conn: &Connection, id: Uuid) -> CoreResult<UserSummary> {
    let row = queries::user_by_id(conn, &id.to_string())?
        .ok_or_else(|| CoreError::not_found("user", id))?;
    Ok(row.summary()?)
}
