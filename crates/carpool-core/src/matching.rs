use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use carpool_db::{Database, queries};
use carpool_types::models::{Ride, RideStatus};

use crate::error::{CoreError, CoreResult};

/// Shortest free-text query worth matching on.
pub const MIN_QUERY_LEN: usize = 10;

#[derive(Debug, Clone)]
pub struct MatchQuery {
    pub schedule: String,
    pub preferences: String,
}

impl MatchQuery {
    fn text(&self) -> String {
        format!("{} {}", self.schedule, self.preferences)
    }
}

/// Picks the rides that fit a rider's description. Implementations must return a
/// subset of `candidates` and must not have side effects.
pub trait MatchingAssistant: Send + Sync {
    fn suggest_matches(&self, query: &MatchQuery, candidates: &[Ride]) -> Vec<Ride>;
}

/// Ranks rides by how many origin and destination words the query mentions.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordMatcher;

fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
}

impl MatchingAssistant for KeywordMatcher {
    fn suggest_matches(&self, query: &MatchQuery, candidates: &[Ride]) -> Vec<Ride> {
        let wanted: HashSet<String> = words(&query.text()).collect();

        let mut scored: Vec<(usize, &Ride)> = candidates
            .iter()
            .map(|ride| {
                let place_words: HashSet<String> =
                    words(&ride.origin).chain(words(&ride.destination)).collect();
                (place_words.intersection(&wanted).count(), ride)
            })
            .filter(|(score, _)| *score > 0)
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score.cmp(a_score).then(a.departure_time.cmp(&b.departure_time))
        });
        scored.into_iter().map(|(_, ride)| ride.clone()).collect()
    }
}

/// Runs a [`MatchingAssistant`] over the rides a caller could still join.
#[derive(Clone)]
pub struct Matchmaker {
    db: Arc<Database>,
    assistant: Arc<dyn MatchingAssistant>,
}

impl Matchmaker {
    pub fn new(db: Arc<Database>, assistant: Arc<dyn MatchingAssistant>) -> Self {
        Self { db, assistant }
    }

    /// Candidates are upcoming rides with a free seat that the caller does not drive.
    pub fn suggest(&self, caller_id: Uuid, query: &MatchQuery, now: DateTime<Utc>) -> CoreResult<Vec<Ride>> {
        if query.text().trim().chars().count() < MIN_QUERY_LEN {
            return Err(CoreError::Validation(format!(
                "query must be at least {} characters",
                MIN_QUERY_LEN
            )));
        }

        let candidates: Vec<Ride> = self
            .db
            .with_conn(queries::list_rides)?
            .into_iter()
            .map(|ride| ride.at(now))
            .filter(|ride| {
                ride.status == RideStatus::Upcoming
                    && ride.seats_remaining > 0
                    && ride.driver_id != caller_id
            })
            .collect();

        let ids: HashSet<Uuid> = candidates.iter().map(|r| r.id).collect();
        let matches: Vec<Ride> = self
            .assistant
            .suggest_matches(query, &candidates)
            .into_iter()
            .filter(|ride| ids.contains(&ride.id))
            .collect();

        debug!("Matched {} of {} candidate rides", matches.len(), candidates.len());
        Ok(matches)
    }
}
