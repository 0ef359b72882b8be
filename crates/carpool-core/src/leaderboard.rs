use carpool_db::{Database, queries};
use carpool_types::models::{LeaderboardEntry, UserSummary};

use crate::error::CoreResult;

/// Users ranked by rides shared. Ranks are 1-based and follow the query order.
pub fn leaderboard(db: &Database, limit: u32) -> CoreResult<Vec<LeaderboardEntry>> {
    let rows = db.with_conn(|conn| queries::shared_rides(conn, limit))?;

    let mut entries = Vec::with_capacity(rows.len());
    for (rank, row) in (1u32..).zip(rows) {
        entries.push(LeaderboardEntry {
            rank,
            user: UserSummary {
                id: row.user_id.parse().map_err(anyhow::Error::from)?,
                name: row.name,
            },
            rides_shared: u32::try_from(row.rides_shared).map_err(anyhow::Error::from)?,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use crate::{RequestApproval, RideLifecycle};
    use carpool_types::models::Decision;
    use chrono::Utc;

    #[test]
    fn ranks_by_rides_shared() {
        let db = testing::db();
        let rides = RideLifecycle::new(db.clone());
        let requests = RequestApproval::new(db.clone());
        let maria = testing::user(&db, "Maria Garcia");
        let alex = testing::user(&db, "Alex Johnson");
        let david = testing::user(&db, "David Smith");
        let sarah = testing::user(&db, "Sarah Chen");
        let now = Utc::now();

        // Maria drives two rides; Alex rides both, David rides one.
        for passengers in [vec![alex, david], vec![alex]] {
            let ride = testing::ride(&rides, maria, 3, now);
            for p in passengers {
                let req = requests.request_join(ride.id, p, now).unwrap();
                requests.resolve_request(ride.id, req.id, maria, Decision::Accept, now).unwrap();
            }
        }
        // A ride nobody was accepted on does not count for Sarah.
        let lonely = testing::ride(&rides, sarah, 3, now);
        let req = requests.request_join(lonely.id, david, now).unwrap();
        requests.resolve_request(lonely.id, req.id, sarah, Decision::Reject, now).unwrap();

        let board = leaderboard(&db, 10).unwrap();
        let names: Vec<_> = board.iter().map(|e| (e.rank, e.user.name.as_str(), e.rides_shared)).collect();
        assert_eq!(
            names,
            [(1, "Alex Johnson", 2), (2, "Maria Garcia", 2), (3, "David Smith", 1)]
        );

        assert_eq!(leaderboard(&db, 1).unwrap().len(), 1);
    }
}
