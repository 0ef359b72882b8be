use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE rides (
                id               TEXT PRIMARY KEY,
                driver_id        TEXT NOT NULL REFERENCES users(id),
                origin           TEXT NOT NULL,
                destination      TEXT NOT NULL,
                departure_time   TEXT NOT NULL,
                seats_total      INTEGER NOT NULL CHECK (seats_total > 0),
                seats_remaining  INTEGER NOT NULL
                    CHECK (seats_remaining >= 0 AND seats_remaining <= seats_total),
                status           TEXT NOT NULL DEFAULT 'upcoming'
                    CHECK (status IN ('upcoming', 'active', 'completed')),
                created_at       TEXT NOT NULL
            );

            CREATE INDEX idx_rides_departure ON rides(departure_time);
            CREATE INDEX idx_rides_driver ON rides(driver_id);

            CREATE TABLE ride_requests (
                id            TEXT PRIMARY KEY,
                ride_id       TEXT NOT NULL REFERENCES rides(id),
                passenger_id  TEXT NOT NULL REFERENCES users(id),
                status        TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending', 'accepted', 'rejected', 'withdrawn')),
                created_at    TEXT NOT NULL,
                resolved_at   TEXT
            );

            -- At most one pending or accepted request per passenger and ride
            CREATE UNIQUE INDEX idx_ride_requests_outstanding
                ON ride_requests(ride_id, passenger_id)
                WHERE status IN ('pending', 'accepted');

            CREATE INDEX idx_ride_requests_passenger ON ride_requests(passenger_id, status);

            CREATE TABLE notifications (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                message     TEXT NOT NULL,
                kind        TEXT NOT NULL,
                payload     TEXT NOT NULL,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_notifications_user ON notifications(user_id, created_at);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
