use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL,
                password    TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE wardrobes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL
            );

            CREATE TABLE listings (
                id           TEXT PRIMARY KEY,
                wardrobe_id  TEXT NOT NULL REFERENCES wardrobes(id) ON DELETE CASCADE,
                title        TEXT NOT NULL,
                description  TEXT NOT NULL DEFAULT '',
                condition    TEXT NOT NULL CHECK (condition IN ('new', 'like_new', 'good', 'fair')),
                category     TEXT NOT NULL DEFAULT 'mixed' CHECK (category IN ('cotton', 'synthetic', 'mixed')),
                longitude    REAL CHECK (longitude BETWEEN -180 AND 180),
                latitude     REAL CHECK (latitude BETWEEN -90 AND 90),
                is_public    INTEGER NOT NULL DEFAULT 1,
                eco_impact   REAL NOT NULL CHECK (eco_impact >= 0),
                created_at   TEXT NOT NULL,
                CHECK ((longitude IS NULL) = (latitude IS NULL))
            );

            CREATE INDEX idx_listings_wardrobe
                ON listings(wardrobe_id, created_at);

            CREATE INDEX idx_listings_public_geo
                ON listings(is_public, latitude, longitude);

            CREATE INDEX idx_listings_public_recent
                ON listings(is_public, created_at);

            CREATE TABLE messages (
                id           TEXT PRIMARY KEY,
                sender_id    TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                receiver_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                listing_id   TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
                content      TEXT NOT NULL,
                is_read      INTEGER NOT NULL DEFAULT 0,
                created_at   TEXT NOT NULL,
                CHECK (sender_id <> receiver_id)
            );

            CREATE INDEX idx_messages_receiver
                ON messages(receiver_id, is_read, created_at);

            CREATE INDEX idx_messages_sender
                ON messages(sender_id, created_at);

            CREATE TABLE user_locations (
                user_id     TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
                longitude   REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
                latitude    REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
                updated_at  TEXT NOT NULL
            );

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (listing images)");
        conn.execute_batch(
            "
            ALTER TABLE listings ADD COLUMN image TEXT;

            INSERT INTO schema_version (version) VALUES (2);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
