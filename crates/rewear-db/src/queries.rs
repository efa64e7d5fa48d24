use crate::Database;
use crate::models::{ListingRow, MessageRow, NewListing, UserLocationRow, UserRow, WardrobeRow};
use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use rewear_core::geo::BoundingBox;
use rewear_core::nearby::{NearbyQuery, rank_nearby};
use rewear_types::models::GeoPoint;
use rusqlite::{Connection, Row};
use tracing::debug;

const LISTING_SELECT: &str = "
    SELECT l.id, l.wardrobe_id, w.user_id, u.username, l.title, l.description,
           l.condition, l.category, l.longitude, l.latitude, l.is_public,
           l.eco_impact, l.image, l.created_at
    FROM listings l
    JOIN wardrobes w ON l.wardrobe_id = w.id
    JOIN users u ON w.user_id = u.id";

const MESSAGE_SELECT: &str = "
    SELECT m.id, m.sender_id, s.username, m.receiver_id, r.username,
           m.listing_id, l.title, m.content, m.is_read, m.created_at
    FROM messages m
    JOIN users s ON m.sender_id = s.id
    JOIN users r ON m.receiver_id = r.id
    JOIN listings l ON m.listing_id = l.id";

/// RFC 3339 with microseconds, so text order matches time order.
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Database {
    // -- Users --

    /// Create a user together with its wardrobe.
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
        wardrobe_id: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let now = now_timestamp();
            tx.execute(
                "INSERT INTO users (id, username, email, password, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, username, email, password_hash, &now),
            )?;
            tx.execute(
                "INSERT INTO wardrobes (id, user_id, created_at) VALUES (?1, ?2, ?3)",
                (wardrobe_id, id, &now),
            )?;
            tx.commit()?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_username(conn, username))
    }

    pub fn user_exists(&self, id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row("SELECT 1 FROM users WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;
            Ok(found.is_some())
        })
    }

    // -- Wardrobes --

    /// Get-or-create the user's wardrobe in one statement.
    /// Returns the wardrobe and whether it was created by this call.
    pub fn upsert_wardrobe(&self, new_id: &str, user_id: &str) -> Result<(WardrobeRow, bool)> {
        self.with_conn(|conn| upsert_wardrobe(conn, new_id, user_id))
    }

    pub fn get_wardrobe_by_user(&self, user_id: &str) -> Result<Option<WardrobeRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, created_at FROM wardrobes WHERE user_id = ?1",
                [user_id],
                wardrobe_from_row,
            )
            .optional()
        })
    }

    // -- Listings --

    /// Insert a listing into the owner's wardrobe, creating the wardrobe if needed.
    pub fn insert_listing(&self, listing: &NewListing<'_>, new_wardrobe_id: &str) -> Result<ListingRow> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let (wardrobe, _) = upsert_wardrobe(&tx, new_wardrobe_id, listing.owner_id)?;
            tx.execute(
                "INSERT INTO listings (id, wardrobe_id, title, description, condition, category,
                                       longitude, latitude, is_public, eco_impact, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    listing.id,
                    wardrobe.id,
                    listing.title,
                    listing.description,
                    listing.condition,
                    listing.category,
                    listing.location.map(|p| p.longitude),
                    listing.location.map(|p| p.latitude),
                    listing.is_public,
                    listing.eco_impact,
                    now_timestamp(),
                ],
            )?;
            let row = tx.query_row(
                &format!("{LISTING_SELECT} WHERE l.id = ?1"),
                [listing.id],
                listing_from_row,
            )?;
            tx.commit()?;
            Ok(row)
        })
    }

    pub fn get_listing(&self, id: &str) -> Result<Option<ListingRow>> {
        self.with_conn(|conn| {
            conn.query_row(&format!("{LISTING_SELECT} WHERE l.id = ?1"), [id], listing_from_row)
                .optional()
        })
    }

    /// Point the listing at a new stored image.
    /// Returns the previous image path, or `None` if there was none.
    pub fn set_listing_image(&self, id: &str, image: &str) -> Result<Option<String>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let previous: Option<String> =
                tx.query_row("SELECT image FROM listings WHERE id = ?1", [id], |r| r.get(0))?;
            tx.execute("UPDATE listings SET image = ?2 WHERE id = ?1", (id, image))?;
            tx.commit()?;
            Ok(previous)
        })
    }

    pub fn get_listings_for_user(&self, user_id: &str) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{LISTING_SELECT} WHERE w.user_id = ?1 ORDER BY l.created_at DESC, l.id DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_latest_public_listings(&self, limit: u32) -> Result<Vec<ListingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{LISTING_SELECT} WHERE l.is_public = 1 ORDER BY l.created_at DESC, l.id DESC LIMIT ?1"
            ))?;
            let rows = stmt
                .query_map([limit], listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Public, located listings inside the box. Unordered.
    pub fn get_public_listings_in_box(&self, bbox: &BoundingBox) -> Result<Vec<ListingRow>> {
        let (sql, params) = match bbox.longitude {
            Some((min_lon, max_lon)) => (
                format!(
                    "{LISTING_SELECT}
                     WHERE l.is_public = 1
                       AND l.latitude BETWEEN ?1 AND ?2
                       AND l.longitude BETWEEN ?3 AND ?4"
                ),
                vec![bbox.min_latitude, bbox.max_latitude, min_lon, max_lon],
            ),
            None => (
                format!(
                    "{LISTING_SELECT}
                     WHERE l.is_public = 1
                       AND l.latitude BETWEEN ?1 AND ?2
                       AND l.longitude IS NOT NULL"
                ),
                vec![bbox.min_latitude, bbox.max_latitude],
            ),
        };

        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), listing_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Closest public listings within the query radius, with distances in km.
    pub fn nearby_listings(&self, query: &NearbyQuery) -> Result<Vec<(ListingRow, f64)>> {
        let bbox = query.bounding_box();
        let candidates = self.get_public_listings_in_box(&bbox)?;
        debug!("Nearby prefilter {:?} matched {} listings", bbox, candidates.len());
        Ok(rank_nearby(query, candidates))
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: &str,
        sender_id: &str,
        receiver_id: &str,
        listing_id: &str,
        content: &str,
    ) -> Result<MessageRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, listing_id, content, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
                rusqlite::params![id, sender_id, receiver_id, listing_id, content, now_timestamp()],
            )?;
            query_message(conn, id)?.ok_or_else(|| anyhow::anyhow!("Message vanished after insert: {}", id))
        })
    }

    pub fn get_message(&self, id: &str) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Messages the user sent or received, newest first.
    pub fn get_messages_for_user(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE m.sender_id = ?1 OR m.receiver_id = ?1
                 ORDER BY m.created_at DESC, m.id DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Unread messages addressed to the user, newest first.
    pub fn get_unread_inbox(&self, user_id: &str) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE m.receiver_id = ?1 AND m.is_read = 0
                 ORDER BY m.created_at DESC, m.id DESC"
            ))?;
            let rows = stmt
                .query_map([user_id], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Returns the updated message, or `None` if it doesn't exist.
    pub fn set_message_read(&self, id: &str, is_read: bool) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = ?2 WHERE id = ?1",
                rusqlite::params![id, is_read],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_message(conn, id)
        })
    }

    // -- Locations --

    /// Record the user's latest location, replacing any previous one.
    pub fn upsert_user_location(&self, user_id: &str, point: GeoPoint) -> Result<UserLocationRow> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                "INSERT INTO user_locations (user_id, longitude, latitude, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                     longitude = excluded.longitude,
                     latitude = excluded.latitude,
                     updated_at = excluded.updated_at
                 RETURNING user_id, longitude, latitude, updated_at",
                rusqlite::params![user_id, point.longitude, point.latitude, now_timestamp()],
                location_from_row,
            )?;
            Ok(row)
        })
    }

    pub fn get_user_location(&self, user_id: &str) -> Result<Option<UserLocationRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT user_id, longitude, latitude, updated_at FROM user_locations WHERE user_id = ?1",
                [user_id],
                location_from_row,
            )
            .optional()
        })
    }
}

fn query_user_by_username(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn
        .prepare("SELECT id, username, email, password, created_at FROM users WHERE username = ?1")?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn upsert_wardrobe(conn: &Connection, new_id: &str, user_id: &str) -> Result<(WardrobeRow, bool)> {
    let inserted = conn.execute(
        "INSERT INTO wardrobes (id, user_id, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO NOTHING",
        (new_id, user_id, now_timestamp()),
    )?;
    let row = conn.query_row(
        "SELECT id, user_id, created_at FROM wardrobes WHERE user_id = ?1",
        [user_id],
        wardrobe_from_row,
    )?;
    Ok((row, inserted == 1))
}

fn query_message(conn: &Connection, id: &str) -> Result<Option<MessageRow>> {
    conn.query_row(&format!("{MESSAGE_SELECT} WHERE m.id = ?1"), [id], message_from_row)
        .optional()
}

fn wardrobe_from_row(row: &Row<'_>) -> rusqlite::Result<WardrobeRow> {
    Ok(WardrobeRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: row.get(2)?,
    })
}

fn listing_from_row(row: &Row<'_>) -> rusqlite::Result<ListingRow> {
    Ok(ListingRow {
        id: row.get(0)?,
        wardrobe_id: row.get(1)?,
        owner_id: row.get(2)?,
        owner_username: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        condition: row.get(6)?,
        category: row.get(7)?,
        longitude: row.get(8)?,
        latitude: row.get(9)?,
        is_public: row.get(10)?,
        eco_impact: row.get(11)?,
        image: row.get(12)?,
        created_at: row.get(13)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        sender_username: row.get(2)?,
        receiver_id: row.get(3)?,
        receiver_username: row.get(4)?,
        listing_id: row.get(5)?,
        listing_title: row.get(6)?,
        content: row.get(7)?,
        is_read: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<UserLocationRow> {
    Ok(UserLocationRow {
        user_id: row.get(0)?,
        longitude: row.get(1)?,
        latitude: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
