use crate::models::{CategoryRow, ListingRow, NewListing, ProfileChanges, ResetTokenRow, UserRow};
use crate::{Database, UnitOfWork};
use anyhow::Result;
use rusqlite::{Connection, Row};

/// Upper bound on category nesting when walking parents, guards against cycles.
const MAX_CATEGORY_DEPTH: usize = 16;

const USER_COLUMNS: &str =
    "id, username, email, password, first_name, last_name, avatar_url, created_at";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        self.with_conn(|conn| insert_user(conn, id, username, email, password_hash))
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    pub fn update_profile(&self, id: &str, changes: &ProfileChanges) -> Result<Option<UserRow>> {
        self.with_conn(|conn| apply_profile_changes(conn, id, changes))
    }

    // -- Password reset tokens --

    pub fn create_reset_token(
        &self,
        token: &str,
        email: &str,
        expires_at: &str,
        created_at: &str,
    ) -> Result<ResetTokenRow> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO password_reset_tokens (token, email, expires_at, created_at) VALUES (?1, ?2, ?3, ?4)",
                (token, email, expires_at, created_at),
            )?;
            Ok(ResetTokenRow {
                token: token.to_string(),
                email: email.to_string(),
                expires_at: expires_at.to_string(),
                created_at: created_at.to_string(),
            })
        })
    }

    pub fn find_reset_token(&self, token: &str) -> Result<Option<ResetTokenRow>> {
        self.with_conn(|conn| query_reset_token(conn, token))
    }

    /// Delete every token whose expiry is at or before `now`.
    pub fn prune_expired_reset_tokens(&self, now: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM password_reset_tokens WHERE expires_at <= ?1",
                [now],
            )?;
            Ok(removed)
        })
    }

    // -- Categories --

    pub fn list_categories(&self) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, name, slug, parent_id FROM categories ORDER BY name")?;
            let rows = stmt
                .query_map([], category_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_category(&self, id: &str) -> Result<Option<CategoryRow>> {
        self.with_conn(|conn| query_category(conn, id))
    }

    /// The category and its ancestors, root first.
    pub fn category_path(&self, id: &str) -> Result<Vec<CategoryRow>> {
        self.with_conn(|conn| {
            let mut path = Vec::new();
            let mut next = Some(id.to_string());
            while let Some(current) = next {
                if path.len() == MAX_CATEGORY_DEPTH {
                    break;
                }
                let Some(row) = query_category(conn, &current)? else {
                    break;
                };
                next = row.parent_id.clone();
                path.push(row);
            }
            path.reverse();
            Ok(path)
        })
    }

    // -- Listings --

    /// Insert the listing row and its image rows atomically.
    pub fn create_listing(&self, listing: &NewListing) -> Result<()> {
        let uow = self.begin()?;
        uow.conn().execute(
            "INSERT INTO listings (
                id, slug, owner_id, category_id, title, description, item_name, quantity,
                buy_it_now_price, starting_bid, reserve_price, min_bid_increment,
                end_time, thumbnail_url, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            rusqlite::params![
                listing.id,
                listing.slug,
                listing.owner_id,
                listing.category_id,
                listing.title,
                listing.description,
                listing.item_name,
                listing.quantity,
                listing.buy_it_now_price,
                listing.starting_bid,
                listing.reserve_price,
                listing.min_bid_increment,
                listing.end_time,
                listing.thumbnail_url,
                listing.created_at,
            ],
        )?;

        for (position, url) in listing.images.iter().enumerate() {
            uow.conn().execute(
                "INSERT INTO listing_images (listing_id, position, url) VALUES (?1, ?2, ?3)",
                rusqlite::params![listing.id, position as i64, url],
            )?;
        }

        uow.commit()
    }

    pub fn get_listing_by_slug(&self, slug: &str) -> Result<Option<ListingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, slug, owner_id, category_id, title, description, item_name, quantity,
                        buy_it_now_price, starting_bid, reserve_price, min_bid_increment,
                        end_time, thumbnail_url, created_at
                 FROM listings WHERE slug = ?1",
            )?;

            let row = stmt
                .query_row([slug], |row| {
                    Ok(ListingRow {
                        id: row.get(0)?,
                        slug: row.get(1)?,
                        owner_id: row.get(2)?,
                        category_id: row.get(3)?,
                        title: row.get(4)?,
                        description: row.get(5)?,
                        item_name: row.get(6)?,
                        quantity: row.get(7)?,
                        buy_it_now_price: row.get(8)?,
                        starting_bid: row.get(9)?,
                        reserve_price: row.get(10)?,
                        min_bid_increment: row.get(11)?,
                        end_time: row.get(12)?,
                        thumbnail_url: row.get(13)?,
                        created_at: row.get(14)?,
                        images: Vec::new(),
                    })
                })
                .optional()?;

            let Some(mut listing) = row else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(
                "SELECT url FROM listing_images WHERE listing_id = ?1 ORDER BY position",
            )?;
            listing.images = stmt
                .query_map([&listing.id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(Some(listing))
        })
    }
}

impl UnitOfWork<'_> {
    pub fn create_user(
        &self,
        id: &str,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<()> {
        insert_user(self.conn(), id, username, email, password_hash)
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        query_user(self.conn(), "email", email)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        query_user(self.conn(), "username", username)
    }

    pub fn update_profile(&self, id: &str, changes: &ProfileChanges) -> Result<Option<UserRow>> {
        apply_profile_changes(self.conn(), id, changes)
    }

    pub fn find_reset_token(&self, token: &str) -> Result<Option<ResetTokenRow>> {
        query_reset_token(self.conn(), token)
    }

    /// Returns true if this call removed the token, false if it was already gone.
    pub fn delete_reset_token(&self, token: &str) -> Result<bool> {
        let removed = self
            .conn()
            .execute("DELETE FROM password_reset_tokens WHERE token = ?1", [token])?;
        Ok(removed == 1)
    }

    pub fn update_password_by_email(
        &self,
        email: &str,
        password_hash: &str,
    ) -> Result<Option<UserRow>> {
        let changed = self.conn().execute(
            "UPDATE users
             SET password = ?2, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
             WHERE email = ?1",
            (email, password_hash),
        )?;
        if changed == 0 {
            return Ok(None);
        }
        query_user(self.conn(), "email", email)
    }
}

fn insert_user(
    conn: &Connection,
    id: &str,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO users (id, username, email, password) VALUES (?1, ?2, ?3, ?4)",
        (id, username, email, password_hash),
    )?;
    Ok(())
}

/// Overwrite the profile fields that are `Some`, leaving the rest as is.
fn apply_profile_changes(
    conn: &Connection,
    id: &str,
    changes: &ProfileChanges,
) -> Result<Option<UserRow>> {
    let changed = conn.execute(
        "UPDATE users
         SET username   = COALESCE(?2, username),
             first_name = COALESCE(?3, first_name),
             last_name  = COALESCE(?4, last_name),
             avatar_url = COALESCE(?5, avatar_url),
             updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
         WHERE id = ?1",
        rusqlite::params![
            id,
            changes.username,
            changes.first_name,
            changes.last_name,
            changes.avatar_url
        ],
    )?;
    if changed == 0 {
        return Ok(None);
    }
    query_user(conn, "id", id)
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    // `column` is always one of our own literals, never user input
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                email: row.get(2)?,
                password: row.get(3)?,
                first_name: row.get(4)?,
                last_name: row.get(5)?,
                avatar_url: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_reset_token(conn: &Connection, token: &str) -> Result<Option<ResetTokenRow>> {
    let mut stmt = conn.prepare(
        "SELECT token, email, expires_at, created_at FROM password_reset_tokens WHERE token = ?1",
    )?;

    let row = stmt
        .query_row([token], |row| {
            Ok(ResetTokenRow {
                token: row.get(0)?,
                email: row.get(1)?,
                expires_at: row.get(2)?,
                created_at: row.get(3)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_category(conn: &Connection, id: &str) -> Result<Option<CategoryRow>> {
    let mut stmt =
        conn.prepare("SELECT id, name, slug, parent_id FROM categories WHERE id = ?1")?;
    let row = stmt.query_row([id], category_from_row).optional()?;
    Ok(row)
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<CategoryRow> {
    Ok(CategoryRow {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        parent_id: row.get(3)?,
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

#[cfg(test)]
mod tests {
    use super::*;

    const BICYCLES: &str = "00000000-0000-0000-0000-000000000002";
    const USER_ID: &str = "6b1f6c5e-8f0e-4b8e-9d5e-2f6a1c1d0a01";

    fn db_with_user() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.create_user(USER_ID, "alice", "a@b.com", "hash-1").unwrap();
        db
    }

    fn bike(slug: &str) -> NewListing {
        NewListing {
            id: uuid::Uuid::new_v4().to_string(),
            slug: slug.to_string(),
            owner_id: USER_ID.to_string(),
            category_id: BICYCLES.to_string(),
            title: "Bike".to_string(),
            description: "Good bike".to_string(),
            item_name: "Bike".to_string(),
            quantity: 2,
            buy_it_now_price: Some(50),
            starting_bid: None,
            reserve_price: None,
            min_bid_increment: None,
            end_time: None,
            thumbnail_url: Some("http://img/thumb.png".to_string()),
            images: vec!["http://img/1.png".to_string(), "http://img/2.png".to_string()],
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }

    #[test]
    fn user_lookup_by_each_key() {
        let db = db_with_user();

        assert_eq!(db.get_user_by_email("a@b.com").unwrap().unwrap().username, "alice");
        assert_eq!(db.get_user_by_username("alice").unwrap().unwrap().email, "a@b.com");
        assert!(db.get_user_by_id(USER_ID).unwrap().is_some());
        assert!(db.get_user_by_email("nobody@b.com").unwrap().is_none());

        let account = db.get_user_by_id(USER_ID).unwrap().unwrap().into_account().unwrap();
        assert_eq!(account.id.to_string(), USER_ID);
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let db = db_with_user();
        let err = db.create_user("other", "bob", "a@b.com", "hash-2");
        assert!(err.is_err());
    }

    #[test]
    fn update_profile_keeps_unset_fields() {
        let db = db_with_user();
        db.update_profile(
            USER_ID,
            &ProfileChanges {
                first_name: Some("Alice".into()),
                last_name: Some("Smith".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let row = db
            .update_profile(
                USER_ID,
                &ProfileChanges {
                    username: Some("alice2".into()),
                    last_name: Some("Jones".into()),
                    avatar_url: Some("http://img/a.png".into()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();

        assert_eq!(row.username, "alice2");
        assert_eq!(row.first_name.as_deref(), Some("Alice"));
        assert_eq!(row.last_name.as_deref(), Some("Jones"));
        assert_eq!(row.avatar_url.as_deref(), Some("http://img/a.png"));

        let missing = ProfileChanges {
            first_name: Some("x".into()),
            ..Default::default()
        };
        assert!(db.update_profile("missing", &missing).unwrap().is_none());
    }

    #[test]
    fn user_created_in_unit_of_work_is_visible_after_commit() {
        let db = db_with_user();

        let uow = db.begin().unwrap();
        assert!(uow.get_user_by_email("a@b.com").unwrap().is_some());
        assert!(uow.get_user_by_username("bob").unwrap().is_none());
        uow.create_user("bob-id", "bob", "bob@b.com", "hash-2").unwrap();
        uow.commit().unwrap();
        assert!(db.get_user_by_username("bob").unwrap().is_some());

        let uow = db.begin().unwrap();
        uow.create_user("carol-id", "carol", "carol@b.com", "hash-3").unwrap();
        drop(uow);
        assert!(db.get_user_by_username("carol").unwrap().is_none());
    }

    #[test]
    fn reset_token_delete_reports_whether_it_removed() {
        let db = db_with_user();
        db.create_reset_token("tok", "a@b.com", "2026-01-02T00:00:00.000Z", "2026-01-01T00:00:00.000Z")
            .unwrap();

        let uow = db.begin().unwrap();
        assert!(uow.find_reset_token("tok").unwrap().is_some());
        assert!(uow.delete_reset_token("tok").unwrap());
        assert!(!uow.delete_reset_token("tok").unwrap());
        uow.commit().unwrap();

        assert!(db.find_reset_token("tok").unwrap().is_none());
    }

    #[test]
    fn password_update_and_token_delete_roll_back_together() {
        let db = db_with_user();
        db.create_reset_token("tok", "a@b.com", "2026-01-02T00:00:00.000Z", "2026-01-01T00:00:00.000Z")
            .unwrap();

        {
            let uow = db.begin().unwrap();
            assert!(uow.delete_reset_token("tok").unwrap());
            assert!(uow.update_password_by_email("a@b.com", "hash-2").unwrap().is_some());
            uow.rollback().unwrap();
        }

        assert!(db.find_reset_token("tok").unwrap().is_some());
        assert_eq!(db.get_user_by_email("a@b.com").unwrap().unwrap().password, "hash-1");
    }

    #[test]
    fn update_password_for_unknown_email_changes_nothing() {
        let db = db_with_user();
        let uow = db.begin().unwrap();
        assert!(uow.update_password_by_email("nobody@b.com", "hash").unwrap().is_none());
    }

    #[test]
    fn prune_removes_only_expired_tokens() {
        let db = db_with_user();
        db.create_reset_token("old", "a@b.com", "2026-01-01T00:00:00.000Z", "2025-12-31T00:00:00.000Z")
            .unwrap();
        db.create_reset_token("new", "a@b.com", "2026-01-03T00:00:00.000Z", "2026-01-02T00:00:00.000Z")
            .unwrap();

        let removed = db.prune_expired_reset_tokens("2026-01-02T00:00:00.000Z").unwrap();

        assert_eq!(removed, 1);
        assert!(db.find_reset_token("old").unwrap().is_none());
        assert!(db.find_reset_token("new").unwrap().is_some());
    }

    #[test]
    fn category_path_is_root_first() {
        let db = Database::open_in_memory().unwrap();
        let path = db.category_path(BICYCLES).unwrap();
        let names: Vec<_> = path.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["Vehicles", "Bicycles"]);

        assert!(db.category_path("missing").unwrap().is_empty());
    }

    #[test]
    fn categories_are_listed_by_name() {
        let db = Database::open_in_memory().unwrap();
        let names: Vec<_> = db
            .list_categories()
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn listing_is_stored_with_ordered_images() {
        let db = db_with_user();
        db.create_listing(&bike("bike-abc")).unwrap();

        let row = db.get_listing_by_slug("bike-abc").unwrap().unwrap();
        assert_eq!(row.images, ["http://img/1.png", "http://img/2.png"]);

        let listing = row.into_listing().unwrap();
        assert_eq!(listing.quantity, 2);
        assert_eq!(listing.buy_it_now_price, Some(50));
        assert!(db.get_listing_by_slug("nope").unwrap().is_none());
    }

    #[test]
    fn failed_listing_insert_leaves_no_images() {
        let db = db_with_user();
        db.create_listing(&bike("dup")).unwrap();

        let mut second = bike("dup");
        second.images = vec!["http://img/3.png".to_string()];
        assert!(db.create_listing(&second).is_err());

        let images: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM listing_images", [], |r| r.get(0))?)
            })
            .unwrap();
        assert_eq!(images, 2);
    }
}
