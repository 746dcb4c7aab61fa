use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| {
            r.get(0)
        })?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                username    TEXT NOT NULL UNIQUE,
                email       TEXT NOT NULL UNIQUE,
                password    TEXT NOT NULL,
                first_name  TEXT,
                last_name   TEXT,
                avatar_url  TEXT,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE TABLE password_reset_tokens (
                token       TEXT PRIMARY KEY,
                email       TEXT NOT NULL,
                expires_at  TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_reset_tokens_expiry
                ON password_reset_tokens(expires_at);

            CREATE TABLE categories (
                id          TEXT PRIMARY KEY,
                name        TEXT NOT NULL,
                slug        TEXT NOT NULL UNIQUE,
                parent_id   TEXT REFERENCES categories(id)
            );

            CREATE TABLE listings (
                id                  TEXT PRIMARY KEY,
                slug                TEXT NOT NULL UNIQUE,
                owner_id            TEXT NOT NULL REFERENCES users(id),
                category_id         TEXT NOT NULL REFERENCES categories(id),
                title               TEXT NOT NULL,
                description         TEXT NOT NULL,
                item_name           TEXT NOT NULL,
                quantity            INTEGER NOT NULL DEFAULT 1,
                buy_it_now_price    INTEGER,
                starting_bid        INTEGER,
                reserve_price       INTEGER,
                min_bid_increment   INTEGER,
                end_time            TEXT,
                thumbnail_url       TEXT,
                created_at          TEXT NOT NULL,
                CHECK (buy_it_now_price IS NOT NULL OR starting_bid IS NOT NULL)
            );

            CREATE TABLE listing_images (
                listing_id  TEXT NOT NULL REFERENCES listings(id) ON DELETE CASCADE,
                position    INTEGER NOT NULL,
                url         TEXT NOT NULL,
                PRIMARY KEY (listing_id, position)
            );

            CREATE INDEX idx_listings_owner
                ON listings(owner_id, created_at);

            -- Seed the category tree
            INSERT OR IGNORE INTO categories (id, name, slug, parent_id) VALUES
                ('00000000-0000-0000-0000-000000000001', 'Vehicles', 'vehicles', NULL),
                ('00000000-0000-0000-0000-000000000002', 'Bicycles', 'bicycles', '00000000-0000-0000-0000-000000000001'),
                ('00000000-0000-0000-0000-000000000003', 'Cars', 'cars', '00000000-0000-0000-0000-000000000001'),
                ('00000000-0000-0000-0000-000000000004', 'Electronics', 'electronics', NULL),
                ('00000000-0000-0000-0000-000000000005', 'Phones', 'phones', '00000000-0000-0000-0000-000000000004'),
                ('00000000-0000-0000-0000-000000000006', 'Collectibles', 'collectibles', NULL);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let categories: i64 = conn
            .query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))
            .unwrap();
        assert_eq!(categories, 6);
    }

    #[test]
    fn listing_without_any_price_is_rejected_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute(
            "INSERT INTO users (id, username, email, password) VALUES ('u1', 'alice', 'a@b.com', 'x')",
            [],
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO listings (id, slug, owner_id, category_id, title, description, item_name, created_at)
             VALUES ('l1', 'bike', 'u1', '00000000-0000-0000-0000-000000000002', 'Bike', 'Good', 'Bike', '2026-01-01T00:00:00.000Z')",
            [],
        );
        assert!(result.is_err());
    }
}
