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
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                phone           TEXT NOT NULL UNIQUE,
                name            TEXT,
                current_state   TEXT,
                state_data      TEXT,
                created_at      TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE trees (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id            INTEGER NOT NULL UNIQUE REFERENCES users(id),
                generation_limit    INTEGER NOT NULL DEFAULT 4,
                created_at          TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE tree_access (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                tree_id     INTEGER NOT NULL REFERENCES trees(id) ON DELETE CASCADE,
                user_id     INTEGER NOT NULL REFERENCES users(id),
                role        TEXT NOT NULL DEFAULT 'viewer',
                UNIQUE(tree_id, user_id)
            );

            CREATE INDEX idx_tree_access_user ON tree_access(user_id);

            CREATE TABLE members (
                id                  INTEGER PRIMARY KEY AUTOINCREMENT,
                tree_id             INTEGER NOT NULL REFERENCES trees(id) ON DELETE CASCADE,
                name                TEXT NOT NULL,
                dob                 TEXT,
                gender              TEXT NOT NULL,
                phone               TEXT,
                generation_level    INTEGER NOT NULL,
                is_locked           INTEGER NOT NULL DEFAULT 0,
                locked_by           INTEGER REFERENCES users(id) ON DELETE SET NULL,
                lock_expires_at     TEXT,
                created_at          TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at          TEXT
            );

            CREATE INDEX idx_members_tree ON members(tree_id);

            CREATE TABLE relationships (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                tree_id         INTEGER NOT NULL REFERENCES trees(id) ON DELETE CASCADE,
                parent_id       INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
                child_id        INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
                relation_type   TEXT DEFAULT 'parent',
                UNIQUE(parent_id, child_id, relation_type)
            );

            CREATE INDEX idx_relationships_tree ON relationships(tree_id);
            CREATE INDEX idx_relationships_child ON relationships(child_id);

            CREATE TABLE events (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                member_id       INTEGER NOT NULL REFERENCES members(id) ON DELETE CASCADE,
                event_type      TEXT NOT NULL,
                event_date      TEXT NOT NULL,
                description     TEXT
            );

            CREATE INDEX idx_events_member ON events(member_id, event_date);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
