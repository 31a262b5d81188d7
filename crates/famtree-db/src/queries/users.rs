use anyhow::Result;
use rusqlite::{Connection, Row};

use super::OptionalExt;
use crate::Database;
use crate::models::UserRow;

const USER_COLUMNS: &str = "id, phone, name, current_state, state_data, created_at";

impl Database {
    pub fn get_user_by_phone(&self, phone: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_phone(conn, phone))
    }

    /// Users are created lazily the first time a phone number shows up.
    pub fn get_or_create_user(&self, phone: &str) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            conn.execute("INSERT OR IGNORE INTO users (phone) VALUES (?1)", [phone])?;
            query_user_by_phone(conn, phone)?
                .ok_or_else(|| anyhow::anyhow!("User vanished after insert: {}", phone))
        })
    }

    /// Replace the user's dialog state and context in one statement.
    pub fn save_dialog_state(&self, user_id: i64, state: &str, data: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "UPDATE users SET current_state = ?1, state_data = ?2 WHERE id = ?3",
                rusqlite::params![state, data, user_id],
            )?;
            Ok(())
        })
    }
}

fn query_user_by_phone(conn: &Connection, phone: &str) -> Result<Option<UserRow>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE phone = ?1"),
        [phone],
        map_user,
    )
    .optional()
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        phone: row.get(1)?,
        name: row.get(2)?,
        current_state: row.get(3)?,
        state_data: row.get(4)?,
        created_at: row.get(5)?,
    })
}
