use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use rusqlite::Connection;
use tracing::debug;

use super::members::query_member;
use super::timestamp_to_sql;
use crate::Database;

impl Database {
    // -- Member edit locks --
    //
    // All three take `now` from the caller so expiry can be driven in tests.

    /// Grant or renew the lock for `user_id`. Fails only while another user
    /// holds an unexpired lock, or when the member does not exist.
    pub fn acquire_member_lock(
        &self,
        member_id: i64,
        user_id: i64,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let Some(member) = query_member(conn, member_id)? else {
                return Ok(false);
            };

            let held_elsewhere = member.is_locked
                && member.locked_by != Some(user_id)
                && member.lock_expires_at.is_some_and(|exp| exp > now);
            if held_elsewhere {
                return Ok(false);
            }

            conn.execute(
                "UPDATE members SET is_locked = 1, locked_by = ?1, lock_expires_at = ?2 WHERE id = ?3",
                rusqlite::params![user_id, timestamp_to_sql(now + ttl), member_id],
            )?;
            debug!(member_id, user_id, "Member lock granted");
            Ok(true)
        })
    }

    /// Clear the lock if `user_id` holds it. Returns whether anything changed.
    pub fn release_member_lock(&self, member_id: i64, user_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let cleared = conn.execute(
                "UPDATE members SET is_locked = 0, locked_by = NULL, lock_expires_at = NULL
                 WHERE id = ?1 AND is_locked = 1 AND locked_by = ?2",
                [member_id, user_id],
            )?;
            if cleared > 0 {
                debug!(member_id, user_id, "Member lock released");
            }
            Ok(cleared > 0)
        })
    }

    /// Current holder of an unexpired lock. A stale lock is cleared on the way.
    pub fn active_lock_holder(&self, member_id: i64, now: DateTime<Utc>) -> Result<Option<i64>> {
        self.with_conn_mut(|conn| {
            let Some(member) = query_member(conn, member_id)? else {
                return Ok(None);
            };
            if !member.is_locked {
                return Ok(None);
            }
            if member.lock_expires_at.is_some_and(|exp| exp > now) {
                return Ok(member.locked_by);
            }

            clear_lock(conn, member_id)?;
            debug!(member_id, "Expired member lock cleared");
            Ok(None)
        })
    }
}

fn clear_lock(conn: &Connection, member_id: i64) -> Result<()> {
    conn.execute(
        "UPDATE members SET is_locked = 0, locked_by = NULL, lock_expires_at = NULL WHERE id = ?1",
        [member_id],
    )?;
    Ok(())
}
