use anyhow::Result;
use chrono::{Duration, Utc};
use famtree_db::Database;

/// Five minutes.
pub const DEFAULT_LOCK_TTL_SECS: i64 = 300;

/// Advisory, time-boxed edit locks on members.
///
/// Only the dialog engine consults these; the store itself will accept
/// writes regardless. Expired locks are cleared lazily when inspected.
#[derive(Debug, Clone, Copy)]
pub struct LockManager {
    ttl: Duration,
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_LOCK_TTL_SECS))
    }
}

impl LockManager {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Grant or renew. `false` when another user holds a live lock.
    pub fn acquire(&self, db: &Database, member_id: i64, user_id: i64) -> Result<bool> {
        db.acquire_member_lock(member_id, user_id, self.ttl, Utc::now())
    }

    /// `false` if `user_id` was not the holder.
    pub fn release(&self, db: &Database, member_id: i64, user_id: i64) -> Result<bool> {
        db.release_member_lock(member_id, user_id)
    }

    pub fn is_locked(&self, db: &Database, member_id: i64) -> Result<bool> {
        Ok(self.holder(db, member_id)?.is_some())
    }

    pub fn holder(&self, db: &Database, member_id: i64) -> Result<Option<i64>> {
        db.active_lock_holder(member_id, Utc::now())
    }

    /// Whether `user_id` still holds a live lock. A lock lost to expiry
    /// reads as `false`.
    pub fn holds(&self, db: &Database, member_id: i64, user_id: i64) -> Result<bool> {
        Ok(self.holder(db, member_id)? == Some(user_id))
    }
}
