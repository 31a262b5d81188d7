use anyhow::{Result, anyhow};
#[cfg(test)]
use famtree_types::TreeAccess;
use famtree_types::{Role, Tree};
use rusqlite::{Connection, Row};
use tracing::{info, warn};

use super::{OptionalExt, timestamp_from_sql};
use crate::Database;

const TREE_COLUMNS: &str = "t.id, t.owner_id, t.generation_limit, t.created_at";

impl Database {
    // -- Trees --

    /// Create a tree and the owner's access grant together.
    pub fn create_tree(&self, owner_id: i64, generation_limit: i64) -> Result<Tree> {
        let tree_id = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO trees (owner_id, generation_limit) VALUES (?1, ?2)",
                [owner_id, generation_limit],
            )?;
            let tree_id = tx.last_insert_rowid();
            tx.execute(
                "INSERT INTO tree_access (tree_id, user_id, role) VALUES (?1, ?2, ?3)",
                rusqlite::params![tree_id, owner_id, Role::Owner.as_str()],
            )?;
            tx.commit()?;
            Ok(tree_id)
        })?;

        info!(tree_id, owner_id, "Tree created");
        self.get_tree(tree_id)?
            .ok_or_else(|| anyhow!("Tree vanished after insert: {}", tree_id))
    }

    pub fn get_tree(&self, id: i64) -> Result<Option<Tree>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {TREE_COLUMNS} FROM trees t WHERE t.id = ?1"),
                [id],
                map_tree,
            )
            .optional()
        })
    }

    pub fn get_tree_by_owner(&self, owner_id: i64) -> Result<Option<Tree>> {
        self.with_conn(|conn| query_tree_by_owner(conn, owner_id))
    }

    /// Earliest tree the user has a grant on, whatever the role.
    pub fn first_shared_tree(&self, user_id: i64) -> Result<Option<Tree>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {TREE_COLUMNS} FROM trees t
                     JOIN tree_access a ON a.tree_id = t.id
                     WHERE a.user_id = ?1
                     ORDER BY t.id
                     LIMIT 1"
                ),
                [user_id],
                map_tree,
            )
            .optional()
        })
    }

    /// Delete a tree; members, edges, events and grants cascade.
    pub fn delete_tree(&self, tree_id: i64) -> Result<bool> {
        let deleted = self.with_conn_mut(|conn| {
            Ok(conn.execute("DELETE FROM trees WHERE id = ?1", [tree_id])?)
        })?;
        if deleted > 0 {
            info!(tree_id, "Tree deleted");
        }
        Ok(deleted > 0)
    }

    // -- Access grants --

    pub fn get_access_role(&self, tree_id: i64, user_id: i64) -> Result<Option<Role>> {
        self.with_conn(|conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT role FROM tree_access WHERE tree_id = ?1 AND user_id = ?2",
                    [tree_id, user_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(raw.and_then(|r| {
                Role::from_db(&r).or_else(|| {
                    warn!(tree_id, user_id, "Unknown role '{}' in tree_access", r);
                    None
                })
            }))
        })
    }

    /// Insert or overwrite the grant for (tree, user).
    pub fn grant_access(&self, tree_id: i64, user_id: i64, role: Role) -> Result<()> {
        self.with_conn_mut(|conn| upsert_grant(conn, tree_id, user_id, role))
    }

    #[cfg(test)]
    pub fn list_access(&self, tree_id: i64) -> Result<Vec<TreeAccess>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tree_id, user_id, role FROM tree_access WHERE tree_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([tree_id], |row| {
                    Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, String>(2)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .filter_map(|(tree_id, user_id, role)| {
                    Role::from_db(&role).map(|role| TreeAccess { tree_id, user_id, role })
                })
                .collect())
        })
    }

    /// Hand the tree to `new_owner_id`. The previous owner keeps editor access.
    pub fn transfer_ownership(&self, tree_id: i64, new_owner_id: i64) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let old_owner_id: i64 = tx
                .query_row("SELECT owner_id FROM trees WHERE id = ?1", [tree_id], |row| row.get(0))
                .optional()?
                .ok_or_else(|| anyhow!("Tree not found: {}", tree_id))?;

            tx.execute(
                "UPDATE trees SET owner_id = ?1 WHERE id = ?2",
                [new_owner_id, tree_id],
            )?;
            upsert_grant(&tx, tree_id, old_owner_id, Role::Editor)?;
            upsert_grant(&tx, tree_id, new_owner_id, Role::Owner)?;
            tx.commit()?;

            info!(tree_id, old_owner_id, new_owner_id, "Ownership transferred");
            Ok(())
        })
    }
}

fn upsert_grant(conn: &Connection, tree_id: i64, user_id: i64, role: Role) -> Result<()> {
    conn.execute(
        "INSERT INTO tree_access (tree_id, user_id, role) VALUES (?1, ?2, ?3)
         ON CONFLICT(tree_id, user_id) DO UPDATE SET role = excluded.role",
        rusqlite::params![tree_id, user_id, role.as_str()],
    )?;
    Ok(())
}

fn query_tree_by_owner(conn: &Connection, owner_id: i64) -> Result<Option<Tree>> {
    conn.query_row(
        &format!("SELECT {TREE_COLUMNS} FROM trees t WHERE t.owner_id = ?1"),
        [owner_id],
        map_tree,
    )
    .optional()
}

fn map_tree(row: &Row<'_>) -> rusqlite::Result<Tree> {
    let created_at: String = row.get(3)?;
    Ok(Tree {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        generation_limit: row.get(2)?,
        created_at: timestamp_from_sql(&created_at).unwrap_or_default(),
    })
}
