use anyhow::{Result, anyhow};
use chrono::Utc;
use famtree_types::{Gender, Member, RelationType, Relationship};
use rusqlite::{Connection, Row, ToSql};
use tracing::{debug, warn};

use super::{OptionalExt, date_from_sql, date_to_sql, timestamp_from_sql, timestamp_to_sql};
use crate::Database;
use crate::models::{MemberUpdate, NewMember};

const MEMBER_COLUMNS: &str = "id, tree_id, name, dob, gender, phone, generation_level, \
     is_locked, locked_by, lock_expires_at";

impl Database {
    // -- Members --

    pub fn create_member(&self, new: &NewMember<'_>) -> Result<Member> {
        let id = self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO members (tree_id, name, dob, gender, phone, generation_level)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    new.tree_id,
                    new.name,
                    date_to_sql(new.dob),
                    new.gender.as_str(),
                    new.phone,
                    new.generation_level,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        debug!(member_id = id, tree_id = new.tree_id, "Member created");
        self.get_member(id)?
            .ok_or_else(|| anyhow!("Member vanished after insert: {}", id))
    }

    pub fn get_member(&self, id: i64) -> Result<Option<Member>> {
        self.with_conn(|conn| query_member(conn, id))
    }

    pub fn list_members(&self, tree_id: i64) -> Result<Vec<Member>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEMBER_COLUMNS} FROM members WHERE tree_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map([tree_id], map_member)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Apply field assignments in order; returns the updated member.
    pub fn update_member(&self, id: i64, updates: &[MemberUpdate]) -> Result<Option<Member>> {
        if updates.is_empty() {
            return self.get_member(id);
        }

        self.with_conn_mut(|conn| {
            let mut assignments = Vec::with_capacity(updates.len() + 1);
            let mut values: Vec<Box<dyn ToSql>> = Vec::with_capacity(updates.len() + 2);
            for update in updates {
                let (column, value): (&str, Box<dyn ToSql>) = match update {
                    MemberUpdate::Name(name) => ("name", Box::new(name.clone())),
                    MemberUpdate::Dob(dob) => ("dob", Box::new(date_to_sql(*dob))),
                    MemberUpdate::Gender(gender) => ("gender", Box::new(gender.as_str())),
                    MemberUpdate::Phone(phone) => ("phone", Box::new(phone.clone())),
                    MemberUpdate::GenerationLevel(level) => ("generation_level", Box::new(*level)),
                };
                values.push(value);
                assignments.push(format!("{} = ?{}", column, values.len()));
            }
            values.push(Box::new(timestamp_to_sql(Utc::now())));
            assignments.push(format!("updated_at = ?{}", values.len()));
            values.push(Box::new(id));

            let sql = format!(
                "UPDATE members SET {} WHERE id = ?{}",
                assignments.join(", "),
                values.len()
            );
            let params: Vec<&dyn ToSql> = values.iter().map(|v| v.as_ref()).collect();
            conn.execute(&sql, params.as_slice())?;
            Ok(())
        })?;

        self.get_member(id)
    }

    // -- Relationships --

    /// Insert one edge. An identical edge already present is left alone.
    pub fn add_relationship(
        &self,
        tree_id: i64,
        parent_id: i64,
        child_id: i64,
        relation_type: RelationType,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO relationships (tree_id, parent_id, child_id, relation_type)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![tree_id, parent_id, child_id, relation_type.as_str()],
            )?;
            Ok(())
        })
    }

    pub fn list_relationships(&self, tree_id: i64) -> Result<Vec<Relationship>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, tree_id, parent_id, child_id, relation_type
                 FROM relationships WHERE tree_id = ?1 ORDER BY id",
            )?;
            let rows = stmt
                .query_map([tree_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            let rels = rows
                .into_iter()
                .filter_map(|(id, tree_id, parent_id, child_id, raw)| {
                    let Some(relation_type) = RelationType::from_stored(raw.as_deref()) else {
                        warn!(relationship_id = id, "Skipping relationship with unknown type {:?}", raw);
                        return None;
                    };
                    Some(Relationship { id, tree_id, parent_id, child_id, relation_type })
                })
                .collect();
            Ok(rels)
        })
    }

    /// Ids of the member's recorded parents (lineage edges only).
    pub fn get_parent_ids(&self, tree_id: i64, child_id: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT parent_id FROM relationships
                 WHERE tree_id = ?1 AND child_id = ?2
                   AND (relation_type = 'parent' OR relation_type IS NULL OR TRIM(relation_type) = '')
                 ORDER BY id",
            )?;
            let ids = stmt
                .query_map([tree_id, child_id], |row| row.get::<_, i64>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(ids)
        })
    }
}

pub(super) fn query_member(conn: &Connection, id: i64) -> Result<Option<Member>> {
    conn.query_row(
        &format!("SELECT {MEMBER_COLUMNS} FROM members WHERE id = ?1"),
        [id],
        map_member,
    )
    .optional()
}

fn map_member(row: &Row<'_>) -> rusqlite::Result<Member> {
    let id: i64 = row.get(0)?;
    let dob: Option<String> = row.get(3)?;
    let gender: String = row.get(4)?;
    let expires: Option<String> = row.get(9)?;

    Ok(Member {
        id,
        tree_id: row.get(1)?,
        name: row.get(2)?,
        dob: dob.as_deref().and_then(|raw| {
            date_from_sql(raw)
                .map_err(|e| warn!(member_id = id, "{}", e))
                .ok()
        }),
        gender: Gender::from_db(&gender).unwrap_or_else(|| {
            warn!(member_id = id, "Unknown gender '{}', using other", gender);
            Gender::Other
        }),
        phone: row.get(5)?,
        generation_level: row.get(6)?,
        is_locked: row.get(7)?,
        locked_by: row.get(8)?,
        lock_expires_at: expires.as_deref().and_then(timestamp_from_sql),
    })
}
