use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use famtree_types::Event;

use super::{date_from_sql, date_to_sql};
use crate::Database;

impl Database {
    // -- Events --

    pub fn add_event(
        &self,
        member_id: i64,
        event_type: &str,
        event_date: NaiveDate,
        description: Option<&str>,
    ) -> Result<Event> {
        let id = self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO events (member_id, event_type, event_date, description)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![member_id, event_type, date_to_sql(event_date), description],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(Event {
            id,
            member_id,
            event_type: event_type.to_string(),
            event_date,
            description: description.map(str::to_string),
        })
    }

    /// A member's events, earliest first.
    pub fn list_events(&self, member_id: i64) -> Result<Vec<Event>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, member_id, event_type, event_date, description
                 FROM events WHERE member_id = ?1
                 ORDER BY event_date, id",
            )?;
            let rows = stmt
                .query_map([member_id], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter()
                .map(|(id, member_id, event_type, date, description)| {
                    Ok(Event {
                        id,
                        member_id,
                        event_type,
                        event_date: date_from_sql(&date)
                            .map_err(|e| anyhow!("Event {}: {}", id, e))?,
                        description,
                    })
                })
                .collect()
        })
    }
}
