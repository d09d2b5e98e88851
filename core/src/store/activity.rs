//! Activity log queries. Insert and read only.

use super::CoreStore;
use crate::{
    activity::{ActivityKind, ActivityLogEntry},
    error::CoreResult,
    types::{from_millis, to_millis},
};
use rusqlite::{params, types::Type};

impl CoreStore {
    // ── Activity log ───────────────────────────────────────────────

    /// Append one entry. Returns the assigned sequence number.
    pub fn append_activity(&self, entry: &ActivityLogEntry) -> CoreResult<i64> {
        self.conn.execute(
            "INSERT INTO activity_log (complaint_id, kind, actor_id, actor_role, meta, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                &entry.complaint_id,
                entry.kind.as_str(),
                &entry.actor_id,
                &entry.actor_role,
                serde_json::to_string(&entry.meta)?,
                entry.note.as_deref(),
                to_millis(entry.timestamp),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Entries for one complaint, oldest first.
    pub fn activity_for_complaint(&self, complaint_id: &str) -> CoreResult<Vec<ActivityLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT seq, complaint_id, kind, actor_id, actor_role, meta, note, created_at
             FROM activity_log WHERE complaint_id = ?1
             ORDER BY seq ASC",
        )?;
        let entries = stmt
            .query_map(params![complaint_id], |row| {
                let kind: String = row.get(2)?;
                let meta: String = row.get(5)?;
                Ok(ActivityLogEntry {
                    seq: Some(row.get(0)?),
                    complaint_id: row.get(1)?,
                    kind: ActivityKind::parse(&kind).ok_or_else(|| {
                        rusqlite::Error::InvalidColumnType(2, kind.clone(), Type::Text)
                    })?,
                    actor_id: row.get(3)?,
                    actor_role: row.get(4)?,
                    meta: serde_json::from_str(&meta).map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                    })?,
                    note: row.get(6)?,
                    timestamp: from_millis(row.get(7)?),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn activity_count(&self, complaint_id: &str) -> CoreResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM activity_log WHERE complaint_id = ?1",
            params![complaint_id],
            |r| r.get(0),
        )?)
    }
}
