use super::CoreStore;
use crate::{
    complaint::{Complaint, ComplaintStatus, Location, Priority, ResolutionProof},
    error::{CoreError, CoreResult},
    query_planner::{Predicate, QueryPlan},
    types::{from_millis, to_millis, ComplaintId, Timestamp},
};
use rusqlite::{params, params_from_iter, types::Type, OptionalExtension, Row};
use std::str::FromStr;

const COMPLAINT_COLUMNS: &str = "complaint_id, user_id, title, description, category, priority,
    summary, status, lat, lng, address, state_name, state_code, district_name, district_code,
    ward_code, created_at, updated_at, times_reopened, is_escalated, escalation_triggered,
    escalated_at, attachments, duplicate_of, support_count, is_overdue, proof_image_url,
    proof_web_view_link, proof_note, rejection_reason, resolver_id, reporter_phone, locale";

fn conversion_err(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn enum_col<T: FromStr<Err = CoreError>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

fn complaint_row_mapper(row: &Row<'_>) -> rusqlite::Result<Complaint> {
    let attachments: String = row.get(22)?;
    let image_url: Option<String> = row.get(26)?;
    let web_view_link: Option<String> = row.get(27)?;
    let proof_note: Option<String> = row.get(28)?;
    let resolution_proof = if image_url.is_some() || web_view_link.is_some() {
        Some(ResolutionProof {
            image_url,
            web_view_link,
            note: proof_note,
        })
    } else {
        None
    };

    Ok(Complaint {
        complaint_id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        priority: enum_col::<Priority>(row, 5)?,
        summary: row.get(6)?,
        status: enum_col::<ComplaintStatus>(row, 7)?,
        location: Location {
            lat: row.get(8)?,
            lng: row.get(9)?,
            address: row.get(10)?,
            state_name: row.get(11)?,
            state_code: row.get(12)?,
            district_name: row.get(13)?,
            district_code: row.get(14)?,
            ward_code: row.get(15)?,
        },
        created_at: from_millis(row.get(16)?),
        updated_at: from_millis(row.get(17)?),
        times_reopened: row.get::<_, i64>(18)? as u32,
        is_escalated: row.get::<_, i32>(19)? != 0,
        escalation_triggered: row.get::<_, i32>(20)? != 0,
        escalated_at: row.get::<_, Option<i64>>(21)?.map(from_millis),
        attachments: serde_json::from_str(&attachments).map_err(|e| conversion_err(22, e))?,
        duplicate_of: row.get(23)?,
        support_count: row.get::<_, i64>(24)? as u32,
        is_overdue: row.get::<_, i32>(25)? != 0,
        resolution_proof,
        rejection_reason: row.get(29)?,
        resolver_id: row.get(30)?,
        reporter_phone: row.get(31)?,
        locale: row.get(32)?,
    })
}

fn status_placeholders(statuses: &[ComplaintStatus]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Translate one planner predicate into a SQL fragment plus its bind values.
fn predicate_sql(p: &Predicate, binds: &mut Vec<String>) -> String {
    match p {
        Predicate::OwnerIs(user_id) => {
            binds.push(user_id.clone());
            "user_id = ?".into()
        }
        Predicate::WardIs(ward) => {
            binds.push(ward.clone());
            "ward_code = ?".into()
        }
        Predicate::StateNameIs(state) => {
            binds.push(state.clone());
            "state_name = ?".into()
        }
        Predicate::DistrictNameIs(district) => {
            binds.push(district.clone());
            "district_name = ?".into()
        }
        Predicate::DistrictNameIn(districts) if districts.is_empty() => "0".into(),
        Predicate::DistrictNameIn(districts) => {
            binds.extend(districts.iter().cloned());
            format!("district_name IN ({})", vec!["?"; districts.len()].join(", "))
        }
        Predicate::StatusIs(status) => {
            binds.push(status.as_str().to_string());
            "status = ?".into()
        }
        Predicate::PriorityIs(priority) => {
            binds.push(priority.as_str().to_string());
            "priority = ?".into()
        }
    }
}

impl CoreStore {
    // ── Complaint ──────────────────────────────────────────────────

    pub fn insert_complaint(&self, c: &Complaint) -> CoreResult<()> {
        let proof = c.resolution_proof.as_ref();
        self.conn.execute(
            &format!(
                "INSERT INTO complaint ({COMPLAINT_COLUMNS}) VALUES (
                    ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16,
                    ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30,
                    ?31, ?32, ?33)"
            ),
            params![
                &c.complaint_id,
                &c.user_id,
                &c.title,
                &c.description,
                &c.category,
                c.priority.as_str(),
                c.summary.as_deref(),
                c.status.as_str(),
                c.location.lat,
                c.location.lng,
                c.location.address.as_deref(),
                c.location.state_name.as_deref(),
                c.location.state_code.as_deref(),
                c.location.district_name.as_deref(),
                c.location.district_code.as_deref(),
                &c.location.ward_code,
                to_millis(c.created_at),
                to_millis(c.updated_at),
                c.times_reopened as i64,
                c.is_escalated as i32,
                c.escalation_triggered as i32,
                c.escalated_at.map(to_millis),
                serde_json::to_string(&c.attachments)?,
                c.duplicate_of.as_deref(),
                c.support_count as i64,
                c.is_overdue as i32,
                proof.and_then(|p| p.image_url.as_deref()),
                proof.and_then(|p| p.web_view_link.as_deref()),
                proof.and_then(|p| p.note.as_deref()),
                c.rejection_reason.as_deref(),
                c.resolver_id.as_deref(),
                c.reporter_phone.as_deref(),
                &c.locale,
            ],
        )?;
        Ok(())
    }

    pub fn get_complaint(&self, complaint_id: &str) -> CoreResult<Option<Complaint>> {
        self.conn
            .query_row(
                &format!("SELECT {COMPLAINT_COLUMNS} FROM complaint WHERE complaint_id = ?1"),
                params![complaint_id],
                complaint_row_mapper,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Candidates for duplicate linking: latitude band pushed down, statuses
    /// from the duplicate pool, insertion order. Longitude is filtered by the
    /// caller.
    pub fn duplicate_candidates(&self, lat_min: f64, lat_max: f64) -> CoreResult<Vec<Complaint>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMPLAINT_COLUMNS} FROM complaint
             WHERE lat >= ?1 AND lat <= ?2 AND status IN ({})
             ORDER BY rowid ASC",
            status_placeholders(&ComplaintStatus::DUPLICATE_POOL)
        ))?;
        let rows = stmt.query_map(params![lat_min, lat_max], complaint_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Atomic `+1` on a canonical complaint's support counter.
    pub fn increment_support_count(&self, complaint_id: &str) -> CoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE complaint SET support_count = support_count + 1 WHERE complaint_id = ?1",
            params![complaint_id],
        )?;
        if changed == 0 {
            return Err(CoreError::not_found(complaint_id));
        }
        Ok(())
    }

    /// Persist the lifecycle-owned fields of a complaint, provided its stored
    /// status is still `expected`. Priority and category are written only
    /// when `profile_changed` is set. Linking, support and escalation columns
    /// are not written here.
    ///
    /// Zero rows changed means another request moved the complaint after it
    /// was read: `StateConflict`, nothing written.
    pub fn save_lifecycle_fields(
        &self,
        c: &Complaint,
        expected: ComplaintStatus,
        profile_changed: bool,
    ) -> CoreResult<()> {
        let proof = c.resolution_proof.as_ref();
        let (priority, category) = if profile_changed {
            (Some(c.priority.as_str()), Some(c.category.as_str()))
        } else {
            (None, None)
        };
        let changed = self.conn.execute(
            "UPDATE complaint SET
                status = ?1, priority = COALESCE(?2, priority),
                category = COALESCE(?3, category), updated_at = ?4,
                times_reopened = ?5, proof_image_url = ?6, proof_web_view_link = ?7,
                proof_note = ?8, rejection_reason = ?9, resolver_id = ?10
             WHERE complaint_id = ?11 AND status = ?12",
            params![
                c.status.as_str(),
                priority,
                category,
                to_millis(c.updated_at),
                c.times_reopened as i64,
                proof.and_then(|p| p.image_url.as_deref()),
                proof.and_then(|p| p.web_view_link.as_deref()),
                proof.and_then(|p| p.note.as_deref()),
                c.rejection_reason.as_deref(),
                c.resolver_id.as_deref(),
                &c.complaint_id,
                expected.as_str(),
            ],
        )?;
        if changed == 0 {
            return match self.get_complaint(&c.complaint_id)? {
                None => Err(CoreError::not_found(&c.complaint_id)),
                Some(now) => Err(CoreError::conflict(format!(
                    "complaint {} moved to '{}' while this request was in flight",
                    c.complaint_id, now.status
                ))),
            };
        }
        Ok(())
    }

    /// Run a planner-built filter. No ORDER BY and no LIMIT: the planner
    /// owns both.
    pub fn query_complaints(&self, plan: &QueryPlan) -> CoreResult<Vec<Complaint>> {
        let mut binds = Vec::new();
        let clauses: Vec<String> = plan
            .predicates
            .iter()
            .map(|p| predicate_sql(p, &mut binds))
            .collect();
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {COMPLAINT_COLUMNS} FROM complaint{where_sql}"))?;
        let rows = stmt.query_map(params_from_iter(binds.iter()), complaint_row_mapper)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Open, not yet escalated, created at or before `cutoff`.
    pub fn escalation_candidates(&self, cutoff: Timestamp) -> CoreResult<Vec<ComplaintId>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT complaint_id FROM complaint
             WHERE escalation_triggered = 0 AND created_at <= ?1 AND status IN ({})
             ORDER BY rowid ASC",
            status_placeholders(&ComplaintStatus::OPEN)
        ))?;
        let rows = stmt.query_map(params![to_millis(cutoff)], |r| r.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Flag every id as escalated in one transaction. Ids already escalated
    /// by a concurrent sweep are skipped; the ones actually changed are
    /// returned.
    pub fn escalate_complaints(
        &self,
        ids: &[ComplaintId],
        now: Timestamp,
    ) -> CoreResult<Vec<ComplaintId>> {
        let tx = self.conn.unchecked_transaction()?;
        let mut escalated = Vec::with_capacity(ids.len());
        {
            let mut stmt = tx.prepare(
                "UPDATE complaint SET
                    is_overdue = 1, is_escalated = 1, escalation_triggered = 1,
                    escalated_at = ?1, priority = ?2, updated_at = ?1
                 WHERE complaint_id = ?3 AND escalation_triggered = 0",
            )?;
            for id in ids {
                if stmt.execute(params![to_millis(now), Priority::HIGHEST.as_str(), id])? == 1 {
                    escalated.push(id.clone());
                }
            }
        }
        tx.commit()?;
        Ok(escalated)
    }

    pub fn complaint_count(&self) -> CoreResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM complaint", [], |r| r.get(0))?)
    }

    pub fn escalated_count(&self) -> CoreResult<i64> {
        Ok(self.conn.query_row(
            "SELECT COUNT(*) FROM complaint WHERE escalation_triggered = 1",
            [],
            |r| r.get(0),
        )?)
    }

    pub fn open_complaint_count(&self) -> CoreResult<i64> {
        Ok(self.conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM complaint WHERE status IN ({})",
                status_placeholders(&ComplaintStatus::OPEN)
            ),
            [],
            |r| r.get(0),
        )?)
    }
}
