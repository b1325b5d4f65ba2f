//! Application queries and the versioned status write

use rusqlite::{params, params_from_iter, types::Value, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;

use super::{
    now_string, parse_col, parse_datetime, parse_opt_col, Application, ApplicationEvent,
    ApplicationFilter,
};
use crate::core::error::{PortalError, PortalResult};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::status::ApplicationStatus;

const APPLICATION_SELECT: &str = r#"SELECT a.rowid, a.id,
       a.student_id, s.username, s.name,
       a.internship_id, i.title, c.name,
       a.instructor_id, ins.username,
       a.supervisor_id, sup.username,
       a.status, a.stopped_at, a.version, a.statement,
       a.instructor_feedback, a.staff_feedback, a.company_note,
       a.created, a.updated
FROM applications a
JOIN users s ON s.id = a.student_id
JOIN internships i ON i.id = a.internship_id
JOIN companies c ON c.id = i.company_id
JOIN users ins ON ins.id = a.instructor_id
LEFT JOIN users sup ON sup.id = a.supervisor_id"#;

fn map_application(row: &Row<'_>) -> rusqlite::Result<Application> {
    Ok(Application {
        row: row.get(0)?,
        id: parse_col(row, 1)?,
        student_id: parse_col(row, 2)?,
        student_username: row.get(3)?,
        student_name: row.get(4)?,
        internship_id: parse_col(row, 5)?,
        internship_title: row.get(6)?,
        company_name: row.get(7)?,
        instructor_id: parse_col(row, 8)?,
        instructor_username: row.get(9)?,
        supervisor_id: parse_opt_col(row, 10)?,
        supervisor_username: row.get(11)?,
        status: parse_col(row, 12)?,
        stopped_at: parse_opt_col(row, 13)?,
        version: row.get(14)?,
        statement: row.get(15)?,
        instructor_feedback: row.get(16)?,
        staff_feedback: row.get(17)?,
        company_note: row.get(18)?,
        created: parse_datetime(row.get(19)?),
        updated: parse_datetime(row.get(20)?),
    })
}

/// Insert a new application in `pending_instructor` and log its creation.
pub fn insert(
    conn: &Connection,
    student_id: &EntityId,
    internship_id: &EntityId,
    instructor_id: &EntityId,
    statement: &str,
) -> PortalResult<EntityId> {
    let open: Option<String> = conn
        .query_row(
            "SELECT id FROM applications
             WHERE student_id = ?1 AND internship_id = ?2
               AND status NOT IN ('completed', 'rejected', 'withdrawn')",
            params![student_id.to_string(), internship_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(existing) = open {
        return Err(PortalError::validation(format!(
            "Student already has an open application for this internship ({})",
            existing
        )));
    }

    let id = EntityId::new(EntityPrefix::App);
    let now = now_string();
    let status = ApplicationStatus::PendingInstructor;
    conn.execute(
        "INSERT INTO applications (id, student_id, internship_id, instructor_id, status, version, statement, created, updated)
         VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?7, ?7)",
        params![
            id.to_string(),
            student_id.to_string(),
            internship_id.to_string(),
            instructor_id.to_string(),
            status.as_str(),
            statement.trim(),
            now
        ],
    )?;
    append_event(conn, &id, None, status, student_id, Some("submitted"))?;
    Ok(id)
}

pub fn get(conn: &Connection, id: &EntityId) -> PortalResult<Application> {
    conn.query_row(
        &format!("{APPLICATION_SELECT} WHERE a.id = ?1"),
        params![id.to_string()],
        map_application,
    )
    .optional()?
    .ok_or_else(|| PortalError::not_found("application", id.to_string()))
}

/// Resolve a full ID, `APP@N` or ID prefix and load the application
pub fn resolve(conn: &Connection, input: &str) -> PortalResult<Application> {
    let id = super::resolve(conn, EntityPrefix::App, input)?;
    get(conn, &id)
}

/// List applications matching every set field of the filter, newest first
pub fn list(conn: &Connection, filter: &ApplicationFilter) -> PortalResult<Vec<Application>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(status) = filter.status {
        clauses.push("a.status = ?");
        values.push(Value::Text(status.as_str().to_string()));
    }
    if let Some(ref id) = filter.student_id {
        clauses.push("a.student_id = ?");
        values.push(Value::Text(id.to_string()));
    }
    if let Some(ref id) = filter.instructor_id {
        clauses.push("a.instructor_id = ?");
        values.push(Value::Text(id.to_string()));
    }
    if let Some(ref id) = filter.supervisor_id {
        clauses.push("a.supervisor_id = ?");
        values.push(Value::Text(id.to_string()));
    }
    if let Some(ref id) = filter.committee_member_id {
        clauses.push(
            "EXISTS (SELECT 1 FROM committee_assignments ca
                     WHERE ca.application_id = a.id AND ca.member_id = ? AND ca.active = 1)",
        );
        values.push(Value::Text(id.to_string()));
    }
    if let Some(ref id) = filter.internship_id {
        clauses.push("a.internship_id = ?");
        values.push(Value::Text(id.to_string()));
    }

    let mut sql = APPLICATION_SELECT.to_string();
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY a.created DESC, a.rowid DESC");

    let mut stmt = conn.prepare(&sql)?;
    let apps = stmt
        .query_map(params_from_iter(values), map_application)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(apps)
}

/// Move an application from `from` to `to`, provided nobody else has touched
/// it since `expected_version` was read. Rejected and withdrawn applications
/// remember the status they stopped at. Appends the transition to the log.
pub fn update_status(
    conn: &Connection,
    id: &EntityId,
    expected_version: i64,
    from: ApplicationStatus,
    to: ApplicationStatus,
    actor_id: &EntityId,
    note: Option<&str>,
) -> PortalResult<()> {
    let stopped_at = matches!(to, ApplicationStatus::Rejected | ApplicationStatus::Withdrawn)
        .then(|| from.as_str());

    let changed = conn.execute(
        "UPDATE applications
         SET status = ?1, stopped_at = COALESCE(?2, stopped_at), version = version + 1, updated = ?3
         WHERE id = ?4 AND version = ?5 AND status = ?6",
        params![
            to.as_str(),
            stopped_at,
            now_string(),
            id.to_string(),
            expected_version,
            from.as_str()
        ],
    )?;
    if changed == 0 {
        return Err(PortalError::Conflict {
            expected: expected_version,
        });
    }

    append_event(conn, id, Some(from), to, actor_id, note)?;
    Ok(())
}

/// Bump the version for a field edit that does not change the status
fn touch(conn: &Connection, id: &EntityId, expected_version: i64, set: &str, value: Option<&str>) -> PortalResult<()> {
    let changed = conn.execute(
        &format!(
            "UPDATE applications SET {set} = ?1, version = version + 1, updated = ?2
             WHERE id = ?3 AND version = ?4"
        ),
        params![value, now_string(), id.to_string(), expected_version],
    )?;
    if changed == 0 {
        return Err(PortalError::Conflict {
            expected: expected_version,
        });
    }
    Ok(())
}

pub fn set_supervisor(
    conn: &Connection,
    id: &EntityId,
    expected_version: i64,
    supervisor_id: &EntityId,
) -> PortalResult<()> {
    touch(conn, id, expected_version, "supervisor_id", Some(&supervisor_id.to_string()))
}

pub fn set_instructor_feedback(
    conn: &Connection,
    id: &EntityId,
    expected_version: i64,
    feedback: Option<&str>,
) -> PortalResult<()> {
    touch(conn, id, expected_version, "instructor_feedback", feedback)
}

pub fn set_staff_feedback(
    conn: &Connection,
    id: &EntityId,
    expected_version: i64,
    feedback: Option<&str>,
) -> PortalResult<()> {
    touch(conn, id, expected_version, "staff_feedback", feedback)
}

pub fn set_company_note(
    conn: &Connection,
    id: &EntityId,
    expected_version: i64,
    note: Option<&str>,
) -> PortalResult<()> {
    touch(conn, id, expected_version, "company_note", note)
}

// =========================================================================
// Event log
// =========================================================================

fn append_event(
    conn: &Connection,
    id: &EntityId,
    from: Option<ApplicationStatus>,
    to: ApplicationStatus,
    actor_id: &EntityId,
    note: Option<&str>,
) -> PortalResult<()> {
    conn.execute(
        "INSERT INTO application_events (application_id, from_status, to_status, actor_id, note, at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            from.map(|s| s.as_str()),
            to.as_str(),
            actor_id.to_string(),
            note,
            now_string()
        ],
    )?;
    Ok(())
}

/// Status history of an application, oldest first
pub fn events(conn: &Connection, id: &EntityId) -> PortalResult<Vec<ApplicationEvent>> {
    let mut stmt = conn.prepare(
        "SELECT e.seq, e.application_id, e.from_status, e.to_status, u.username, e.note, e.at
         FROM application_events e
         JOIN users u ON u.id = e.actor_id
         WHERE e.application_id = ?1
         ORDER BY e.seq",
    )?;
    let events = stmt
        .query_map(params![id.to_string()], |row| {
            Ok(ApplicationEvent {
                seq: row.get(0)?,
                application_id: parse_col(row, 1)?,
                from_status: parse_opt_col(row, 2)?,
                to_status: parse_col(row, 3)?,
                actor_username: row.get(4)?,
                note: row.get(5)?,
                at: parse_datetime(row.get(6)?),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// Number of applications per status, over every status
pub fn count_by_status(conn: &Connection) -> PortalResult<BTreeMap<ApplicationStatus, usize>> {
    let mut counts: BTreeMap<ApplicationStatus, usize> = ApplicationStatus::all()
        .iter()
        .map(|s| (*s, 0))
        .collect();

    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM applications GROUP BY status")?;
    let rows = stmt
        .query_map([], |row| {
            let status: ApplicationStatus = parse_col(row, 0)?;
            let n: i64 = row.get(1)?;
            Ok((status, n as usize))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for (status, n) in rows {
        counts.insert(status, n);
    }
    Ok(counts)
}
