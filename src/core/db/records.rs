//! Generated document and supervisor visit queries

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};

use super::{now_string, parse_col, parse_datetime, DocumentKind, DocumentRecord, Visit, VisitStatus};
use crate::core::error::{PortalError, PortalResult};
use crate::core::identity::{EntityId, EntityPrefix};

const DOCUMENT_SELECT: &str = r#"SELECT d.rowid, d.id, d.application_id, d.kind, d.file_path, d.sha256, u.username, d.created
FROM documents d
JOIN users u ON u.id = d.generated_by"#;

fn map_document(row: &Row<'_>) -> rusqlite::Result<DocumentRecord> {
    let path: String = row.get(4)?;
    Ok(DocumentRecord {
        row: row.get(0)?,
        id: parse_col(row, 1)?,
        application_id: parse_col(row, 2)?,
        kind: parse_col(row, 3)?,
        file_path: PathBuf::from(path),
        sha256: row.get(5)?,
        generated_by: row.get(6)?,
        created: parse_datetime(row.get(7)?),
    })
}

/// Record a rendered document. The ID is chosen by the caller, since it is
/// part of the output file name.
pub fn insert_document(
    conn: &Connection,
    id: &EntityId,
    application_id: &EntityId,
    kind: DocumentKind,
    file_path: &Path,
    sha256: &str,
    generated_by: &EntityId,
) -> PortalResult<()> {
    conn.execute(
        "INSERT INTO documents (id, application_id, kind, file_path, sha256, generated_by, created)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id.to_string(),
            application_id.to_string(),
            kind.as_str(),
            file_path.to_string_lossy(),
            sha256,
            generated_by.to_string(),
            now_string()
        ],
    )?;
    Ok(())
}

pub fn get_document(conn: &Connection, id: &EntityId) -> PortalResult<DocumentRecord> {
    conn.query_row(
        &format!("{DOCUMENT_SELECT} WHERE d.id = ?1"),
        params![id.to_string()],
        map_document,
    )
    .optional()?
    .ok_or_else(|| PortalError::not_found("document", id.to_string()))
}

pub fn list_documents(conn: &Connection, application_id: &EntityId) -> PortalResult<Vec<DocumentRecord>> {
    let mut stmt = conn.prepare(&format!(
        "{DOCUMENT_SELECT} WHERE d.application_id = ?1 ORDER BY d.created, d.rowid"
    ))?;
    let docs = stmt
        .query_map(params![application_id.to_string()], map_document)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(docs)
}

/// Most recent document of a kind, if one was generated
pub fn latest_document(
    conn: &Connection,
    application_id: &EntityId,
    kind: DocumentKind,
) -> PortalResult<Option<DocumentRecord>> {
    Ok(conn
        .query_row(
            &format!(
                "{DOCUMENT_SELECT} WHERE d.application_id = ?1 AND d.kind = ?2 ORDER BY d.rowid DESC LIMIT 1"
            ),
            params![application_id.to_string(), kind.as_str()],
            map_document,
        )
        .optional()?)
}

// =========================================================================
// Visits
// =========================================================================

const VISIT_SELECT: &str = r#"SELECT v.rowid, v.id, v.application_id, v.supervisor_id, u.username,
       v.scheduled_for, v.location, v.status, v.notes, v.created
FROM visits v
JOIN users u ON u.id = v.supervisor_id"#;

fn map_visit(row: &Row<'_>) -> rusqlite::Result<Visit> {
    Ok(Visit {
        row: row.get(0)?,
        id: parse_col(row, 1)?,
        application_id: parse_col(row, 2)?,
        supervisor_id: parse_col(row, 3)?,
        supervisor_username: row.get(4)?,
        scheduled_for: parse_datetime(row.get(5)?),
        location: row.get(6)?,
        status: parse_col(row, 7)?,
        notes: row.get(8)?,
        created: parse_datetime(row.get(9)?),
    })
}

pub fn insert_visit(
    conn: &Connection,
    application_id: &EntityId,
    supervisor_id: &EntityId,
    scheduled_for: DateTime<Utc>,
    location: &str,
) -> PortalResult<EntityId> {
    if location.trim().is_empty() {
        return Err(PortalError::validation("Visit location must not be empty"));
    }

    let id = EntityId::new(EntityPrefix::Vis);
    conn.execute(
        "INSERT INTO visits (id, application_id, supervisor_id, scheduled_for, location, status, created)
         VALUES (?1, ?2, ?3, ?4, ?5, 'scheduled', ?6)",
        params![
            id.to_string(),
            application_id.to_string(),
            supervisor_id.to_string(),
            scheduled_for.to_rfc3339(),
            location.trim(),
            now_string()
        ],
    )?;
    Ok(id)
}

pub fn get_visit(conn: &Connection, id: &EntityId) -> PortalResult<Visit> {
    conn.query_row(
        &format!("{VISIT_SELECT} WHERE v.id = ?1"),
        params![id.to_string()],
        map_visit,
    )
    .optional()?
    .ok_or_else(|| PortalError::not_found("visit", id.to_string()))
}

pub fn resolve_visit(conn: &Connection, input: &str) -> PortalResult<Visit> {
    let id = super::resolve(conn, EntityPrefix::Vis, input)?;
    get_visit(conn, &id)
}

pub fn list_visits(conn: &Connection, application_id: &EntityId) -> PortalResult<Vec<Visit>> {
    let mut stmt = conn.prepare(&format!(
        "{VISIT_SELECT} WHERE v.application_id = ?1 ORDER BY v.scheduled_for"
    ))?;
    let visits = stmt
        .query_map(params![application_id.to_string()], map_visit)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(visits)
}

/// Upcoming scheduled visits of a supervisor
pub fn scheduled_for_supervisor(conn: &Connection, supervisor_id: &EntityId) -> PortalResult<Vec<Visit>> {
    let mut stmt = conn.prepare(&format!(
        "{VISIT_SELECT} WHERE v.supervisor_id = ?1 AND v.status = 'scheduled' ORDER BY v.scheduled_for"
    ))?;
    let visits = stmt
        .query_map(params![supervisor_id.to_string()], map_visit)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(visits)
}

/// Move a scheduled visit to `to`. Completed and cancelled visits are final.
pub fn finish_visit(conn: &Connection, id: &EntityId, to: VisitStatus, notes: Option<&str>) -> PortalResult<()> {
    let changed = conn.execute(
        "UPDATE visits SET status = ?1, notes = COALESCE(?2, notes)
         WHERE id = ?3 AND status = 'scheduled'",
        params![to.as_str(), notes, id.to_string()],
    )?;
    if changed == 0 {
        let visit = get_visit(conn, id)?;
        return Err(PortalError::validation(format!(
            "Visit {} is already {}",
            visit.id.short(),
            visit.status
        )));
    }
    Ok(())
}

pub fn has_completed_visit(conn: &Connection, application_id: &EntityId) -> PortalResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM visits WHERE application_id = ?1 AND status = 'completed')",
        params![application_id.to_string()],
        |row| row.get(0),
    )?)
}
