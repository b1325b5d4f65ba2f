//! Committee assignment and vote queries

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_string, parse_col, parse_datetime, parse_opt_datetime, CommitteeAssignment};
use crate::core::error::{PortalError, PortalResult};
use crate::core::identity::EntityId;
use crate::core::status::VoteStatus;

const ASSIGNMENT_SELECT: &str = r#"SELECT ca.application_id, ca.member_id, u.username, u.name,
       ca.status, ca.comment, ca.active, ca.assigned_at, ca.voted_at
FROM committee_assignments ca
JOIN users u ON u.id = ca.member_id"#;

fn map_assignment(row: &Row<'_>) -> rusqlite::Result<CommitteeAssignment> {
    Ok(CommitteeAssignment {
        application_id: parse_col(row, 0)?,
        member_id: parse_col(row, 1)?,
        member_username: row.get(2)?,
        member_name: row.get(3)?,
        status: parse_col(row, 4)?,
        comment: row.get(5)?,
        active: row.get::<_, i64>(6)? != 0,
        assigned_at: parse_datetime(row.get(7)?),
        voted_at: parse_opt_datetime(row.get(8)?),
    })
}

/// Assign a member. Returns false when the member is already actively assigned.
/// A previously removed member comes back with a fresh pending vote.
pub fn assign(conn: &Connection, application_id: &EntityId, member_id: &EntityId) -> PortalResult<bool> {
    let existing = get(conn, application_id, member_id)?;
    match existing {
        Some(a) if a.active => Ok(false),
        Some(_) => {
            conn.execute(
                "UPDATE committee_assignments
                 SET active = 1, status = 'pending', comment = NULL, voted_at = NULL, assigned_at = ?1
                 WHERE application_id = ?2 AND member_id = ?3",
                params![now_string(), application_id.to_string(), member_id.to_string()],
            )?;
            Ok(true)
        }
        None => {
            conn.execute(
                "INSERT INTO committee_assignments (application_id, member_id, status, active, assigned_at)
                 VALUES (?1, ?2, 'pending', 1, ?3)",
                params![application_id.to_string(), member_id.to_string(), now_string()],
            )?;
            Ok(true)
        }
    }
}

/// Deactivate an assignment. Its vote stops counting but stays on record.
pub fn deactivate(conn: &Connection, application_id: &EntityId, member_id: &EntityId) -> PortalResult<bool> {
    let changed = conn.execute(
        "UPDATE committee_assignments SET active = 0
         WHERE application_id = ?1 AND member_id = ?2 AND active = 1",
        params![application_id.to_string(), member_id.to_string()],
    )?;
    Ok(changed > 0)
}

pub fn get(
    conn: &Connection,
    application_id: &EntityId,
    member_id: &EntityId,
) -> PortalResult<Option<CommitteeAssignment>> {
    Ok(conn
        .query_row(
            &format!("{ASSIGNMENT_SELECT} WHERE ca.application_id = ?1 AND ca.member_id = ?2"),
            params![application_id.to_string(), member_id.to_string()],
            map_assignment,
        )
        .optional()?)
}

/// Assignments for an application, active ones first
pub fn list(conn: &Connection, application_id: &EntityId, include_inactive: bool) -> PortalResult<Vec<CommitteeAssignment>> {
    let mut stmt = conn.prepare(&format!(
        "{ASSIGNMENT_SELECT} WHERE ca.application_id = ?1 {} ORDER BY ca.active DESC, u.username COLLATE NOCASE",
        if include_inactive { "" } else { "AND ca.active = 1" }
    ))?;
    let assignments = stmt
        .query_map(params![application_id.to_string()], map_assignment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(assignments)
}

/// Record a member's vote. Only a pending, active assignment can be voted on,
/// so a second vote from the same member never reaches the tally.
pub fn record_vote(
    conn: &Connection,
    application_id: &EntityId,
    member_id: &EntityId,
    vote: VoteStatus,
    comment: Option<&str>,
) -> PortalResult<()> {
    if vote == VoteStatus::Pending {
        return Err(PortalError::validation("A vote must approve or reject"));
    }

    let changed = conn.execute(
        "UPDATE committee_assignments
         SET status = ?1, comment = ?2, voted_at = ?3
         WHERE application_id = ?4 AND member_id = ?5 AND active = 1 AND status = 'pending'",
        params![
            vote.to_string(),
            comment,
            now_string(),
            application_id.to_string(),
            member_id.to_string()
        ],
    )?;
    if changed == 1 {
        return Ok(());
    }

    match get(conn, application_id, member_id)? {
        Some(a) if a.active => Err(PortalError::AlreadyVoted(a.member_username)),
        Some(a) => Err(PortalError::NotOnCommittee(a.member_username)),
        None => Err(PortalError::NotOnCommittee(member_id.to_string())),
    }
}

/// Votes of the active assignments, the input to the quorum tally
pub fn active_votes(conn: &Connection, application_id: &EntityId) -> PortalResult<Vec<VoteStatus>> {
    let mut stmt = conn.prepare(
        "SELECT status FROM committee_assignments WHERE application_id = ?1 AND active = 1",
    )?;
    let votes = stmt
        .query_map(params![application_id.to_string()], |row| parse_col(row, 0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(votes)
}
