//! User queries

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_string, parse_col, parse_datetime, User};
use crate::core::error::{PortalError, PortalResult};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::role::{Role, RoleSet};

const USER_COLUMNS: &str = "rowid, id, username, name, email, roles, active, created";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let roles: String = row.get(5)?;
    Ok(User {
        row: row.get(0)?,
        id: parse_col(row, 1)?,
        username: row.get(2)?,
        name: row.get(3)?,
        email: row.get(4)?,
        roles: RoleSet::parse(&roles).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, e.into())
        })?,
        active: row.get::<_, i64>(6)? != 0,
        created: parse_datetime(row.get(7)?),
    })
}

/// Insert a new user. Usernames are unique, case-insensitively.
pub fn insert(
    conn: &Connection,
    username: &str,
    name: &str,
    email: &str,
    roles: &RoleSet,
) -> PortalResult<EntityId> {
    let username = username.trim();
    if username.is_empty() || username.contains(char::is_whitespace) {
        return Err(PortalError::validation(
            "Username must be non-empty and contain no whitespace",
        ));
    }
    if get_by_username(conn, username)?.is_some() {
        return Err(PortalError::validation(format!(
            "Username '{}' is already taken",
            username
        )));
    }

    let id = EntityId::new(EntityPrefix::Usr);
    conn.execute(
        "INSERT INTO users (id, username, name, email, roles, active, created) VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)",
        params![
            id.to_string(),
            username,
            name.trim(),
            email.trim(),
            roles.to_db_string(),
            now_string()
        ],
    )?;
    Ok(id)
}

pub fn get(conn: &Connection, id: &EntityId) -> PortalResult<User> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id.to_string()],
        map_user,
    )
    .optional()?
    .ok_or_else(|| PortalError::not_found("user", id.to_string()))
}

pub fn get_by_username(conn: &Connection, username: &str) -> PortalResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE username = ?1"),
            params![username.trim()],
            map_user,
        )
        .optional()?)
}

/// Resolve a username, full ID, `USR@N` or ID prefix to a user
pub fn resolve(conn: &Connection, input: &str) -> PortalResult<User> {
    if let Some(user) = get_by_username(conn, input)? {
        return Ok(user);
    }
    let id = super::resolve(conn, EntityPrefix::Usr, input)?;
    get(conn, &id)
}

/// List users, optionally restricted to a role. Inactive users are skipped unless asked for.
pub fn list(conn: &Connection, role: Option<Role>, include_inactive: bool) -> PortalResult<Vec<User>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {USER_COLUMNS} FROM users {} ORDER BY username COLLATE NOCASE",
        if include_inactive { "" } else { "WHERE active = 1" }
    ))?;
    let users = stmt
        .query_map([], map_user)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(match role {
        Some(role) => users.into_iter().filter(|u| u.has_role(role)).collect(),
        None => users,
    })
}

pub fn set_active(conn: &Connection, id: &EntityId, active: bool) -> PortalResult<()> {
    let changed = conn.execute(
        "UPDATE users SET active = ?1 WHERE id = ?2",
        params![active as i64, id.to_string()],
    )?;
    if changed == 0 {
        return Err(PortalError::not_found("user", id.to_string()));
    }
    Ok(())
}

pub fn set_roles(conn: &Connection, id: &EntityId, roles: &RoleSet) -> PortalResult<()> {
    let changed = conn.execute(
        "UPDATE users SET roles = ?1 WHERE id = ?2",
        params![roles.to_db_string(), id.to_string()],
    )?;
    if changed == 0 {
        return Err(PortalError::not_found("user", id.to_string()));
    }
    Ok(())
}

pub fn count(conn: &Connection) -> PortalResult<usize> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    Ok(n as usize)
}
