//! Company and internship queries

use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{now_string, parse_col, parse_datetime, parse_opt_date, Company, Internship};
use crate::core::error::{PortalError, PortalResult};
use crate::core::identity::{EntityId, EntityPrefix};

const COMPANY_COLUMNS: &str = "rowid, id, name, address, contact_name, contact_email, created";

fn map_company(row: &Row<'_>) -> rusqlite::Result<Company> {
    Ok(Company {
        row: row.get(0)?,
        id: parse_col(row, 1)?,
        name: row.get(2)?,
        address: row.get(3)?,
        contact_name: row.get(4)?,
        contact_email: row.get(5)?,
        created: parse_datetime(row.get(6)?),
    })
}

/// New company fields
#[derive(Debug, Clone, Default)]
pub struct NewCompany {
    pub name: String,
    pub address: Option<String>,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
}

pub fn insert_company(conn: &Connection, company: &NewCompany) -> PortalResult<EntityId> {
    let name = company.name.trim();
    if name.is_empty() {
        return Err(PortalError::validation("Company name must not be empty"));
    }
    if get_company_by_name(conn, name)?.is_some() {
        return Err(PortalError::validation(format!(
            "Company '{}' already exists",
            name
        )));
    }

    let id = EntityId::new(EntityPrefix::Co);
    conn.execute(
        "INSERT INTO companies (id, name, address, contact_name, contact_email, created) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            id.to_string(),
            name,
            company.address,
            company.contact_name,
            company.contact_email,
            now_string()
        ],
    )?;
    Ok(id)
}

pub fn get_company(conn: &Connection, id: &EntityId) -> PortalResult<Company> {
    conn.query_row(
        &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE id = ?1"),
        params![id.to_string()],
        map_company,
    )
    .optional()?
    .ok_or_else(|| PortalError::not_found("company", id.to_string()))
}

pub fn get_company_by_name(conn: &Connection, name: &str) -> PortalResult<Option<Company>> {
    Ok(conn
        .query_row(
            &format!("SELECT {COMPANY_COLUMNS} FROM companies WHERE name = ?1"),
            params![name.trim()],
            map_company,
        )
        .optional()?)
}

/// Resolve a company by exact name, ID, `CO@N` or ID prefix
pub fn resolve_company(conn: &Connection, input: &str) -> PortalResult<Company> {
    if let Some(company) = get_company_by_name(conn, input)? {
        return Ok(company);
    }
    let id = super::resolve(conn, EntityPrefix::Co, input)?;
    get_company(conn, &id)
}

pub fn list_companies(conn: &Connection) -> PortalResult<Vec<Company>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMPANY_COLUMNS} FROM companies ORDER BY name COLLATE NOCASE"
    ))?;
    let companies = stmt
        .query_map([], map_company)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(companies)
}

// =========================================================================
// Internships
// =========================================================================

const INTERNSHIP_SELECT: &str = r#"SELECT i.rowid, i.id, i.company_id, c.name, i.title, i.description,
       i.start_date, i.end_date, i.positions, i.open, i.created
FROM internships i
JOIN companies c ON c.id = i.company_id"#;

fn map_internship(row: &Row<'_>) -> rusqlite::Result<Internship> {
    Ok(Internship {
        row: row.get(0)?,
        id: parse_col(row, 1)?,
        company_id: parse_col(row, 2)?,
        company_name: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        start_date: parse_opt_date(row.get(6)?),
        end_date: parse_opt_date(row.get(7)?),
        positions: row.get::<_, i64>(8)?.max(0) as u32,
        open: row.get::<_, i64>(9)? != 0,
        created: parse_datetime(row.get(10)?),
    })
}

/// New internship fields
#[derive(Debug, Clone)]
pub struct NewInternship {
    pub company_id: EntityId,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub positions: u32,
}

pub fn insert_internship(conn: &Connection, internship: &NewInternship) -> PortalResult<EntityId> {
    if internship.title.trim().is_empty() {
        return Err(PortalError::validation("Internship title must not be empty"));
    }
    if internship.positions == 0 {
        return Err(PortalError::validation("An internship needs at least one position"));
    }
    if let (Some(start), Some(end)) = (internship.start_date, internship.end_date) {
        if end < start {
            return Err(PortalError::validation(format!(
                "End date {} is before start date {}",
                end, start
            )));
        }
    }
    // Validates the company exists
    get_company(conn, &internship.company_id)?;

    let id = EntityId::new(EntityPrefix::Int);
    conn.execute(
        "INSERT INTO internships (id, company_id, title, description, start_date, end_date, positions, open, created) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8)",
        params![
            id.to_string(),
            internship.company_id.to_string(),
            internship.title.trim(),
            internship.description,
            internship.start_date.map(|d| d.to_string()),
            internship.end_date.map(|d| d.to_string()),
            internship.positions as i64,
            now_string()
        ],
    )?;
    Ok(id)
}

pub fn get_internship(conn: &Connection, id: &EntityId) -> PortalResult<Internship> {
    conn.query_row(
        &format!("{INTERNSHIP_SELECT} WHERE i.id = ?1"),
        params![id.to_string()],
        map_internship,
    )
    .optional()?
    .ok_or_else(|| PortalError::not_found("internship", id.to_string()))
}

pub fn list_internships(conn: &Connection, open_only: bool) -> PortalResult<Vec<Internship>> {
    let mut stmt = conn.prepare(&format!(
        "{INTERNSHIP_SELECT} {} ORDER BY c.name COLLATE NOCASE, i.title",
        if open_only { "WHERE i.open = 1" } else { "" }
    ))?;
    let internships = stmt
        .query_map([], map_internship)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(internships)
}

pub fn set_internship_open(conn: &Connection, id: &EntityId, open: bool) -> PortalResult<()> {
    let changed = conn.execute(
        "UPDATE internships SET open = ?1 WHERE id = ?2",
        params![open as i64, id.to_string()],
    )?;
    if changed == 0 {
        return Err(PortalError::not_found("internship", id.to_string()));
    }
    Ok(())
}

/// Number of applications holding a place: accepted by the company or completed
pub fn filled_positions(conn: &Connection, id: &EntityId) -> PortalResult<u32> {
    let n: i64 = conn.query_row(
        "SELECT COUNT(*) FROM applications WHERE internship_id = ?1 AND status IN ('in_progress', 'completed')",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    Ok(n as u32)
}
