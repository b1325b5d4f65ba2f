//! Shared helper functions for CLI commands
//!
//! Project discovery, portal opening and acting-user resolution live here so
//! every command module resolves them the same way.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use console::{style, StyledObject};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::core::db::User;
use crate::core::identity::EntityId;
use crate::core::portal::Portal;
use crate::core::project::Project;
use crate::core::status::{ApplicationStatus, VoteStatus};

/// Find the project from `--project` or by walking up from the current directory
pub fn open_project(global: &GlobalOpts) -> Result<Project> {
    match &global.project {
        Some(path) => Project::open(path).into_diagnostic(),
        None => Project::discover().into_diagnostic(),
    }
}

/// Open the project's portal with layered configuration
pub fn open_portal(global: &GlobalOpts) -> Result<Portal> {
    let project = open_project(global)?;
    let config = Config::load(Some(&project));
    Portal::open(&project, config).into_diagnostic()
}

/// Resolve the acting user: `--as`, then PORTAL_USER, then `user:` in config
pub fn acting_user(portal: &Portal, global: &GlobalOpts) -> Result<User> {
    let username = global
        .as_user
        .as_deref()
        .or(portal.config().user.as_deref());
    portal.acting_user(username).into_diagnostic()
}

/// Open the portal and resolve the acting user in one step
pub fn session(global: &GlobalOpts) -> Result<(Portal, User)> {
    let portal = open_portal(global)?;
    let actor = acting_user(&portal, global)?;
    Ok((portal, actor))
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{}", json);
    Ok(())
}

/// Print a success line unless `--quiet`
pub fn success(global: &GlobalOpts, message: impl std::fmt::Display) {
    if !global.quiet {
        println!("{} {}", style("✓").green(), message);
    }
}

/// Format an EntityId for tables: prefix plus the first ULID characters
pub fn format_short_id(id: &EntityId) -> String {
    id.short()
}

/// Truncate a string to `max_len` characters, adding "..." if truncated
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
}

pub fn format_datetime(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

/// Parse a visit time. Accepts RFC 3339 or `YYYY-MM-DD HH:MM` (UTC).
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(input) {
        return Ok(at.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, pattern) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    Err(format!(
        "Invalid date/time '{}': use RFC 3339 or YYYY-MM-DD HH:MM",
        input
    ))
}

/// Colour a status for terminal output
pub fn status_style(status: ApplicationStatus) -> StyledObject<&'static str> {
    let s = style(status.as_str());
    match status {
        ApplicationStatus::Completed => s.green(),
        ApplicationStatus::InProgress => s.cyan(),
        ApplicationStatus::Rejected => s.red(),
        ApplicationStatus::Withdrawn => s.dim(),
        _ => s.yellow(),
    }
}

pub fn vote_style(vote: VoteStatus) -> StyledObject<String> {
    let s = style(vote.to_string());
    match vote {
        VoteStatus::Approved => s.green(),
        VoteStatus::Rejected => s.red(),
        VoteStatus::Pending => s.yellow(),
    }
}
