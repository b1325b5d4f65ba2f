//! `portal visit` command - Supervisor visits

use chrono::{DateTime, Utc};
use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{format_datetime, parse_datetime, print_json, session, success};
use crate::cli::table::ListTable;
use crate::cli::GlobalOpts;
use crate::core::db::Visit;

#[derive(Subcommand, Debug)]
pub enum VisitCommands {
    /// Schedule a workplace visit (assigned supervisor)
    Schedule(ScheduleArgs),

    /// List visits for an application
    List(ListArgs),

    /// Mark a scheduled visit as done
    Complete(FinishArgs),

    /// Cancel a scheduled visit
    Cancel(FinishArgs),
}

#[derive(clap::Args, Debug)]
pub struct ScheduleArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    /// When (RFC 3339 or "YYYY-MM-DD HH:MM", UTC)
    #[arg(long, value_parser = parse_datetime)]
    pub at: DateTime<Utc>,

    /// Where the visit takes place
    #[arg(long, short = 'l')]
    pub location: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,
}

#[derive(clap::Args, Debug)]
pub struct FinishArgs {
    /// Visit reference (VIS@N or ID)
    pub visit: String,

    /// Visit report or cancellation reason
    #[arg(long, short = 'm')]
    pub notes: Option<String>,
}

pub fn run(cmd: VisitCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        VisitCommands::Schedule(args) => {
            let (mut portal, actor) = session(global)?;
            let visit = portal
                .schedule_visit(&actor, &args.app, args.at, &args.location)
                .into_diagnostic()?;
            report(global, &visit, "Scheduled")
        }
        VisitCommands::List(args) => {
            let (portal, actor) = session(global)?;
            let visits = portal.list_visits(&actor, &args.app).into_diagnostic()?;
            if global.format.is_json() {
                return print_json(&visits);
            }
            let mut table = ListTable::new(["REF", "WHEN", "LOCATION", "SUPERVISOR", "STATUS", "NOTES"]);
            for visit in &visits {
                table.push([
                    format!("VIS@{}", visit.row),
                    format_datetime(&visit.scheduled_for),
                    visit.location.clone(),
                    visit.supervisor_username.clone(),
                    visit.status.to_string(),
                    visit.notes.clone().unwrap_or_default(),
                ]);
            }
            table.print(global, "visits");
            Ok(())
        }
        VisitCommands::Complete(args) => {
            let (mut portal, actor) = session(global)?;
            let visit = portal
                .complete_visit(&actor, &args.visit, args.notes.as_deref())
                .into_diagnostic()?;
            report(global, &visit, "Completed")
        }
        VisitCommands::Cancel(args) => {
            let (mut portal, actor) = session(global)?;
            let visit = portal
                .cancel_visit(&actor, &args.visit, args.notes.as_deref())
                .into_diagnostic()?;
            report(global, &visit, "Cancelled")
        }
    }
}

fn report(global: &GlobalOpts, visit: &Visit, verb: &str) -> Result<()> {
    if global.format.is_json() {
        return print_json(visit);
    }
    success(
        global,
        format!(
            "{} visit {} on {} at {}",
            verb,
            style(format!("VIS@{}", visit.row)).yellow(),
            format_datetime(&visit.scheduled_for),
            visit.location
        ),
    );
    Ok(())
}
