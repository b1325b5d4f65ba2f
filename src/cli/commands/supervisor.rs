//! `portal supervisor` command - Supervisor assignment

use clap::Subcommand;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::app::print_application_result;
use crate::cli::helpers::session;
use crate::cli::GlobalOpts;

#[derive(Subcommand, Debug)]
pub enum SupervisorCommands {
    /// Assign (or replace) the faculty supervisor of an application (staff)
    Assign(AssignArgs),
}

#[derive(clap::Args, Debug)]
pub struct AssignArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    /// Supervisor username
    pub supervisor: String,
}

pub fn run(cmd: SupervisorCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        SupervisorCommands::Assign(args) => {
            let (mut portal, actor) = session(global)?;
            let app = portal
                .assign_supervisor(&actor, &args.app, &args.supervisor)
                .into_diagnostic()?;
            print_application_result(global, &app, "Assigned supervisor to")
        }
    }
}
