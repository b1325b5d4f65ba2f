//! `portal send`, `portal company-response` and `portal complete` commands
//!
//! The office side of a placement: the acceptance request goes out, the
//! company answers, and the internship is eventually marked completed.

use miette::{IntoDiagnostic, Result};

use crate::cli::commands::app::print_application_result;
use crate::cli::helpers::session;
use crate::cli::GlobalOpts;

#[derive(clap::Args, Debug)]
pub struct SendArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    /// Note recorded in the history
    #[arg(long, short = 'm')]
    pub note: Option<String>,
}

#[derive(clap::Args, Debug)]
#[command(group(clap::ArgGroup::new("answer").required(true).args(["accept", "decline"])))]
pub struct CompanyResponseArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    /// The company accepted the student
    #[arg(long)]
    pub accept: bool,

    /// The company declined the student
    #[arg(long)]
    pub decline: bool,

    /// What the company said
    #[arg(long, short = 'm')]
    pub note: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct CompleteArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    #[arg(long, short = 'm')]
    pub note: Option<String>,
}

pub fn run_send(args: SendArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let app = portal
        .send_to_company(&actor, &args.app, args.note.as_deref())
        .into_diagnostic()?;
    print_application_result(global, &app, "Sent")
}

pub fn run_company_response(args: CompanyResponseArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let app = portal
        .record_company_response(&actor, &args.app, args.accept, args.note.as_deref())
        .into_diagnostic()?;
    let verb = if args.accept {
        "Company accepted"
    } else {
        "Company declined"
    };
    print_application_result(global, &app, verb)
}

pub fn run_complete(args: CompleteArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let app = portal
        .complete_application(&actor, &args.app, args.note.as_deref())
        .into_diagnostic()?;
    print_application_result(global, &app, "Completed")
}
