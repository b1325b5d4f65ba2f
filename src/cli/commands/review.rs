//! `portal review` command - Course instructor decision

use miette::{IntoDiagnostic, Result};

use crate::cli::commands::app::print_application_result;
use crate::cli::helpers::session;
use crate::cli::GlobalOpts;
use crate::core::status::Decision;

#[derive(clap::Args, Debug)]
#[command(group(clap::ArgGroup::new("decision").required(true).args(["approve", "reject"])))]
pub struct ReviewArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    /// Approve and pass the application on to supervisor assignment
    #[arg(long)]
    pub approve: bool,

    /// Reject the application
    #[arg(long)]
    pub reject: bool,

    /// Feedback for the student
    #[arg(long, short = 'm')]
    pub feedback: Option<String>,
}

pub fn run(args: ReviewArgs, global: &GlobalOpts) -> Result<()> {
    let decision = Decision::from_flags(args.approve, args.reject)
        .ok_or_else(|| miette::miette!("Pass exactly one of --approve or --reject"))?;

    let (mut portal, actor) = session(global)?;
    let app = portal
        .instructor_review(&actor, &args.app, decision, args.feedback.as_deref())
        .into_diagnostic()?;

    let verb = match decision {
        Decision::Approve => "Approved",
        Decision::Reject => "Rejected",
    };
    print_application_result(global, &app, verb)
}
