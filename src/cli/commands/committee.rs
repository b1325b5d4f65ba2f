//! `portal committee` command - Committee membership and votes

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{format_datetime, print_json, session, status_style, success, vote_style};
use crate::cli::GlobalOpts;
use crate::core::portal::CommitteeView;
use crate::core::quorum::QuorumOutcome;
use crate::core::status::Decision;

#[derive(Subcommand, Debug)]
pub enum CommitteeCommands {
    /// Add members to an application's committee (staff)
    Assign(AssignArgs),

    /// Remove a member from an application's committee (staff)
    Remove(RemoveArgs),

    /// Cast the acting member's vote
    Vote(VoteArgs),

    /// Show members, votes and the current tally
    Status(StatusArgs),
}

#[derive(clap::Args, Debug)]
pub struct AssignArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    /// Committee member usernames
    #[arg(required = true)]
    pub members: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    /// Member username
    pub member: String,
}

#[derive(clap::Args, Debug)]
#[command(group(clap::ArgGroup::new("decision").required(true).args(["approve", "reject"])))]
pub struct VoteArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    #[arg(long)]
    pub approve: bool,

    #[arg(long)]
    pub reject: bool,

    /// Comment stored with the vote
    #[arg(long, short = 'm')]
    pub comment: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct StatusArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,
}

pub fn run(cmd: CommitteeCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CommitteeCommands::Assign(args) => {
            let (mut portal, actor) = session(global)?;
            let view = portal
                .assign_committee(&actor, &args.app, &args.members)
                .into_diagnostic()?;
            report(global, &view, "Committee updated")
        }
        CommitteeCommands::Remove(args) => {
            let (mut portal, actor) = session(global)?;
            let view = portal
                .remove_committee_member(&actor, &args.app, &args.member)
                .into_diagnostic()?;
            report(global, &view, &format!("Removed {}", args.member))
        }
        CommitteeCommands::Vote(args) => {
            let decision = Decision::from_flags(args.approve, args.reject)
                .ok_or_else(|| miette::miette!("Pass exactly one of --approve or --reject"))?;
            let (mut portal, actor) = session(global)?;
            let view = portal
                .cast_vote(&actor, &args.app, decision, args.comment.as_deref())
                .into_diagnostic()?;
            report(global, &view, &format!("Recorded {} vote", decision))
        }
        CommitteeCommands::Status(args) => {
            let (portal, actor) = session(global)?;
            let view = portal.committee_status(&actor, &args.app).into_diagnostic()?;
            if global.format.is_json() {
                return print_json(&view);
            }
            print_view(&view);
            Ok(())
        }
    }
}

fn report(global: &GlobalOpts, view: &CommitteeView, message: &str) -> Result<()> {
    if global.format.is_json() {
        return print_json(view);
    }
    success(global, message);
    if !global.quiet {
        print_view(view);
    }
    Ok(())
}

fn print_view(view: &CommitteeView) {
    let app = &view.application;
    let outcome = match view.outcome {
        QuorumOutcome::Approved => style(view.outcome.to_string()).green(),
        QuorumOutcome::Rejected => style(view.outcome.to_string()).red(),
        QuorumOutcome::Pending => style(view.outcome.to_string()).yellow(),
    };

    println!(
        "{} {} is {}; committee {} ({}/{} approved)",
        style("Application").bold(),
        style(format!("APP@{}", app.row)).yellow(),
        status_style(app.status),
        outcome,
        view.summary.approved,
        view.summary.total
    );
    for member in &view.members {
        let voted = member
            .voted_at
            .as_ref()
            .map(format_datetime)
            .unwrap_or_default();
        let removed = if member.active { "" } else { "removed" };
        println!(
            "  {:<16} {:<10} {} {}",
            member.member_username,
            vote_style(member.status),
            style(voted).dim(),
            style(removed).dim()
        );
        if let Some(comment) = &member.comment {
            println!("    {}", style(comment).italic());
        }
    }
}
