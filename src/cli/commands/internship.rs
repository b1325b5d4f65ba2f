//! `portal internship` command - Internship offers

use chrono::NaiveDate;
use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{format_date, print_json, session, success, truncate_str};
use crate::cli::table::ListTable;
use crate::cli::GlobalOpts;
use crate::core::portal::InternshipInput;

#[derive(Subcommand, Debug)]
pub enum InternshipCommands {
    /// Publish an internship offer (staff)
    Add(AddArgs),

    /// List internship offers
    List(ListArgs),

    /// Close an offer to new applications (staff)
    Close(CloseArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Offer title
    pub title: String,

    /// Host company (name or CO reference)
    #[arg(long, short = 'c')]
    pub company: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// First day (YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Number of students the company takes
    #[arg(long, short = 'p', default_value_t = 1)]
    pub positions: u32,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only offers still open to applications
    #[arg(long)]
    pub open: bool,
}

#[derive(clap::Args, Debug)]
pub struct CloseArgs {
    /// Internship reference (INT@N or ID)
    pub internship: String,
}

pub fn run(cmd: InternshipCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        InternshipCommands::Add(args) => run_add(args, global),
        InternshipCommands::List(args) => run_list(args, global),
        InternshipCommands::Close(args) => run_close(args, global),
    }
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let internship = portal
        .add_internship(
            &actor,
            &InternshipInput {
                company: args.company,
                title: args.title,
                description: args.description,
                start_date: args.start,
                end_date: args.end,
                positions: args.positions,
            },
        )
        .into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&internship);
    }
    success(
        global,
        format!(
            "Published {} at {} as {}",
            style(&internship.title).cyan(),
            internship.company_name,
            style(format!("INT@{}", internship.row)).yellow()
        ),
    );
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (portal, _actor) = session(global)?;
    let internships = portal.list_internships(args.open).into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&internships);
    }

    let mut table = ListTable::new(["REF", "TITLE", "COMPANY", "START", "END", "POSITIONS", "OPEN"]);
    for internship in &internships {
        table.push([
            format!("INT@{}", internship.row),
            truncate_str(&internship.title, 40),
            internship.company_name.clone(),
            format_date(internship.start_date),
            format_date(internship.end_date),
            internship.positions.to_string(),
            if internship.open { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.print(global, "internships");
    Ok(())
}

fn run_close(args: CloseArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let internship = portal
        .close_internship(&actor, &args.internship)
        .into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&internship);
    }
    success(
        global,
        format!("Closed {} to new applications", style(&internship.title).cyan()),
    );
    Ok(())
}
