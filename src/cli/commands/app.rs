//! `portal app` command - Internship applications

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{
    format_datetime, print_json, session, status_style, success, truncate_str, vote_style,
};
use crate::cli::table::ListTable;
use crate::cli::GlobalOpts;
use crate::core::db::{Application, ApplicationEvent};
use crate::core::portal::ApplicationDetail;
use crate::core::status::ApplicationStatus;

#[derive(Subcommand, Debug)]
pub enum AppCommands {
    /// Apply to an internship (student)
    Submit(SubmitArgs),

    /// List applications visible to the acting user
    List(ListArgs),

    /// Show an application with its committee, documents and history
    Show(AppRef),

    /// Withdraw an application (owning student)
    Withdraw(WithdrawArgs),

    /// Show the status history of an application
    History(AppRef),
}

#[derive(clap::Args, Debug)]
pub struct SubmitArgs {
    /// Internship reference (INT@N or ID)
    pub internship: String,

    /// Course instructor who reviews the application
    #[arg(long, short = 'i')]
    pub instructor: String,

    /// Motivation statement
    #[arg(long, short = 's')]
    pub statement: String,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only applications in this status (e.g. pending_committee)
    #[arg(long)]
    pub status: Option<ApplicationStatus>,
}

#[derive(clap::Args, Debug)]
pub struct AppRef {
    /// Application reference (APP@N, @N or ID)
    pub app: String,
}

#[derive(clap::Args, Debug)]
pub struct WithdrawArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    /// Reason recorded in the history
    #[arg(long)]
    pub reason: Option<String>,
}

pub fn run(cmd: AppCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        AppCommands::Submit(args) => run_submit(args, global),
        AppCommands::List(args) => run_list(args, global),
        AppCommands::Show(args) => run_show(args, global),
        AppCommands::Withdraw(args) => run_withdraw(args, global),
        AppCommands::History(args) => run_history(args, global),
    }
}

fn run_submit(args: SubmitArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let app = portal
        .submit_application(&actor, &args.internship, &args.instructor, &args.statement)
        .into_diagnostic()?;
    print_application_result(global, &app, "Submitted")
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (portal, actor) = session(global)?;
    let apps = portal
        .list_applications(&actor, args.status)
        .into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&apps);
    }
    application_table(&apps).print(global, "applications");
    Ok(())
}

fn run_show(args: AppRef, global: &GlobalOpts) -> Result<()> {
    let (portal, actor) = session(global)?;
    let detail = portal.show_application(&actor, &args.app).into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&detail);
    }
    print_detail(&detail);
    Ok(())
}

fn run_withdraw(args: WithdrawArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let app = portal
        .withdraw_application(&actor, &args.app, args.reason.as_deref())
        .into_diagnostic()?;
    print_application_result(global, &app, "Withdrew")
}

fn run_history(args: AppRef, global: &GlobalOpts) -> Result<()> {
    let (portal, actor) = session(global)?;
    let events = portal.history(&actor, &args.app).into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&events);
    }
    event_table(&events).print(global, "events");
    Ok(())
}

/// Print the outcome of an operation that returns the updated application
pub(crate) fn print_application_result(
    global: &GlobalOpts,
    app: &Application,
    verb: &str,
) -> Result<()> {
    if global.format.is_json() {
        return print_json(app);
    }
    success(
        global,
        format!(
            "{} {} ({} at {}): {}",
            verb,
            style(format!("APP@{}", app.row)).yellow(),
            app.internship_title,
            app.company_name,
            status_style(app.status)
        ),
    );
    Ok(())
}

pub(crate) fn application_table(apps: &[Application]) -> ListTable {
    let mut table = ListTable::new([
        "REF",
        "STUDENT",
        "INTERNSHIP",
        "COMPANY",
        "INSTRUCTOR",
        "SUPERVISOR",
        "STATUS",
    ]);
    for app in apps {
        table.push([
            format!("APP@{}", app.row),
            app.student_username.clone(),
            truncate_str(&app.internship_title, 30),
            truncate_str(&app.company_name, 24),
            app.instructor_username.clone(),
            app.supervisor_username.clone().unwrap_or_else(|| "-".to_string()),
            app.status.to_string(),
        ]);
    }
    table
}

fn event_table(events: &[ApplicationEvent]) -> ListTable {
    let mut table = ListTable::new(["#", "AT", "FROM", "TO", "BY", "NOTE"]);
    for event in events {
        table.push([
            event.seq.to_string(),
            format_datetime(&event.at),
            event
                .from_status
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            event.to_status.to_string(),
            event.actor_username.clone(),
            truncate_str(event.note.as_deref().unwrap_or(""), 40),
        ]);
    }
    table
}

fn print_detail(detail: &ApplicationDetail) {
    let app = &detail.application;
    let rule = style("─".repeat(60)).dim();

    println!("{}", rule);
    println!(
        "{}: {} ({})",
        style("ID").bold(),
        style(&app.id).cyan(),
        format!("APP@{}", app.row)
    );
    println!(
        "{}: {} ({})",
        style("Student").bold(),
        app.student_name,
        app.student_username
    );
    println!(
        "{}: {} at {}",
        style("Internship").bold(),
        app.internship_title,
        app.company_name
    );
    println!("{}: {}", style("Instructor").bold(), app.instructor_username);
    println!(
        "{}: {}",
        style("Supervisor").bold(),
        app.supervisor_username.as_deref().unwrap_or("-")
    );
    println!("{}: {}", style("Status").bold(), status_style(app.status));
    if let Some(stopped) = app.stopped_at {
        println!("{}: {}", style("Stopped at").bold(), stopped);
    }
    if !detail.allowed_transitions.is_empty() {
        let next: Vec<String> = detail
            .allowed_transitions
            .iter()
            .map(|s| s.to_string())
            .collect();
        println!("{}: {}", style("Next").bold(), next.join(", "));
    }
    println!("{}", rule);

    println!("{}", style("Statement").bold());
    println!("  {}", app.statement);
    for (label, value) in [
        ("Instructor feedback", &app.instructor_feedback),
        ("Office feedback", &app.staff_feedback),
        ("Company note", &app.company_note),
    ] {
        if let Some(value) = value {
            println!("{}: {}", style(label).bold(), value);
        }
    }

    let progress = &detail.progress;
    let when = |at: Option<chrono::DateTime<chrono::Utc>>| {
        at.map(|at| style(format!("  {}", format_datetime(&at))).dim().to_string())
            .unwrap_or_default()
    };
    println!();
    println!("{}", style("Progress").bold());
    println!(
        "  Instructor review   {}{}",
        vote_style(progress.course_instructor_status),
        when(progress.instructor_reviewed_at)
    );
    println!(
        "  Supervisor          {}{}",
        vote_style(progress.supervisor_status),
        when(progress.supervisor_assigned_at)
    );
    println!(
        "  Committee           {}{}",
        vote_style(progress.committee_status),
        when(progress.committee_decided_at)
    );
    println!(
        "  Sent to company     {}{}",
        if progress.document_sent_to_company { "yes" } else { "no" },
        when(progress.sent_to_company_at)
    );
    println!(
        "  Company             {}{}",
        vote_style(progress.company_status),
        when(progress.company_responded_at)
    );
    println!(
        "  Completed           {}{}",
        if progress.completed { "yes" } else { "no" },
        when(progress.completed_at)
    );

    if !detail.members.is_empty() {
        println!();
        println!(
            "{} ({} approved, {} rejected, {} pending)",
            style("Committee").bold(),
            detail.committee.approved,
            detail.committee.rejected,
            detail.committee.pending
        );
        for member in &detail.members {
            let removed = if member.active { "" } else { " (removed)" };
            println!(
                "  {:<16} {}{}",
                member.member_username,
                vote_style(member.status),
                style(removed).dim()
            );
        }
    }

    if !detail.documents.is_empty() {
        println!();
        println!("{}", style("Documents").bold());
        for doc in &detail.documents {
            println!(
                "  {:<24} {}  {}",
                doc.kind.as_str(),
                format_datetime(&doc.created),
                style(doc.file_path.display()).dim()
            );
        }
    }

    if !detail.visits.is_empty() {
        println!();
        println!("{}", style("Visits").bold());
        for visit in &detail.visits {
            println!(
                "  {}  {:<10} {}",
                format_datetime(&visit.scheduled_for),
                visit.status,
                visit.location
            );
        }
    }

    println!();
    println!("{}", style("History").bold());
    for event in &detail.events {
        let from = event
            .from_status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}  {} -> {}  by {}",
            format_datetime(&event.at),
            from,
            event.to_status,
            event.actor_username
        );
    }
    println!("{}", rule);
}
