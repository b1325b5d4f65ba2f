//! `portal dashboard` command - Work queues for the acting user

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::commands::app::application_table;
use crate::cli::helpers::{format_datetime, print_json, session};
use crate::cli::GlobalOpts;
use crate::core::db::Application;

#[derive(clap::Args, Debug)]
pub struct DashboardArgs {}

pub fn run(_args: DashboardArgs, global: &GlobalOpts) -> Result<()> {
    let (portal, actor) = session(global)?;
    let dashboard = portal.dashboard(&actor).into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&dashboard);
    }

    println!(
        "{} {} ({})",
        style("Dashboard for").bold(),
        style(&dashboard.username).cyan(),
        dashboard.roles
    );

    if let Some(counts) = &dashboard.counts {
        println!();
        println!("{}", style("Applications by status").bold());
        for (status, count) in counts {
            if *count > 0 {
                println!("  {:<20} {}", status.as_str(), count);
            }
        }
    }

    section("My applications", &dashboard.my_applications);
    section("Awaiting my review", &dashboard.awaiting_review);
    section("Awaiting my vote", &dashboard.awaiting_vote);
    section("Supervising", &dashboard.supervising);
    section("Office queue", &dashboard.staff_queue);

    if !dashboard.upcoming_visits.is_empty() {
        println!();
        println!("{}", style("Upcoming visits").bold());
        for visit in &dashboard.upcoming_visits {
            println!(
                "  {}  {}  {}",
                style(format!("VIS@{}", visit.row)).yellow(),
                format_datetime(&visit.scheduled_for),
                visit.location
            );
        }
    }

    if !global.quiet {
        println!();
        if dashboard.queued() == 0 {
            println!("{} Nothing is waiting on you.", style("✓").green());
        } else {
            println!("{} item(s) waiting on you.", style(dashboard.queued()).yellow());
        }
    }
    Ok(())
}

fn section(title: &str, apps: &[Application]) {
    if apps.is_empty() {
        return;
    }
    println!();
    println!("{} ({})", style(title).bold(), apps.len());
    println!("{}", application_table(apps).render());
}
