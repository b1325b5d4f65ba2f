//! `portal report` command - Office reports

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::cli::helpers::{print_json, session};
use crate::cli::table::ListTable;
use crate::cli::GlobalOpts;
use crate::core::db::Application;
use crate::core::status::ApplicationStatus;

#[derive(Subcommand, Debug)]
pub enum ReportCommands {
    /// Applications per status and placements per internship
    Summary,

    /// Export applications as CSV
    Export(ExportArgs),
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Only applications in this status
    #[arg(long)]
    pub status: Option<ApplicationStatus>,

    /// Write to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

pub fn run(cmd: ReportCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ReportCommands::Summary => run_summary(global),
        ReportCommands::Export(args) => run_export(args, global),
    }
}

fn run_summary(global: &GlobalOpts) -> Result<()> {
    let (portal, actor) = session(global)?;
    let summary = portal.report_summary(&actor).into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&summary);
    }

    println!("{}", style("Applications by status").bold());
    let mut counts = ListTable::new(["STATUS", "COUNT"]);
    for (status, count) in &summary.counts {
        counts.push([status.to_string(), count.to_string()]);
    }
    counts.push(["total".to_string(), summary.total.to_string()]);
    println!("{}", counts.render());

    println!();
    println!("{}", style("Placements").bold());
    let mut placements = ListTable::new(["REF", "INTERNSHIP", "COMPANY", "FILLED", "APPLICATIONS", "OPEN"]);
    for load in &summary.internships {
        placements.push([
            load.id.short(),
            load.title.clone(),
            load.company_name.clone(),
            format!("{}/{}", load.filled, load.positions),
            load.applications.to_string(),
            if load.open { "yes" } else { "no" }.to_string(),
        ]);
    }
    placements.print(global, "internships");
    Ok(())
}

fn run_export(args: ExportArgs, global: &GlobalOpts) -> Result<()> {
    let (portal, actor) = session(global)?;
    let apps = portal
        .list_applications(&actor, args.status)
        .into_diagnostic()?;

    match &args.output {
        Some(path) => {
            let file = File::create(path).into_diagnostic()?;
            write_csv(file, &apps)?;
            if !global.quiet {
                eprintln!(
                    "{} Exported {} application(s) to {}",
                    style("✓").green(),
                    apps.len(),
                    style(path.display()).cyan()
                );
            }
        }
        None => write_csv(io::stdout().lock(), &apps)?,
    }
    Ok(())
}

fn write_csv<W: Write>(writer: W, apps: &[Application]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record([
        "id",
        "student",
        "student_name",
        "internship",
        "company",
        "instructor",
        "supervisor",
        "status",
        "stopped_at",
        "created",
        "updated",
    ])
    .into_diagnostic()?;

    for app in apps {
        wtr.write_record([
            app.id.to_string(),
            app.student_username.clone(),
            app.student_name.clone(),
            app.internship_title.clone(),
            app.company_name.clone(),
            app.instructor_username.clone(),
            app.supervisor_username.clone().unwrap_or_default(),
            app.status.to_string(),
            app.stopped_at.map(|s| s.to_string()).unwrap_or_default(),
            app.created.to_rfc3339(),
            app.updated.to_rfc3339(),
        ])
        .into_diagnostic()?;
    }
    wtr.flush().into_diagnostic()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_header_only_for_empty_export() {
        let mut out = Vec::new();
        write_csv(&mut out, &[]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("id,student,student_name,internship"));
    }
}
