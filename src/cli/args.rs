//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    app::AppCommands,
    committee::CommitteeCommands,
    company::CompanyCommands,
    completions::CompletionsArgs,
    dashboard::DashboardArgs,
    doc::DocCommands,
    init::InitArgs,
    internship::InternshipCommands,
    placement::{CompanyResponseArgs, CompleteArgs, SendArgs},
    report::ReportCommands,
    review::ReviewArgs,
    serve::ServeArgs,
    supervisor::SupervisorCommands,
    user::UserCommands,
    visit::VisitCommands,
};

#[derive(Parser)]
#[command(name = "portal")]
#[command(author, version, about = "Internship Portal")]
#[command(long_about = "Application, review, committee approval and document workflow for university internships.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Act as this user (default: PORTAL_USER, then `user:` in config)
    #[arg(long = "as", global = true, value_name = "USERNAME")]
    pub as_user: Option<String>,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Project root (default: auto-detect by finding .portal/)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new portal project
    Init(InitArgs),

    /// User accounts and roles
    #[command(subcommand)]
    User(UserCommands),

    /// Host companies
    #[command(subcommand)]
    Company(CompanyCommands),

    /// Internship offers
    #[command(subcommand)]
    Internship(InternshipCommands),

    /// Internship applications
    #[command(subcommand)]
    App(AppCommands),

    /// Record the course instructor's decision
    Review(ReviewArgs),

    /// Supervisor assignment
    #[command(subcommand)]
    Supervisor(SupervisorCommands),

    /// Committee membership and votes
    #[command(subcommand)]
    Committee(CommitteeCommands),

    /// Generated letters and certificates
    #[command(subcommand)]
    Doc(DocCommands),

    /// Mark the acceptance request as sent to the company
    Send(SendArgs),

    /// Record the company's answer to the acceptance request
    CompanyResponse(CompanyResponseArgs),

    /// Supervisor visits
    #[command(subcommand)]
    Visit(VisitCommands),

    /// Mark an internship as completed
    Complete(CompleteArgs),

    /// Show the acting user's work queues
    Dashboard(DashboardArgs),

    /// Office reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// Run the JSON HTTP server
    Serve(ServeArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables and summaries
    #[default]
    Auto,
    /// Always render tables
    Table,
    /// JSON (for scripting)
    Json,
}

impl OutputFormat {
    pub fn is_json(&self) -> bool {
        matches!(self, OutputFormat::Json)
    }
}
