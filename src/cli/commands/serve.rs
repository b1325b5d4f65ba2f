//! `portal serve` command - Run the JSON HTTP server

use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::open_project;
use crate::cli::GlobalOpts;
use crate::core::config::Config;
use crate::server::{self, AppState};

#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (default: server.bind from config, or PORTAL_BIND)
    #[arg(long, short = 'b')]
    pub bind: Option<String>,
}

pub fn run(args: ServeArgs, global: &GlobalOpts) -> Result<()> {
    let project = open_project(global)?;
    let config = Config::load(Some(&project));
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());

    // Create the schema before the first request arrives
    crate::core::portal::Portal::open(&project, config.clone()).into_diagnostic()?;

    if !global.quiet {
        println!(
            "{} Serving {} on {}",
            style("→").cyan(),
            style(project.root().display()).cyan(),
            style(format!("http://{}", bind)).yellow()
        );
    }

    let state = AppState::new(project, config);
    let runtime = tokio::runtime::Runtime::new().into_diagnostic()?;
    runtime
        .block_on(server::serve(state, &bind))
        .into_diagnostic()
}
