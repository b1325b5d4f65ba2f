//! `portal init` command - Initialize a new portal project

use console::style;
use miette::{IntoDiagnostic, Result};
use std::path::Path;

use crate::core::config::Config;
use crate::core::portal::{NewUser, Portal};
use crate::core::project::{Project, ProjectError};
use crate::core::role::RoleSet;

#[derive(clap::Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize (default: current directory)
    #[arg(default_value = ".")]
    pub path: std::path::PathBuf,

    /// Force initialization even if .portal/ already exists (keeps the database)
    #[arg(long)]
    pub force: bool,

    /// Create the first administrator with this username
    #[arg(long, value_name = "USERNAME")]
    pub admin: Option<String>,

    /// Display name of the first administrator
    #[arg(long, requires = "admin")]
    pub admin_name: Option<String>,

    /// Email of the first administrator
    #[arg(long, requires = "admin")]
    pub admin_email: Option<String>,
}

pub fn run(args: InitArgs) -> Result<()> {
    let path = if args.path.as_os_str() == "." {
        std::env::current_dir().into_diagnostic()?
    } else {
        args.path.clone()
    };

    if !path.exists() {
        std::fs::create_dir_all(&path).into_diagnostic()?;
        println!(
            "{} Created directory {}",
            style("✓").green(),
            style(path.display()).cyan()
        );
    }

    let project = if args.force {
        Project::init_force(&path)
    } else {
        Project::init(&path)
    };

    let project = match project {
        Ok(project) => project,
        Err(ProjectError::AlreadyExists(path)) => {
            println!(
                "{} Portal project already exists at {}",
                style("!").yellow(),
                style(path.display()).cyan()
            );
            println!();
            println!(
                "Use {} to reinitialize",
                style("portal init --force").yellow()
            );
            return Ok(());
        }
        Err(e) => return Err(miette::miette!("{}", e)),
    };

    // Opening the portal creates the database schema
    let config = Config::load(Some(&project));
    let mut portal = Portal::open(&project, config).into_diagnostic()?;

    println!(
        "{} Initialized portal project at {}",
        style("✓").green(),
        style(project.root().display()).cyan()
    );
    println!();
    println!("Created project structure:");
    print_structure(project.root());

    if let Some(username) = &args.admin {
        let admin = NewUser {
            username: username.clone(),
            name: args.admin_name.clone().unwrap_or_else(|| username.clone()),
            email: args.admin_email.clone().unwrap_or_default(),
            roles: RoleSet::default(),
        };
        let user = portal.bootstrap_admin(&admin).into_diagnostic()?;
        println!();
        println!(
            "{} Created administrator {}",
            style("✓").green(),
            style(&user.username).cyan()
        );
    }

    println!();
    println!("Next steps:");
    if args.admin.is_none() {
        println!(
            "  {} Create the first administrator",
            style("portal init --force --admin <username>").yellow()
        );
    }
    println!(
        "  {} Register staff, students and faculty",
        style("portal user add").yellow()
    );
    println!(
        "  {} Publish an internship",
        style("portal internship add").yellow()
    );
    Ok(())
}

fn print_structure(root: &Path) {
    let entries = [
        ".portal/",
        ".portal/config.yaml",
        ".portal/portal.db",
        ".portal/templates/",
        ".portal/documents/",
    ];

    for entry in entries {
        let full_path = root.join(entry);
        if full_path.exists() {
            let prefix = if entry.ends_with('/') { "📁" } else { "📄" };
            println!("  {} {}", prefix, style(entry).dim());
        }
    }
}
