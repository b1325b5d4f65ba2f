//! `portal user` command - User accounts and roles

use clap::Subcommand;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{format_datetime, print_json, session, success};
use crate::cli::table::ListTable;
use crate::cli::GlobalOpts;
use crate::core::db::User;
use crate::core::portal::NewUser;
use crate::core::role::{Role, RoleSet};

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Register a user (admin)
    Add(AddArgs),

    /// List users
    List(ListArgs),

    /// Show one user
    Show(ShowArgs),

    /// Deactivate a user (admin)
    Deactivate(DeactivateArgs),

    /// Replace a user's roles (admin)
    Roles(RolesArgs),
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Login name (letters, digits, '.', '_' or '-')
    pub username: String,

    /// Display name
    #[arg(long, short = 'n')]
    pub name: String,

    /// Email address
    #[arg(long, short = 'e')]
    pub email: String,

    /// Role to grant (repeat for several)
    #[arg(long = "role", short = 'r', value_enum, required = true)]
    pub roles: Vec<Role>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only users holding this role
    #[arg(long, value_enum)]
    pub role: Option<Role>,

    /// Include deactivated users
    #[arg(long)]
    pub all: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Username or user ID
    pub user: String,
}

#[derive(clap::Args, Debug)]
pub struct DeactivateArgs {
    /// Username or user ID
    pub user: String,

    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

#[derive(clap::Args, Debug)]
pub struct RolesArgs {
    /// Username or user ID
    pub user: String,

    /// New roles, comma separated (e.g. "instructor,committee")
    #[arg(value_parser = RoleSet::parse)]
    pub roles: RoleSet,
}

pub fn run(cmd: UserCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        UserCommands::Add(args) => run_add(args, global),
        UserCommands::List(args) => run_list(args, global),
        UserCommands::Show(args) => run_show(args, global),
        UserCommands::Deactivate(args) => run_deactivate(args, global),
        UserCommands::Roles(args) => run_roles(args, global),
    }
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let new_user = NewUser {
        username: args.username,
        name: args.name,
        email: args.email,
        roles: RoleSet::new(args.roles),
    };
    let user = portal.register_user(&actor, &new_user).into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&user);
    }
    success(
        global,
        format!(
            "Registered {} ({})",
            style(&user.username).cyan(),
            user.roles
        ),
    );
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (portal, _actor) = session(global)?;
    let users = portal.list_users(args.role, args.all).into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&users);
    }

    let mut table = ListTable::new(["REF", "USERNAME", "NAME", "EMAIL", "ROLES", "ACTIVE"]);
    for user in &users {
        table.push([
            format!("USR@{}", user.row),
            user.username.clone(),
            user.name.clone(),
            user.email.clone(),
            user.roles.to_string(),
            if user.active { "yes" } else { "no" }.to_string(),
        ]);
    }
    table.print(global, "users");
    Ok(())
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let (portal, _actor) = session(global)?;
    let user = portal.find_user(&args.user).into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&user);
    }
    print_user(&user);
    Ok(())
}

fn run_deactivate(args: DeactivateArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let target = portal.find_user(&args.user).into_diagnostic()?;

    if !args.yes {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Deactivate {} ({})?", target.username, target.name))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let user = portal
        .deactivate_user(&actor, &target.id.to_string())
        .into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&user);
    }
    success(global, format!("Deactivated {}", style(&user.username).cyan()));
    Ok(())
}

fn run_roles(args: RolesArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let user = portal
        .set_roles(&actor, &args.user, &args.roles)
        .into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&user);
    }
    success(
        global,
        format!("{} now holds: {}", style(&user.username).cyan(), user.roles),
    );
    Ok(())
}

fn print_user(user: &User) {
    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("ID").bold(), style(&user.id).cyan());
    println!("{}: {}", style("Username").bold(), user.username);
    println!("{}: {}", style("Name").bold(), user.name);
    println!("{}: {}", style("Email").bold(), user.email);
    println!("{}: {}", style("Roles").bold(), user.roles);
    println!(
        "{}: {}",
        style("Active").bold(),
        if user.active {
            style("yes").green()
        } else {
            style("no").red()
        }
    );
    println!("{}: {}", style("Created").bold(), format_datetime(&user.created));
    println!("{}", style("─".repeat(60)).dim());
}
