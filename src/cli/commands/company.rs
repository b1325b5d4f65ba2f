//! `portal company` command - Host companies

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{print_json, session, success, truncate_str};
use crate::cli::table::ListTable;
use crate::cli::GlobalOpts;
use crate::core::db::catalog::NewCompany;

#[derive(Subcommand, Debug)]
pub enum CompanyCommands {
    /// Register a host company (staff)
    Add(AddArgs),

    /// List companies
    List,
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Company name (unique)
    pub name: String,

    /// Postal address used on letters
    #[arg(long)]
    pub address: Option<String>,

    /// Person the acceptance request is addressed to
    #[arg(long)]
    pub contact_name: Option<String>,

    #[arg(long)]
    pub contact_email: Option<String>,
}

pub fn run(cmd: CompanyCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        CompanyCommands::Add(args) => run_add(args, global),
        CompanyCommands::List => run_list(global),
    }
}

fn run_add(args: AddArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let company = portal
        .add_company(
            &actor,
            &NewCompany {
                name: args.name,
                address: args.address,
                contact_name: args.contact_name,
                contact_email: args.contact_email,
            },
        )
        .into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&company);
    }
    success(
        global,
        format!(
            "Added company {} as {}",
            style(&company.name).cyan(),
            style(format!("CO@{}", company.row)).yellow()
        ),
    );
    Ok(())
}

fn run_list(global: &GlobalOpts) -> Result<()> {
    let (portal, _actor) = session(global)?;
    let companies = portal.list_companies().into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&companies);
    }

    let mut table = ListTable::new(["REF", "NAME", "CONTACT", "ADDRESS"]);
    for company in &companies {
        let contact = match (&company.contact_name, &company.contact_email) {
            (Some(name), Some(email)) => format!("{} <{}>", name, email),
            (Some(name), None) => name.clone(),
            (None, Some(email)) => email.clone(),
            (None, None) => "-".to_string(),
        };
        table.push([
            format!("CO@{}", company.row),
            company.name.clone(),
            contact,
            truncate_str(company.address.as_deref().unwrap_or("-"), 40),
        ]);
    }
    table.print(global, "companies");
    Ok(())
}
