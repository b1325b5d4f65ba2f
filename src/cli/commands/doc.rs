//! `portal doc` command - Generated letters and certificates

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{format_datetime, print_json, session, success};
use crate::cli::table::ListTable;
use crate::cli::GlobalOpts;
use crate::core::db::DocumentKind;

#[derive(Subcommand, Debug)]
pub enum DocCommands {
    /// Render a document for an application (staff)
    Generate(GenerateArgs),

    /// List documents generated for an application
    List(ListArgs),
}

#[derive(clap::Args, Debug)]
pub struct GenerateArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,

    /// Document kind
    #[arg(value_enum)]
    pub kind: DocumentKind,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Application reference (APP@N, @N or ID)
    pub app: String,
}

pub fn run(cmd: DocCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        DocCommands::Generate(args) => run_generate(args, global),
        DocCommands::List(args) => run_list(args, global),
    }
}

fn run_generate(args: GenerateArgs, global: &GlobalOpts) -> Result<()> {
    let (mut portal, actor) = session(global)?;
    let doc = portal
        .generate_document(&actor, &args.app, args.kind)
        .into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&doc);
    }
    success(
        global,
        format!(
            "Generated {} at {}",
            style(doc.kind.as_str()).cyan(),
            style(doc.file_path.display()).dim()
        ),
    );
    if global.verbose {
        println!("  sha256 {}", doc.sha256);
    }
    Ok(())
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let (portal, actor) = session(global)?;
    let docs = portal.list_documents(&actor, &args.app).into_diagnostic()?;

    if global.format.is_json() {
        return print_json(&docs);
    }

    let mut table = ListTable::new(["REF", "KIND", "GENERATED", "BY", "SHA256", "FILE"]);
    for doc in &docs {
        table.push([
            format!("DOC@{}", doc.row),
            doc.kind.as_str().to_string(),
            format_datetime(&doc.created),
            doc.generated_by.clone(),
            doc.sha256.chars().take(12).collect(),
            doc.file_path.display().to_string(),
        ]);
    }
    table.print(global, "documents");
    Ok(())
}
