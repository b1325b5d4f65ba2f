//! Table formatting for CLI list commands
//!
//! All list commands build a [`ListTable`] and hand it the global options;
//! `--format auto` adds a summary line, `--format table` prints the bare
//! table for piping.

use tabled::{builder::Builder, settings::Style};

use crate::cli::{GlobalOpts, OutputFormat};

pub struct ListTable {
    builder: Builder,
    rows: usize,
}

impl ListTable {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut builder = Builder::default();
        builder.push_record(headers.into_iter().map(Into::into));
        Self { builder, rows: 0 }
    }

    pub fn push<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.builder.push_record(row.into_iter().map(Into::into));
        self.rows += 1;
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Render with the portal's table style
    pub fn render(self) -> String {
        self.builder.build().with(Style::sharp()).to_string()
    }

    /// Print the table, or `No <plural> found.` when empty
    pub fn print(self, global: &GlobalOpts, plural: &str) {
        if self.is_empty() {
            if !global.quiet {
                println!("No {} found.", plural);
            }
            return;
        }
        let rows = self.rows;
        println!("{}", self.render());
        if global.format == OutputFormat::Auto && !global.quiet {
            println!("Total: {}", rows);
        }
    }
}
