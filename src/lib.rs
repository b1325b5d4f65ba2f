//! Internship Portal - application, review, committee approval and document
//! workflow for university internships
//!
//! The crate is organized as:
//! - [`core`]: domain types, the SQLite store and the [`core::Portal`] service
//! - [`documents`]: Tera rendering of letters and certificates
//! - [`cli`]: the `portal` command line
//! - [`server`]: the JSON HTTP API

pub mod cli;
pub mod core;
pub mod documents;
pub mod server;

pub use core::{Config, Portal, PortalError, PortalResult, Project};
