//! Command implementations

pub mod app;
pub mod committee;
pub mod company;
pub mod completions;
pub mod dashboard;
pub mod doc;
pub mod init;
pub mod internship;
pub mod placement;
pub mod report;
pub mod review;
pub mod serve;
pub mod supervisor;
pub mod user;
pub mod visit;
