//! `snapmon`: command-line front end for the VMware snapshot monitor.
//!
//! Configuration comes from a JSON file, `SNAPMON_*` environment variables
//! and flags; results go to stdout as a table or JSON, and the process exit
//! code carries the error category.

pub mod cli;
pub mod config;
pub mod exit;
pub mod report;

pub use cli::run;
