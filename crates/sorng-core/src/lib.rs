//! Shared types and diagnostics infrastructure for the sorng crates.

pub mod diagnostics;
