//! tessdb command-line tool library
//!
//! Exposes store opening and the subcommands for integration testing.

pub mod commands;
pub mod lifecycle;
