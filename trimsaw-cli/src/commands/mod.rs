//! Command implementations for the CLI.
//!
//! Each submodule contains the implementation of a specific subcommand.

pub mod probe;
pub mod trim;
