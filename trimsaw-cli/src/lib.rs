// trimsaw-cli/src/lib.rs
//
// Library portion of the trimsaw CLI. Holds the argument definitions and
// command logic so integration tests can drive them.

pub mod cli;
pub mod commands;
pub mod logging;
pub mod progress;
pub mod terminal;

pub use cli::{Cli, Commands, ProbeArgs, TrimArgs};
pub use commands::probe::run_probe;
pub use commands::trim::run_trim;
