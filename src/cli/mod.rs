//! CLI modules for the factprobe binary.
//!
//! Kept in the library so the argument-to-config mapping can be tested
//! without spawning the binary.

pub mod commands;
pub mod output;
pub mod parser;

pub use parser::{Cli, Commands};

/// Run the selected subcommand.
pub fn dispatch(cli: Cli) -> crate::Result<()> {
    match cli.command {
        Commands::Run(args) => commands::run::cmd_run(args),
        Commands::Suite(args) => commands::suite::cmd_suite(args),
        Commands::Validate(args) => commands::validate::cmd_validate(args),
    }
}
