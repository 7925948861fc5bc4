//! Subcommand dispatch and execution.
//!
//! The [`dispatch`] function routes the parsed CLI to the appropriate
//! subcommand handler: [`run`], [`validate`], or [`health`]. Each
//! handler lives in its own submodule and builds whatever tokio
//! runtime it needs.

pub mod health;
pub mod run;
pub mod validate;

use crate::cli::{Cli, Commands};
use crate::error::ServiceError;

pub fn dispatch(cli: Cli) -> Result<(), ServiceError> {
    match cli.command {
        Some(Commands::Run(args)) => run::execute(*args),
        Some(Commands::Validate(ref args)) => validate::execute(args),
        Some(Commands::Health(args)) => health::execute(&args),
        None => {
            print_welcome();
            Ok(())
        }
    }
}

fn print_welcome() {
    let version = env!("CARGO_PKG_VERSION");
    println!(
        "\n  service-template v{version}: HTTP microservice template\n\n  \
         No command provided. To get started:\n\n    \
         service-template run                 Start with ./config (local environment)\n    \
         service-template run -e test         Start with the test overrides\n    \
         service-template validate            Check the merged configuration\n    \
         service-template --help              See all commands and options\n"
    );
}
