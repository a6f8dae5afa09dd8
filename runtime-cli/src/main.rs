//! Entry point for the `runtime` command-line tool (spec.md §6.1).
//!
//! Grounded on the teacher's `boxlite-cli/src/main.rs`: parse global flags,
//! initialize logging, dispatch to a subcommand module, map any error to a
//! logged critical message and a process exit code (spec.md §7).

mod cli;
mod commands;

use clap::Parser;
use runtime_shared::init_logging;

use cli::{Cli, Commands};

fn main() {
    let cli = Cli::parse();
    let _guard = init_logging(
        cli.global.log.as_deref(),
        cli.global.global_log.as_deref(),
        cli.global.log_format,
        cli.global.debug,
    );

    let result = match cli.command {
        Commands::Create(args) => commands::create::execute(args, &cli.global),
        Commands::Start(args) => commands::start::execute(args, &cli.global),
        Commands::Run(args) => commands::run::execute(args, &cli.global),
        Commands::Stop(args) => commands::delete::execute(args, &cli.global),
        Commands::Kill(args) => commands::kill::execute(args, &cli.global),
        Commands::Pause(args) => commands::pause::execute(args, &cli.global),
        Commands::Resume(args) => commands::resume::execute(args, &cli.global),
        Commands::Exec(args) => commands::exec::execute(args, &cli.global).map(|code| {
            std::process::exit(code);
        }),
        Commands::State(args) => commands::state::execute(args, &cli.global),
        Commands::List(args) => commands::list::execute(args, &cli.global),
        Commands::Events(args) => commands::events::execute(args, &cli.global),
        Commands::Version(args) => commands::version::execute(args, &cli.global),
        Commands::Checkpoint(args) => commands::checkpoint::execute(args, &cli.global),
        Commands::Restore(args) => commands::restore::execute(args, &cli.global),
        Commands::Update(args) => commands::update::execute(args, &cli.global),
        Commands::Ps(args) => commands::ps::execute(args, &cli.global),
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}
