mod cli;
mod commands;
mod config;
mod error;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use onefs_api::Client;

use crate::cli::{Cli, Command};
use crate::commands::Verb;
use crate::error::CliError;

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli) {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let (verb, args) = match cli.command {
        Command::Completions(args) => {
            use clap::CommandFactory;

            let mut cmd = Cli::command();
            clap_complete::generate(args.shell, &mut cmd, "onefs", &mut std::io::stdout());
            return Ok(());
        }
        Command::Version => {
            let client = connect(&cli.global)?;
            println!("{}", client.api_version());
            return Ok(());
        }
        Command::Get(args) => (Verb::Get, args),
        Command::Post(args) => (Verb::Post, args),
        Command::Put(args) => (Verb::Put, args),
        Command::Delete(args) => (Verb::Delete, args),
    };

    let client = connect(&cli.global)?;
    tracing::debug!(?verb, path = %args.path, "dispatching request");
    commands::handle(verb, args, &client)
}

/// Resolve configuration and open a client (login + version discovery).
fn connect(global: &cli::GlobalOpts) -> Result<Client, CliError> {
    let config = config::build_client_config(global)?;
    let endpoint = config.endpoint.clone();
    Client::new(config).map_err(|err| CliError::from_client(err, &endpoint))
}
