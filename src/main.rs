use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use lockbox::cli::commands;
use lockbox::cli::output;
use lockbox::cli::{Cli, Commands};
use lockbox::errors::LockboxError;

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so they never mix with printed secrets.
    let filter = EnvFilter::try_from_env("LOCKBOX_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("lockbox=debug")
        } else {
            EnvFilter::new("lockbox=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let result = match cli.command {
        Commands::Init => commands::init::execute(&cli),
        Commands::Add {
            ref service,
            ref username,
            generate,
            length,
            ref metadata,
        } => commands::add::execute(
            &cli,
            service,
            username,
            generate,
            length,
            metadata.as_deref(),
        ),
        Commands::Get {
            ref service,
            index,
            copy,
        } => commands::get::execute(&cli, service, index, copy),
        Commands::Update {
            ref service,
            index,
            generate,
            length,
        } => commands::update::execute(&cli, service, index, generate, length),
        Commands::List => commands::list::execute(&cli),
        Commands::Remove {
            ref service,
            index,
            force,
        } => commands::remove::execute(&cli, service, index, force),
        Commands::Note { ref action } => commands::note::execute(&cli, action),
        Commands::Passwd => commands::passwd::execute(&cli),
        Commands::Status => commands::status::execute(&cli),
        Commands::Generate { length } => commands::generate::execute(length),
        Commands::Shell => commands::shell::execute(&cli),
        Commands::Check => commands::check::execute(&cli),
    };

    if let Err(e) = result {
        output::error(&e.to_string());
        let hint = match &e {
            LockboxError::RollbackDetected { .. } => {
                Some("the vault file was replaced by an older copy; restore the latest version")
            }
            LockboxError::Conflict { .. } => Some("another lockbox process saved first; run the command again"),
            LockboxError::UnsupportedVersion(_) => Some("this vault was written by a newer lockbox"),
            _ => None,
        };
        if let Some(hint) = hint {
            output::tip(hint);
        }
        std::process::exit(1);
    }
}
