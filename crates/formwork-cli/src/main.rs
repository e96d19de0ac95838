//! Formwork CLI: the `formwork` command.

mod cli;
mod commands;
mod support;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            form,
            request,
            config,
            now,
            json,
        } => commands::check::run(form, request, config, now, json),

        Commands::Infer {
            columns,
            boolean_checkboxes,
            intelligence,
            required,
            not_required,
            kinds,
            json,
        } => commands::infer::run(commands::infer::Args {
            columns,
            boolean_checkboxes,
            intelligence,
            required,
            not_required,
            kinds,
            json,
        }),

        Commands::Matrix { config, json } => commands::matrix::run(config, json),
    }
}
