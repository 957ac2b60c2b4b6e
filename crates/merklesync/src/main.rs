use std::env::var;
use std::io::stderr;
use std::process::ExitCode;

use clap::Parser;
use eyre::Result as EyreResult;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{registry, EnvFilter};

mod cli;
mod defaults;
mod output;

use cli::RootCommand;

fn main() -> ExitCode {
    if let Err(err) = setup() {
        eprintln!("Failed to initialise: {err:?}");
        return ExitCode::FAILURE;
    }

    let command = RootCommand::parse();

    match command.run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => err.into(),
    }
}

fn setup() -> EyreResult<()> {
    let directives = match var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => "merklesync=info,merklesync_=info".to_owned(),
    };

    // stdout carries command output
    registry()
        .with(EnvFilter::builder().parse(directives)?)
        .with(layer().with_writer(stderr))
        .init();

    color_eyre::install()?;

    Ok(())
}
