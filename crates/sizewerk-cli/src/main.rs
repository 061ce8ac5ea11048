// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Sizewerk — target-size-driven document compression
//
// Entry point. Initialises logging, parses arguments, runs one subcommand and
// prints its JSON result on stdout.

mod cli;
mod commands;

use std::process::ExitCode;

use clap::Parser;

use cli::{Cli, Command};
use commands::CompressArgs;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(?cli, "Sizewerk starting");

    let outcome = match cli.command {
        Command::Compress {
            file,
            size,
            unit,
            output,
            config,
            gs,
            attempts,
        } => commands::compress(CompressArgs {
            file,
            size,
            unit,
            output,
            config,
            gs,
            attempts,
        }),
        Command::ImagesToPdf {
            images,
            output,
            title,
        } => commands::images_to_pdf(&images, &output, title.as_deref()),
        Command::Watermark { pdf, text, output } => commands::watermark(&pdf, &text, output),
    };

    match outcome.and_then(|value| Ok(serde_json::to_string_pretty(&value)?)) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!(error = %err, "Command failed");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
