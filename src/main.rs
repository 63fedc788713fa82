//
//  git-providers
//  main.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use git_providers::cli::{Cli, Commands};
use git_providers::exit_codes;

#[tokio::main]
async fn main() {
    init_logging();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(exit_codes::for_error(&e));
        }
    }
}

/// Logging goes to stderr, filtered by `GP_DEBUG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("GP_DEBUG").unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Parse(cmd) => cmd.run(&cli.global).await,
        Commands::Link(cmd) => cmd.run(&cli.global).await,
        Commands::Context(cmd) => cmd.run(&cli.global).await,
        Commands::Namespaces(cmd) => cmd.run(&cli.global).await,
        Commands::Repos(cmd) => cmd.run(&cli.global).await,
        Commands::Branches(cmd) => cmd.run(&cli.global).await,
        Commands::Prs(cmd) => cmd.run(&cli.global).await,
        Commands::Whoami(cmd) => cmd.run(&cli.global).await,
        Commands::Providers(cmd) => cmd.run(&cli.global).await,
        Commands::Completion(cmd) => cmd.run(&cli.global).await,
    }
}
