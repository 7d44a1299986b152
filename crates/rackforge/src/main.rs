mod cli;
mod error;
mod loader;

use clap::Parser;
use owo_colors::OwoColorize;
use tracing_subscriber::EnvFilter;

use rackforge_api::NetBoxClient;
use rackforge_core::Engine;

use crate::cli::{Cli, Command, GlobalOpts, SyncArgs};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    if let Err(err) = run(cli).await {
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
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Command::Sync(args) => sync(&cli.global, &args).await,
    }
}

async fn sync(global: &GlobalOpts, args: &SyncArgs) -> Result<(), CliError> {
    let config = resolve_config(global)?;

    let loaded = loader::load_devices(&config.definitions_dir)?;
    for (path, message) in &loaded.errors {
        eprintln!("{} {}: {message}", "parse error".red().bold(), path.display());
    }
    if !loaded.errors.is_empty() {
        return Err(CliError::BadDefinitions {
            count: loaded.errors.len(),
        });
    }
    if loaded.devices.is_empty() {
        return Err(CliError::NoDefinitions {
            path: config.definitions_dir.display().to_string(),
        });
    }

    println!(
        "Loaded {} device definition(s) from {}",
        loaded.devices.len().bold(),
        config.definitions_dir.display()
    );
    if args.dry_run {
        println!("{}", "Dry-run mode: no changes will be applied.".yellow());
    }

    let client =
        NetBoxClient::new(&config.url, &config.token, &config.transport).map_err(|e| match e {
            rackforge_api::Error::InvalidToken => CliError::AuthFailed,
            other => CliError::ConnectionFailed {
                url: config.url.clone(),
                source: other,
            },
        })?;

    let summary = Engine::new(&client, args.dry_run).run(&loaded.devices).await;

    println!();
    if summary.failed > 0 {
        println!(
            "{} {} of {} device(s) failed, see log above",
            "✗".red().bold(),
            summary.failed,
            summary.total
        );
    }
    if summary.dry_run {
        println!("{}", "DRY RUN COMPLETE: no changes applied.".yellow().bold());
    } else {
        println!(
            "{} {} device(s) reconciled",
            "✔".green().bold(),
            summary.succeeded
        );
        println!("{}", "SYNC COMPLETE".green().bold());
    }

    Ok(())
}

/// Merge CLI flags over the file/env configuration.
fn resolve_config(global: &GlobalOpts) -> Result<rackforge_config::ResolvedConfig, CliError> {
    let mut config = rackforge_config::load()?;

    if let Some(url) = &global.url {
        config.url = Some(url.clone());
    }
    if let Some(token) = &global.token {
        config.token = Some(token.clone());
    }
    if let Some(dir) = &global.definitions_dir {
        config.definitions_dir.clone_from(dir);
    }
    if global.insecure {
        config.insecure = true;
    }

    Ok(config.resolve()?)
}
