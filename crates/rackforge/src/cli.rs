//! Clap derive structures for the `rackforge` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// rackforge -- reconcile declarative rack topology into NetBox
#[derive(Debug, Parser)]
#[command(
    name = "rackforge",
    version,
    about = "Reconcile declarative network topology against a NetBox backend",
    long_about = "Reads YAML device definitions and brings the backend into\n\
        agreement with them: devices, chassis bays, modules, ports,\n\
        interfaces, addresses, and cables. Idempotent; never deletes\n\
        objects it does not own.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Backend base URL (overrides config file)
    #[arg(long, short = 'u', env = "NETBOX_URL", global = true)]
    pub url: Option<String>,

    /// Backend API token
    #[arg(long, env = "NETBOX_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Root directory of the YAML definitions tree
    #[arg(long, short = 'd', global = true)]
    pub definitions_dir: Option<PathBuf>,

    /// Accept invalid TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile the definitions tree against the backend
    Sync(SyncArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Simulate: report intended changes without writing anything
    #[arg(long)]
    pub dry_run: bool,
}
