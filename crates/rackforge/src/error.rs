//! CLI error types with miette diagnostics.

use miette::Diagnostic;
use thiserror::Error;

/// Exit codes for process termination.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    #[error("Could not connect to backend at {url}")]
    #[diagnostic(
        code(rackforge::connection_failed),
        help("Check that the backend is running and reachable.\nURL: {url}")
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: rackforge_api::Error,
    },

    #[error("Backend rejected the API token")]
    #[diagnostic(
        code(rackforge::auth_failed),
        help("Verify NETBOX_TOKEN (or `token` in rackforge.toml).")
    )]
    AuthFailed,

    #[error(transparent)]
    #[diagnostic(
        code(rackforge::config),
        help("Set NETBOX_URL and NETBOX_TOKEN, or create rackforge.toml.")
    )]
    Config(#[from] rackforge_config::ConfigError),

    #[error("No device definitions found under {path}")]
    #[diagnostic(
        code(rackforge::no_definitions),
        help("Expected YAML files under inventory/hardware/{{active,passive}}/.")
    )]
    NoDefinitions { path: String },

    #[error("{count} definition file(s) failed to parse")]
    #[diagnostic(
        code(rackforge::bad_definitions),
        help("Fix the files listed above and re-run.")
    )]
    BadDefinitions { count: usize },

    #[error(transparent)]
    Api(#[from] rackforge_api::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed => exit_code::AUTH,
            Self::Config(_) | Self::NoDefinitions { .. } | Self::BadDefinitions { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}
