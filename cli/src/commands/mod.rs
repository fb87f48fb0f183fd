//! CLI command definitions and dispatch.

mod login;
mod logout;
mod pin;
mod scan;
mod version;

use clap::{Parser, Subcommand};
use imagepin_core::LogLevel;

/// imagepin - pin container image references to their manifest digests.
#[derive(Parser)]
#[command(name = "imagepin", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log level (trace, debug, info, warn, error); overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Resolve annotated image references and rewrite them with digests
    Pin(pin::PinArgs),
    /// List annotated image references without contacting a registry
    Scan(scan::ScanArgs),
    /// Log in to a container registry
    Login(login::LoginArgs),
    /// Log out from a container registry
    Logout(logout::LogoutArgs),
    /// Show version information
    Version(version::VersionArgs),
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Pin(args) => pin::execute(args).await,
        Command::Scan(args) => scan::execute(args).await,
        Command::Login(args) => login::execute(args).await,
        Command::Logout(args) => logout::execute(args).await,
        Command::Version(args) => version::execute(args).await,
    }
}
