//! `imagepin version` command.

use clap::Args;

#[derive(Args)]
pub struct VersionArgs;

pub async fn execute(_args: VersionArgs) -> Result<(), Box<dyn std::error::Error>> {
    println!("imagepin version {}", imagepin_core::VERSION);
    println!("runtime {}", imagepin_runtime::VERSION);
    Ok(())
}
