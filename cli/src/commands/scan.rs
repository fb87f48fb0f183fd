//! `imagepin scan` command - List annotated references.

use std::path::PathBuf;

use clap::Args;
use imagepin_core::{PinConfig, DEFAULT_MARKER};
use imagepin_runtime::{PackagePipeline, RegistryResolver};

use crate::output;

#[derive(Args)]
pub struct ScanArgs {
    /// Package directory searched for YAML documents
    #[arg(short, long)]
    pub directory: PathBuf,

    /// Trailing comment suffix that marks a value for pinning
    #[arg(short = 'c', long = "comment", default_value = DEFAULT_MARKER)]
    pub marker: String,

    /// Print the result as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = PinConfig {
        marker: args.marker,
        ..PinConfig::for_directory(args.directory)
    };
    // Never consulted: scanning only reads the tree.
    let resolver = RegistryResolver::new(&config.registry);
    let pipeline = PackagePipeline::new(config, resolver)?;

    let report = pipeline.scan()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.entries.is_empty() {
        println!("No annotated references found");
    } else {
        let mut table = output::new_table(&["FILE", "RESOURCE", "PATH", "REFERENCE"]);
        for entry in &report.entries {
            table.add_row(vec![
                entry.file.display().to_string(),
                entry.resource.to_string(),
                entry.site.path.clone(),
                entry.site.value.clone(),
            ]);
        }
        println!("{table}");
    }

    if !report.failures.is_empty() {
        eprintln!("{}", output::failure_table(&report.failures));
        return Err(format!("{} file(s) could not be read", report.failures.len()).into());
    }
    Ok(())
}
