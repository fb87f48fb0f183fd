//! `imagepin pin` command - Resolve and rewrite annotated references.

use std::path::PathBuf;

use clap::Args;
use imagepin_core::{PinConfig, RegistryConfig, DEFAULT_MARKER};
use imagepin_runtime::{registry_resolver, PackagePipeline, PipelineReport};

use crate::output;

#[derive(Args)]
pub struct PinArgs {
    /// Package directory searched for YAML documents
    #[arg(short, long)]
    pub directory: PathBuf,

    /// Trailing comment suffix that marks a value for pinning
    #[arg(short = 'c', long = "comment", default_value = DEFAULT_MARKER)]
    pub marker: String,

    /// Resolve and report, but do not write files
    #[arg(long)]
    pub dry_run: bool,

    /// Parse every YAML file, even when it does not contain the marker
    #[arg(long)]
    pub no_prefilter: bool,

    /// Resolve every occurrence, even when a reference repeats
    #[arg(long)]
    pub no_cache: bool,

    /// Registry reached over plain HTTP (repeatable)
    #[arg(long = "insecure-registry", value_name = "HOST")]
    pub insecure_registries: Vec<String>,

    /// Per-request registry timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub timeout: u64,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl PinArgs {
    pub fn config(&self) -> PinConfig {
        PinConfig {
            marker: self.marker.clone(),
            directory: self.directory.clone(),
            skip_prefilter: self.no_prefilter,
            dry_run: self.dry_run,
            cache_digests: !self.no_cache,
            registry: RegistryConfig {
                insecure_registries: self.insecure_registries.clone(),
                timeout_secs: self.timeout,
            },
            ..PinConfig::default()
        }
    }
}

pub async fn execute(args: PinArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.config();
    let resolver = registry_resolver(&config);
    let pipeline = PackagePipeline::new(config, resolver)?;

    let report = pipeline.run().await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report, args.dry_run);
    }

    if report.has_failures() {
        return Err(format!("{} resource(s) could not be pinned", report.failures.len()).into());
    }
    Ok(())
}

fn print_report(report: &PipelineReport, dry_run: bool) {
    if report.updates.is_empty() {
        println!("No annotated references updated");
    } else {
        let mut table = output::new_table(&["FILE", "PATH", "OLD", "NEW"]);
        for update in &report.updates {
            table.add_row(vec![
                update.file.display().to_string(),
                update.record.path.clone(),
                update.record.old_reference.clone(),
                update.record.new_reference.clone(),
            ]);
        }
        println!("{table}");
    }

    if !report.failures.is_empty() {
        eprintln!("{}", output::failure_table(&report.failures));
    }

    let verb = if dry_run { "would change" } else { "changed" };
    println!(
        "{} file(s) scanned, {} skipped, {} {}",
        report.files_scanned, report.files_skipped, report.files_changed, verb
    );
}
