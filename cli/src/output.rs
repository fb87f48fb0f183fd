//! Table formatting helpers for CLI output.

use comfy_table::{ContentArrangement, Table};
use imagepin_runtime::ResourceFailure;

/// Create a styled table with the given headers.
pub fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.load_preset(comfy_table::presets::NOTHING);
    table.set_header(headers);
    table
}

/// Table of failed files and resources.
pub fn failure_table(failures: &[ResourceFailure]) -> Table {
    let mut table = new_table(&["FILE", "RESOURCE", "PATH", "ERROR"]);
    for failure in failures {
        table.add_row(vec![
            failure.file.display().to_string(),
            describe_resource(failure),
            failure.path.clone().unwrap_or_else(|| "-".to_string()),
            failure.error.clone(),
        ]);
    }
    table
}

/// `Kind/name`, falling back to the resource index, or `-` for whole-file
/// failures. A namespace is appended in parentheses.
pub fn describe_resource(failure: &ResourceFailure) -> String {
    let described = match (failure.resource, failure.kind.is_empty(), failure.name.is_empty()) {
        (None, _, _) => return "-".to_string(),
        (Some(_), false, false) => format!("{}/{}", failure.kind, failure.name),
        (Some(_), false, true) => failure.kind.clone(),
        (Some(index), true, _) => format!("#{}", index),
    };
    match &failure.namespace {
        Some(namespace) => format!("{} ({})", described, namespace),
        None => described,
    }
}
