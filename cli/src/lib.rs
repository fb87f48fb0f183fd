//! imagepin CLI - pin container image references in YAML packages to digests.

pub mod commands;
pub mod output;
