//! CRD manifest generator
//!
//! Prints the CustomResourceDefinitions of all registered kinds as one YAML
//! stream. Configuration via environment variables:
//! - `CRDGEN_OUTPUT`: write to this file instead of stdout
//! - `RUST_LOG`: log filter (default `info`), logs go to stderr

use std::env;
use std::fs;

use anyhow::{Context, Result};
use hetzner_crds::SchemeRegistry;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let registry = SchemeRegistry::with_defaults().context("failed to build kind registry")?;
    let manifest = registry.crds_yaml()?;

    match env::var("CRDGEN_OUTPUT").ok().filter(|p| !p.is_empty()) {
        Some(path) => {
            fs::write(&path, &manifest).with_context(|| format!("failed to write {path}"))?;
            info!("Wrote {} CRD(s) to {}", registry.kinds().count(), path);
        }
        None => print!("{manifest}"),
    }

    Ok(())
}
