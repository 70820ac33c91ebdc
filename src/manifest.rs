use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ir::Class;

/// Description of the analyzed program: its classes, their annotations and
/// the call sites found in their methods.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Manifest {
    #[serde(default)]
    pub classes: Vec<Class>,
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_manifest(&data).with_context(|| format!("failed to parse {}", path.display()))
}

pub fn parse_manifest(data: &[u8]) -> Result<Manifest> {
    let mut manifest: Manifest =
        serde_json::from_slice(data).context("invalid manifest JSON")?;

    // Keep deterministic ordering by sorting classes by name.
    manifest.classes.sort_by(|a, b| a.name.cmp(&b.name));

    let mut seen = BTreeSet::new();
    for class in &manifest.classes {
        if class.name.is_empty() {
            anyhow::bail!("class with empty name");
        }
        if !seen.insert(class.name.as_str()) {
            anyhow::bail!("duplicate class {}", class.name);
        }
    }

    Ok(manifest)
}
