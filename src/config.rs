//! Resource manifest.
//!
//! ```toml
//! [provider]
//! base_url = "https://gitlab.example.com"
//!
//! [[resource]]
//! type = "gitlab_group"
//! name = "platform"
//! attributes = { name = "Platform", path = "platform", visibility_level = "private" }
//! ```
//!
//! Attribute values are literals; there are no expressions or references
//! between resources.

use anyhow::{Context, Result, bail};
use labkit::GitLabProvider;
use reconcile::{Provider, Value};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub provider: labkit::Config,

    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceBlock>,
}

/// One declared resource instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResourceBlock {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
}

impl ResourceBlock {
    /// `type.name`
    pub fn address(&self) -> String {
        reconcile::plan::address(&self.resource_type, &self.name)
    }
}

impl Manifest {
    /// Load and check a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        let manifest = Self::parse(&content)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        log::debug!(
            "Loaded {} resource(s) from {}",
            manifest.resources.len(),
            path.display()
        );
        Ok(manifest)
    }

    fn parse(content: &str) -> Result<Self> {
        let mut manifest: Self = toml::from_str(content)?;
        manifest.provider.apply_env(|name| std::env::var(name).ok());
        manifest.check(&GitLabProvider::new())?;
        Ok(manifest)
    }

    /// Reject unknown types, bad names and duplicate addresses
    pub fn check(&self, provider: &GitLabProvider) -> Result<()> {
        let mut seen = HashSet::new();
        for block in &self.resources {
            let address = block.address();
            if provider.resource(&block.resource_type).is_none() {
                bail!(
                    "{address}: unknown resource type {:?} (supported: {})",
                    block.resource_type,
                    provider.type_names().join(", ")
                );
            }
            if block.name.is_empty() || block.name.contains('.') {
                bail!("{address}: resource names must be non-empty and contain no '.'");
            }
            if !seen.insert(address.clone()) {
                bail!("{address} is declared more than once");
            }
        }
        Ok(())
    }

    /// Find a block by address
    pub fn find(&self, address: &str) -> Option<&ResourceBlock> {
        self.resources.iter().find(|b| b.address() == address)
    }
}

/// Split `type.name`
pub fn split_address(address: &str) -> Result<(&str, &str)> {
    match address.split_once('.') {
        Some((resource_type, name)) if !resource_type.is_empty() && !name.is_empty() => {
            Ok((resource_type, name))
        }
        _ => bail!("invalid address {address:?}, expected <type>.<name>"),
    }
}
