//! Declarative project configuration
//!
//! Configuration is stored in a `dist.toml` document at the project root. It
//! maps product IDs to their build, dist, and publish settings, with
//! `product_defaults` layered underneath every product's own settings
//! (explicit fields win, unset fields inherit the default).
//!
//! The configuration is only a description. Nothing here touches the
//! filesystem or instantiates strategies; that happens during resolution.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::id::{DistId, ProductId};
use super::osarch::OsArch;

/// Top-level project configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProjectConfig {
    /// Per-product settings, keyed by product ID
    pub products: HashMap<ProductId, ProductConfig>,

    /// Settings applied to every product before its own overrides
    pub product_defaults: ProductConfig,

    /// Path patterns excluded from source-tree traversal by collaborators
    /// that scan the project for build entry points
    pub exclude: Vec<String>,
}

impl ProjectConfig {
    /// Loads configuration from a TOML document
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read project config: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse project config: {}", path.display()))
    }
}

/// Per-product settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProductConfig {
    /// Build settings for the external build step
    pub build: Option<BuildConfig>,

    /// Dist settings: which artifact kinds this product produces
    pub dist: Option<DistConfig>,

    /// Publish settings: per-publisher-type configuration blocks
    pub publish: Option<PublishConfig>,

    /// Products this product depends on, in declaration order
    pub dependencies: Option<Vec<ProductId>>,
}

impl ProductConfig {
    /// Layers this config over the project defaults
    ///
    /// Build settings merge field by field; dist, publish, and dependency
    /// sections are taken wholesale from whichever side defines them, the
    /// product's own side winning.
    pub fn merged_with_defaults(&self, defaults: &ProductConfig) -> ProductConfig {
        let build = match (&self.build, &defaults.build) {
            (Some(own), Some(default)) => Some(own.merged_with(default)),
            (Some(own), None) => Some(own.clone()),
            (None, other) => other.clone(),
        };

        ProductConfig {
            build,
            dist: self.dist.clone().or_else(|| defaults.dist.clone()),
            publish: self.publish.clone().or_else(|| defaults.publish.clone()),
            dependencies: self
                .dependencies
                .clone()
                .or_else(|| defaults.dependencies.clone()),
        }
    }
}

/// Settings for the external build step
///
/// The pipeline never compiles anything itself; `script` is the command that
/// produces the build output, invoked with PRODUCT, VERSION, OS, ARCH, and
/// OUTPUT in its environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BuildConfig {
    /// Source package the product is built from (informational)
    pub main_pkg: Option<String>,

    /// Command that produces the build output
    pub script: Option<String>,

    /// Target OS/architecture pairs; defaults to the host when unset
    pub os_archs: Option<Vec<OsArch>>,
}

impl BuildConfig {
    fn merged_with(&self, defaults: &BuildConfig) -> BuildConfig {
        BuildConfig {
            main_pkg: self.main_pkg.clone().or_else(|| defaults.main_pkg.clone()),
            script: self.script.clone().or_else(|| defaults.script.clone()),
            os_archs: self.os_archs.clone().or_else(|| defaults.os_archs.clone()),
        }
    }
}

/// Dist settings: a mapping from dist ID to dister configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DistConfig {
    pub disters: HashMap<DistId, DisterConfig>,
}

/// Configuration for one dister instance
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DisterConfig {
    /// Registered dister type name; defaults to the dist ID when unset
    #[serde(rename = "type")]
    pub type_name: Option<String>,

    /// Opaque dister-specific configuration, validated by the dister itself
    pub config: Option<toml::Value>,
}

/// Publish settings: opaque configuration blocks keyed by publisher type name
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PublishConfig {
    #[serde(flatten)]
    pub blocks: HashMap<String, toml::Value>,
}
