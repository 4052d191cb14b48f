//! Resolved, immutable pipeline parameters
//!
//! `ProjectParam` and `ProductParam` are the post-merge, post-validation
//! counterparts of the configuration types, carrying fully instantiated
//! strategy instances instead of type names. They are constructed once per
//! invocation by [`ProjectConfig::resolve`](super::config::ProjectConfig)
//! and never mutated afterwards; pipeline stages only read them.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Serialize;

use super::graph::{GraphError, ProductGraph};
use super::id::{DistId, ProductId};
use super::osarch::OsArch;
use super::paths;
use super::resolve::ConfigError;
use crate::dister::Dister;

/// Environmental facts about the project, independent of configuration
///
/// Constructed once and passed alongside the resolved parameters to every
/// pipeline stage. The version string comes from an external version
/// resolution collaborator and must already be validated as non-empty.
#[derive(Debug, Clone)]
pub struct ProjectInfo {
    pub project_dir: PathBuf,
    pub version: String,
}

impl ProjectInfo {
    pub fn new(project_dir: impl Into<PathBuf>, version: impl Into<String>) -> Result<Self, ConfigError> {
        let version = version.into();
        if version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }
        Ok(Self {
            project_dir: project_dir.into(),
            version,
        })
    }
}

/// Fully resolved project parameters
#[derive(Debug)]
pub struct ProjectParam {
    pub(crate) products: HashMap<ProductId, ProductParam>,
    pub(crate) exclude: Vec<String>,
    pub(crate) project_dir: PathBuf,
    pub(crate) version: String,
    pub(crate) graph: ProductGraph,
    pub(crate) topo_order: Vec<ProductId>,
}

impl ProjectParam {
    /// Looks up one product's resolved parameters
    pub fn product(&self, id: &ProductId) -> Option<&ProductParam> {
        self.products.get(id)
    }

    /// All resolved products, keyed by ID
    pub fn products(&self) -> &HashMap<ProductId, ProductParam> {
        &self.products
    }

    /// Source-tree exclude patterns carried from the configuration
    pub fn exclude(&self) -> &[String] {
        &self.exclude
    }

    /// Every product, dependencies before dependents
    pub fn topological_order(&self) -> &[ProductId] {
        &self.topo_order
    }

    /// Transitive dependencies of a product, dependencies first
    ///
    /// Informational / build-ordering only; never used to widen a dist or
    /// publish selection.
    pub fn dependencies_of(&self, id: &ProductId) -> Result<Vec<ProductId>, GraphError> {
        self.graph.dependencies_of(id)
    }

    /// The environmental facts this parameter set was resolved against
    pub fn project_info(&self) -> Result<ProjectInfo, ConfigError> {
        ProjectInfo::new(self.project_dir.clone(), self.version.clone())
    }
}

/// Fully resolved parameters for one product
#[derive(Debug)]
pub struct ProductParam {
    pub id: ProductId,

    /// External build step settings, if the product has a build
    pub build: Option<BuildParam>,

    /// Target OS/arch pairs all dists of this product are produced for
    pub os_archs: Vec<OsArch>,

    /// Instantiated dister per configured dist kind
    pub dist: HashMap<DistId, DistParam>,

    /// Per-publisher-type configuration blocks
    pub publish: PublishParam,

    /// Direct dependencies, in declaration order
    pub dependencies: Vec<ProductId>,
}

impl ProductParam {
    /// All artifact paths this product's configuration resolves to,
    /// keyed by dist ID, ordered by the product's OS/arch list
    ///
    /// A pure recomputation; no filesystem access.
    pub fn dist_artifact_paths(&self, info: &ProjectInfo) -> HashMap<DistId, Vec<PathBuf>> {
        let mut result = HashMap::new();
        for (dist_id, dist) in &self.dist {
            let paths: Vec<PathBuf> = self
                .os_archs
                .iter()
                .map(|os_arch| {
                    paths::dist_artifact_path(
                        &info.project_dir,
                        &self.id,
                        &info.version,
                        dist_id,
                        os_arch,
                        dist.dister.extension(),
                    )
                })
                .collect();
            result.insert(dist_id.clone(), paths);
        }
        result
    }
}

/// Resolved external build step settings
#[derive(Debug, Clone)]
pub struct BuildParam {
    pub main_pkg: Option<String>,
    pub script: Option<String>,
}

/// One resolved dist kind: the registered type name, the opaque
/// configuration it was instantiated from, and the instance itself
#[derive(Debug)]
pub struct DistParam {
    pub type_name: String,
    pub config: Option<toml::Value>,
    pub dister: Box<dyn Dister>,
}

/// Resolved publish settings
#[derive(Debug, Clone, Default)]
pub struct PublishParam {
    /// Opaque configuration blocks keyed by publisher type name
    pub blocks: HashMap<String, toml::Value>,
}

/// The result of running build + dist for one product
///
/// This is the only data a publisher receives, and the sole handoff to the
/// container-image pipeline: a product's identity, version, and its own
/// artifact paths. A dependency's artifacts never appear here.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProductTaskOutputInfo {
    pub product: ProductId,
    pub version: String,

    /// Artifact file paths produced per dist kind
    pub dist_artifacts: HashMap<DistId, Vec<PathBuf>>,
}

impl ProductTaskOutputInfo {
    /// Dist IDs in sorted order, for deterministic output
    pub fn sorted_dist_ids(&self) -> Vec<&DistId> {
        let mut ids: Vec<&DistId> = self.dist_artifacts.keys().collect();
        ids.sort();
        ids
    }

    /// Artifact paths for one dist kind
    pub fn artifacts_for(&self, dist_id: &DistId) -> &[PathBuf] {
        self.dist_artifacts
            .get(dist_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }
}
