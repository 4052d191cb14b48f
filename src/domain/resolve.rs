//! Resolution of declarative configuration into immutable parameters
//!
//! Resolution is the single gate between configuration and execution: it
//! merges product defaults, instantiates and validates every configured
//! strategy against the registries, validates the dependency graph, and
//! proves artifact-path collision freedom. Every configuration error
//! surfaces here, before any filesystem or process side effect.

use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use super::config::{DistConfig, DisterConfig, ProjectConfig};
use super::graph::{GraphError, ProductGraph};
use super::id::{DistId, ProductId};
use super::osarch::OsArch;
use super::param::{BuildParam, DistParam, ProductParam, ProjectParam, PublishParam};
use super::paths;
use crate::dister::{DisterRegistry, OS_ARCH_BIN_DIST_TYPE};
use crate::publisher::PublisherRegistry;
use crate::registry::RegistryError;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown dister type '{type_name}' for product '{product}', dist '{dist_id}'")]
    UnknownDisterType {
        product: ProductId,
        dist_id: DistId,
        type_name: String,
    },

    #[error("Unknown publisher type '{type_name}' configured for product '{product}'")]
    UnknownPublisherType {
        product: ProductId,
        type_name: String,
    },

    #[error("Strategy '{type_name}' rejected its configuration: {source}")]
    StrategyValidation {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Product '{product}' depends on unknown product '{dependency}'")]
    UnknownDependency {
        product: ProductId,
        dependency: ProductId,
    },

    #[error(transparent)]
    Dependency(#[from] GraphError),

    #[error(
        "Artifact path collision for product '{product}': \
         ({first_dist}, {first_os_arch}) and ({second_dist}, {second_os_arch}) \
         both resolve to {path}"
    )]
    ArtifactPathCollision {
        product: ProductId,
        first_dist: DistId,
        first_os_arch: OsArch,
        second_dist: DistId,
        second_os_arch: OsArch,
        path: String,
    },

    #[error("Version string must be non-empty")]
    EmptyVersion,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ProjectConfig {
    /// Resolves this configuration into an immutable [`ProjectParam`]
    ///
    /// `project_dir` is the project root; `version` comes from the external
    /// version resolution collaborator. Fails without side effects on any
    /// configuration or strategy validation error.
    pub fn resolve(
        &self,
        project_dir: &Path,
        version: &str,
        dister_registry: &DisterRegistry,
        publisher_registry: &PublisherRegistry,
    ) -> Result<ProjectParam, ConfigError> {
        if version.trim().is_empty() {
            return Err(ConfigError::EmptyVersion);
        }

        let mut product_ids: Vec<&ProductId> = self.products.keys().collect();
        product_ids.sort();

        let mut products = HashMap::new();
        for id in product_ids {
            let merged = self.products[id].merged_with_defaults(&self.product_defaults);
            debug!(product = %id, "resolving product");

            let build = merged.build.as_ref().map(|b| BuildParam {
                main_pkg: b.main_pkg.clone(),
                script: b.script.clone(),
            });

            let os_archs = merged
                .build
                .as_ref()
                .and_then(|b| b.os_archs.clone())
                .unwrap_or_else(|| vec![OsArch::current()]);

            // A product without an explicit dist section gets the default
            // os-arch-bin dist
            let dist_config = merged.dist.clone().unwrap_or_else(default_dist_config);

            let mut dist = HashMap::new();
            let mut dist_ids: Vec<&DistId> = dist_config.disters.keys().collect();
            dist_ids.sort();
            for dist_id in dist_ids {
                let dister_config = &dist_config.disters[dist_id];
                let type_name = dister_config
                    .type_name
                    .clone()
                    .unwrap_or_else(|| dist_id.as_str().to_string());

                let dister =
                    match dister_registry.create(&type_name, dister_config.config.as_ref()) {
                        Ok(dister) => dister,
                        Err(RegistryError::UnknownType(type_name)) => {
                            return Err(ConfigError::UnknownDisterType {
                                product: id.clone(),
                                dist_id: dist_id.clone(),
                                type_name,
                            })
                        }
                        Err(RegistryError::Strategy { type_name, source }) => {
                            return Err(ConfigError::StrategyValidation { type_name, source })
                        }
                        Err(other) => return Err(ConfigError::Registry(other)),
                    };

                dist.insert(
                    dist_id.clone(),
                    DistParam {
                        type_name,
                        config: dister_config.config.clone(),
                        dister,
                    },
                );
            }

            let publish = match &merged.publish {
                Some(config) => {
                    for type_name in config.blocks.keys() {
                        if !publisher_registry.contains(type_name) {
                            return Err(ConfigError::UnknownPublisherType {
                                product: id.clone(),
                                type_name: type_name.clone(),
                            });
                        }
                    }
                    PublishParam {
                        blocks: config.blocks.clone(),
                    }
                }
                None => PublishParam::default(),
            };

            let dependencies = merged.dependencies.clone().unwrap_or_default();
            for dependency in &dependencies {
                if !self.products.contains_key(dependency) {
                    return Err(ConfigError::UnknownDependency {
                        product: id.clone(),
                        dependency: dependency.clone(),
                    });
                }
            }

            let product = ProductParam {
                id: id.clone(),
                build,
                os_archs,
                dist,
                publish,
                dependencies,
            };
            verify_collision_free(project_dir, version, &product)?;
            products.insert(id.clone(), product);
        }

        let graph = ProductGraph::from_products(
            products
                .iter()
                .map(|(id, product)| (id, product.dependencies.as_slice())),
        )?;
        let topo_order = graph.topological_order()?;
        debug!(products = products.len(), "resolved project configuration");

        Ok(ProjectParam {
            products,
            exclude: self.exclude.clone(),
            project_dir: project_dir.to_path_buf(),
            version: version.to_string(),
            graph,
            topo_order,
        })
    }
}

fn default_dist_config() -> DistConfig {
    let mut disters = HashMap::new();
    disters.insert(
        OS_ARCH_BIN_DIST_TYPE
            .parse()
            .expect("default dist type is a valid dist ID"),
        DisterConfig {
            type_name: Some(OS_ARCH_BIN_DIST_TYPE.to_string()),
            config: None,
        },
    );
    DistConfig { disters }
}

/// Proves that no two (dist, OS/arch) pairs of a product resolve to the
/// same artifact path
fn verify_collision_free(
    project_dir: &Path,
    version: &str,
    product: &ProductParam,
) -> Result<(), ConfigError> {
    let mut seen: HashMap<std::path::PathBuf, (DistId, OsArch)> = HashMap::new();
    let mut dist_ids: Vec<&DistId> = product.dist.keys().collect();
    dist_ids.sort();

    for dist_id in dist_ids {
        let dist = &product.dist[dist_id];
        for os_arch in &product.os_archs {
            let path = paths::dist_artifact_path(
                project_dir,
                &product.id,
                version,
                dist_id,
                os_arch,
                dist.dister.extension(),
            );
            if let Some((first_dist, first_os_arch)) =
                seen.insert(path.clone(), (dist_id.clone(), os_arch.clone()))
            {
                return Err(ConfigError::ArtifactPathCollision {
                    product: product.id.clone(),
                    first_dist,
                    first_os_arch,
                    second_dist: dist_id.clone(),
                    second_os_arch: os_arch.clone(),
                    path: path.display().to_string(),
                });
            }
        }
    }
    Ok(())
}
