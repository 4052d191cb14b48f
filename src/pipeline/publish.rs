//! The publish pipeline: shipping already-produced artifacts
//!
//! Publish never re-runs dist. It recomputes the artifact paths the output
//! path resolver would produce and requires them to exist on disk. Each
//! selected product is published independently: the publisher receives only
//! that product's artifacts, and a failure for one product does not prevent
//! attempting its siblings. All failures are collected and reported
//! together, tagged with their product ID.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use super::{resolve_selection, SelectionError};
use crate::domain::{
    paths, DistId, ProductDistId, ProductId, ProductParam, ProductTaskOutputInfo, ProjectInfo,
    ProjectParam,
};
use crate::publisher::{resolve_flag_vals, FlagValue, Publisher};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Invalid flags for publisher '{type_name}': {source}")]
    Flags {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Publish failed for {} product(s): {}", .0.len(), format_failures(.0))]
    Failures(Vec<ProductPublishFailure>),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// One product's publish failure
#[derive(Debug)]
pub struct ProductPublishFailure {
    pub product: ProductId,
    pub kind: PublishFailureKind,
}

#[derive(Debug)]
pub enum PublishFailureKind {
    /// An expected artifact path does not exist on disk; dist has not been
    /// run (or not for this dist kind)
    MissingArtifact { dist_id: DistId, path: PathBuf },

    /// The publisher itself failed
    Publisher { source: anyhow::Error },
}

impl fmt::Display for ProductPublishFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            PublishFailureKind::MissingArtifact { dist_id, path } => write!(
                f,
                "{}: missing artifact for dist '{}' at {}",
                self.product,
                dist_id,
                path.display()
            ),
            PublishFailureKind::Publisher { source } => {
                write!(f, "{}: {}", self.product, source)
            }
        }
    }
}

fn format_failures(failures: &[ProductPublishFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Publishes the selected products' artifacts with the given publisher
///
/// Selector semantics match the dist pipeline, restricted to products whose
/// artifacts already exist on disk. The publisher is invoked once per
/// product with that product's own [`ProductTaskOutputInfo`]; a dependency's
/// artifacts are never included unless the dependency is itself selected.
/// With `dry_run` set the publisher only reports what it would do.
pub fn products(
    info: &ProjectInfo,
    param: &ProjectParam,
    selectors: &[ProductDistId],
    publisher: &dyn Publisher,
    flag_vals: &HashMap<String, FlagValue>,
    dry_run: bool,
    out: &mut dyn Write,
) -> Result<(), PublishError> {
    let selection = resolve_selection(param, selectors)?;
    let flag_vals =
        resolve_flag_vals(&publisher.flags(), flag_vals).map_err(|source| PublishError::Flags {
            type_name: publisher.type_name().to_string(),
            source,
        })?;

    let mut product_ids: Vec<&ProductId> = selection.keys().collect();
    product_ids.sort();

    let mut failures = Vec::new();
    for product_id in product_ids {
        let Some(product) = param.product(product_id) else {
            continue;
        };
        let dist_ids = &selection[product_id];

        match collect_output_info(info, product, dist_ids) {
            Ok(output_info) => {
                debug!(product = %product_id, publisher = publisher.type_name(), "publishing");

                // Self-contained block per product, sorted by dist ID
                writeln!(out, "Publishing {} (version {})", product_id, info.version)?;
                for dist_id in output_info.sorted_dist_ids() {
                    let listed = output_info
                        .artifacts_for(dist_id)
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(" ");
                    writeln!(out, "  {}: {}", dist_id, listed)?;
                }

                let config = product.publish.blocks.get(publisher.type_name());
                if let Err(source) =
                    publisher.run(&output_info, config, &flag_vals, dry_run, out)
                {
                    failures.push(ProductPublishFailure {
                        product: product_id.clone(),
                        kind: PublishFailureKind::Publisher { source },
                    });
                }
            }
            Err(failure) => {
                writeln!(out, "Failed to publish {}: {}", product_id, failure)?;
                failures.push(failure);
            }
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(PublishError::Failures(failures))
    }
}

/// Recomputes the selected artifact paths for one product and verifies they
/// exist on disk
fn collect_output_info(
    info: &ProjectInfo,
    product: &ProductParam,
    dist_ids: &[DistId],
) -> Result<ProductTaskOutputInfo, ProductPublishFailure> {
    let mut dist_artifacts: HashMap<DistId, Vec<PathBuf>> = HashMap::new();

    for dist_id in dist_ids {
        // Selection guarantees the dist IDs exist
        let Some(dist) = product.dist.get(dist_id) else {
            continue;
        };
        for os_arch in &product.os_archs {
            let path = paths::dist_artifact_path(
                &info.project_dir,
                &product.id,
                &info.version,
                dist_id,
                os_arch,
                dist.dister.extension(),
            );
            if !path.is_file() {
                return Err(ProductPublishFailure {
                    product: product.id.clone(),
                    kind: PublishFailureKind::MissingArtifact {
                        dist_id: dist_id.clone(),
                        path,
                    },
                });
            }
            dist_artifacts.entry(dist_id.clone()).or_default().push(path);
        }
    }

    Ok(ProductTaskOutputInfo {
        product: product.id.clone(),
        version: info.version.clone(),
        dist_artifacts,
    })
}
