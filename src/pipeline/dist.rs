//! The dist pipeline: packaging selected products into artifacts
//!
//! Runs the configured disters for each selected (product, dist, OS/arch)
//! combination, in dependency-respecting product order, and fails fast on
//! the first error. Progress is streamed to the output writer as each
//! artifact completes. An exclusive lock on the output tree serializes
//! concurrent dist invocations against the same project.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

use fs2::FileExt;
use thiserror::Error;
use tracing::debug;

use super::{build, resolve_selection, SelectionError};
use crate::dister::DisterRun;
use crate::domain::{
    paths, DistId, OsArch, ProductDistId, ProductId, ProductTaskOutputInfo, ProjectInfo,
    ProjectParam,
};

const OUTPUT_LOCK_FILE: &str = ".dist.lock";

#[derive(Debug, Error)]
pub enum DistError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    #[error("Another dist invocation holds the output tree lock at {path}: {source}")]
    OutputLock {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error(
        "Missing build output for product '{product}' ({os_arch}): expected {path}; \
         run the external build step or configure a build script"
    )]
    MissingBuildOutput {
        product: ProductId,
        os_arch: OsArch,
        path: String,
    },

    #[error("Build script failed for product '{product}' ({os_arch}): {source}")]
    BuildScript {
        product: ProductId,
        os_arch: OsArch,
        #[source]
        source: anyhow::Error,
    },

    #[error("Dist failed for product '{product}', dist '{dist_id}' ({os_arch}): {source}")]
    Execution {
        product: ProductId,
        dist_id: DistId,
        os_arch: OsArch,
        #[source]
        source: anyhow::Error,
    },

    #[error(
        "Dister for product '{product}', dist '{dist_id}' ({os_arch}) produced {actual:?}, \
         expected {expected:?}"
    )]
    ArtifactMismatch {
        product: ProductId,
        dist_id: DistId,
        os_arch: OsArch,
        expected: Vec<PathBuf>,
        actual: Vec<PathBuf>,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Runs dist for the selected products
///
/// Empty `selectors` means every configured product and dist kind. Products
/// are processed in dependency order, but dist of a product never implies
/// dist of its dependencies; only the selection decides what is produced.
/// Artifacts are always (re)created, overwriting prior output, so re-running
/// dist is idempotent with respect to on-disk content.
pub fn products(
    info: &ProjectInfo,
    param: &ProjectParam,
    selectors: &[ProductDistId],
    rebuild: bool,
    out: &mut dyn Write,
) -> Result<HashMap<ProductId, ProductTaskOutputInfo>, DistError> {
    let selection = resolve_selection(param, selectors)?;

    let out_dir = info.project_dir.join("out");
    fs::create_dir_all(&out_dir)?;
    let lock_path = out_dir.join(OUTPUT_LOCK_FILE);
    let lock_file = File::create(&lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(|source| DistError::OutputLock {
            path: lock_path.display().to_string(),
            source,
        })?;
    // Lock is released when lock_file drops at the end of the invocation

    let mut outputs = HashMap::new();
    for product_id in param.topological_order() {
        let Some(dist_ids) = selection.get(product_id) else {
            continue;
        };
        let Some(product) = param.product(product_id) else {
            continue;
        };

        // Build once per target, shared by every dist of this product
        let mut build_outputs: HashMap<&OsArch, Option<PathBuf>> = HashMap::new();
        for os_arch in &product.os_archs {
            let output = build::ensure_build_output(info, product, os_arch, rebuild, out)?;
            build_outputs.insert(os_arch, output);
        }

        let mut dist_artifacts: HashMap<DistId, Vec<PathBuf>> = HashMap::new();
        for dist_id in dist_ids {
            let Some(dist) = product.dist.get(dist_id) else {
                continue;
            };
            for os_arch in &product.os_archs {
                debug!(product = %product_id, dist = %dist_id, %os_arch, "running dister");
                writeln!(
                    out,
                    "Creating distribution for {} ({}, {})",
                    product_id, dist_id, os_arch
                )?;

                let dist_dir =
                    paths::dist_output_dir(&info.project_dir, product_id, &info.version, dist_id);
                fs::create_dir_all(&dist_dir)?;
                let artifact_path = paths::dist_artifact_path(
                    &info.project_dir,
                    product_id,
                    &info.version,
                    dist_id,
                    os_arch,
                    dist.dister.extension(),
                );

                let run = DisterRun {
                    project_dir: &info.project_dir,
                    product: product_id,
                    version: &info.version,
                    dist_id,
                    os_arch,
                    build_output: build_outputs
                        .get(os_arch)
                        .and_then(|o| o.as_deref()),
                    dist_dir: &dist_dir,
                    artifact_path: &artifact_path,
                };
                let produced = dist.dister.run(&run).map_err(|source| DistError::Execution {
                    product: product_id.clone(),
                    dist_id: dist_id.clone(),
                    os_arch: os_arch.clone(),
                    source,
                })?;

                // The produced set must equal the computed set
                let expected = vec![artifact_path.clone()];
                let mut actual = produced.clone();
                actual.sort();
                if actual != expected {
                    return Err(DistError::ArtifactMismatch {
                        product: product_id.clone(),
                        dist_id: dist_id.clone(),
                        os_arch: os_arch.clone(),
                        expected,
                        actual,
                    });
                }

                writeln!(out, "Finished creating {}", artifact_path.display())?;
                dist_artifacts
                    .entry(dist_id.clone())
                    .or_default()
                    .extend(produced);
            }
        }

        outputs.insert(
            product_id.clone(),
            ProductTaskOutputInfo {
                product: product_id.clone(),
                version: info.version.clone(),
                dist_artifacts,
            },
        );
    }

    Ok(outputs)
}
