//! Deterministic output path computation
//!
//! Artifact and build output locations are pure functions of the project
//! root, product identity, version, dist kind, and target OS/arch. Disters
//! must place their artifacts at exactly these paths; publish recomputes the
//! same paths instead of rescanning the output tree.
//!
//! Layout:
//! - build output: `<root>/out/build/<product>/<version>/<os>-<arch>/<product>`
//! - dist artifact: `<root>/out/dist/<product>/<version>/<distID>/<product>-<version>-<os>-<arch>.<ext>`

use std::path::{Path, PathBuf};

use super::id::{DistId, ProductId};
use super::osarch::OsArch;

/// Directory holding the build output for one product/version/target
pub fn build_output_dir(
    project_dir: &Path,
    product: &ProductId,
    version: &str,
    os_arch: &OsArch,
) -> PathBuf {
    project_dir
        .join("out")
        .join("build")
        .join(product.as_str())
        .join(version)
        .join(os_arch.to_string())
}

/// Path of the build output (the built binary) for one product/version/target
pub fn build_output_path(
    project_dir: &Path,
    product: &ProductId,
    version: &str,
    os_arch: &OsArch,
) -> PathBuf {
    build_output_dir(project_dir, product, version, os_arch).join(product.as_str())
}

/// Directory holding the dist artifacts for one product/version/dist kind
pub fn dist_output_dir(
    project_dir: &Path,
    product: &ProductId,
    version: &str,
    dist_id: &DistId,
) -> PathBuf {
    project_dir
        .join("out")
        .join("dist")
        .join(product.as_str())
        .join(version)
        .join(dist_id.as_str())
}

/// Path of one dist artifact
///
/// `extension` is the dister's declared artifact kind, without a leading dot.
pub fn dist_artifact_path(
    project_dir: &Path,
    product: &ProductId,
    version: &str,
    dist_id: &DistId,
    os_arch: &OsArch,
    extension: &str,
) -> PathBuf {
    dist_output_dir(project_dir, product, version, dist_id).join(format!(
        "{}-{}-{}.{}",
        product, version, os_arch, extension
    ))
}
