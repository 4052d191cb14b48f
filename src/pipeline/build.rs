//! Orchestration of the external build step
//!
//! The pipeline never compiles anything. A product's build output either
//! already exists at the computed path (placed there by an external build
//! invocation) or is produced by the product's configured build script,
//! invoked with PRODUCT, VERSION, OS, ARCH, and OUTPUT in its environment.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

use anyhow::{anyhow, Context};
use tracing::debug;

use super::dist::DistError;
use crate::domain::{paths, OsArch, ProductParam, ProjectInfo};

/// Ensures the build output for one product/target exists, returning its
/// path, or `None` for products without a build step
///
/// With `rebuild` unset an existing output is reused; otherwise the build
/// script runs even if the output is already present.
pub(crate) fn ensure_build_output(
    info: &ProjectInfo,
    product: &ProductParam,
    os_arch: &OsArch,
    rebuild: bool,
    out: &mut dyn Write,
) -> Result<Option<PathBuf>, DistError> {
    let Some(build) = &product.build else {
        return Ok(None);
    };

    let output_path = paths::build_output_path(&info.project_dir, &product.id, &info.version, os_arch);
    if output_path.is_file() && !rebuild {
        debug!(product = %product.id, %os_arch, "reusing existing build output");
        return Ok(Some(output_path));
    }

    let Some(script) = &build.script else {
        if output_path.is_file() {
            return Ok(Some(output_path));
        }
        return Err(DistError::MissingBuildOutput {
            product: product.id.clone(),
            os_arch: os_arch.clone(),
            path: output_path.display().to_string(),
        });
    };

    run_build_script(info, product, os_arch, script, &output_path).map_err(|source| {
        DistError::BuildScript {
            product: product.id.clone(),
            os_arch: os_arch.clone(),
            source,
        }
    })?;
    writeln!(out, "Built {} for {}", product.id, os_arch)?;
    Ok(Some(output_path))
}

fn run_build_script(
    info: &ProjectInfo,
    product: &ProductParam,
    os_arch: &OsArch,
    script: &str,
    output_path: &std::path::Path,
) -> anyhow::Result<()> {
    let output_dir = output_path
        .parent()
        .ok_or_else(|| anyhow!("build output path has no parent: {}", output_path.display()))?;
    fs::create_dir_all(output_dir)
        .with_context(|| format!("creating build output directory {}", output_dir.display()))?;

    let output = Command::new("sh")
        .arg("-c")
        .arg(script)
        .current_dir(&info.project_dir)
        .env("PRODUCT", product.id.as_str())
        .env("VERSION", &info.version)
        .env("OS", os_arch.os())
        .env("ARCH", os_arch.arch())
        .env("OUTPUT", output_path)
        .output()
        .context("spawning build script")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "build script exited with {}: {}",
            output.status,
            stderr.trim()
        ));
    }
    if !output_path.is_file() {
        return Err(anyhow!(
            "build script did not produce an output at {}",
            output_path.display()
        ));
    }
    Ok(())
}
