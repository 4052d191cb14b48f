//! Dister that delegates artifact creation to a configured script
//!
//! The script is responsible for leaving the artifact at the pre-computed
//! path. It runs from the project root with the invocation described in its
//! environment:
//!
//! | Variable       | Value                                   |
//! |----------------|-----------------------------------------|
//! | `PRODUCT`      | product ID                              |
//! | `VERSION`      | resolved version string                 |
//! | `OS` / `ARCH`  | target OS and architecture              |
//! | `DIST_DIR`     | directory the artifact belongs in       |
//! | `DIST_PATH`    | exact artifact path to produce          |
//! | `BUILD_OUTPUT` | built binary path, when a build exists  |

use std::path::PathBuf;
use std::process::Command;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use super::{Dister, DisterRun};

pub const MANUAL_DIST_TYPE: &str = "manual";

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ManualConfig {
    /// Artifact file extension, without a leading dot
    extension: String,

    /// Command that produces the artifact
    script: String,
}

/// Runs a configured script that must produce the artifact itself
#[derive(Debug)]
pub struct ManualDister {
    extension: String,
    script: String,
}

impl ManualDister {
    pub fn from_config(config: Option<&toml::Value>) -> Result<Self> {
        let Some(value) = config else {
            bail!("manual dister requires a config block with 'extension' and 'script'");
        };
        let config: ManualConfig = value
            .clone()
            .try_into()
            .context("invalid manual dister configuration")?;

        if config.extension.is_empty() || config.extension.starts_with('.') {
            bail!(
                "extension must be non-empty and without a leading dot, got '{}'",
                config.extension
            );
        }
        if config.script.trim().is_empty() {
            bail!("script must be non-empty");
        }

        Ok(Self {
            extension: config.extension,
            script: config.script,
        })
    }
}

impl Dister for ManualDister {
    fn type_name(&self) -> &'static str {
        MANUAL_DIST_TYPE
    }

    fn extension(&self) -> &str {
        &self.extension
    }

    fn run(&self, run: &DisterRun<'_>) -> Result<Vec<PathBuf>> {
        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&self.script)
            .current_dir(run.project_dir)
            .env("PRODUCT", run.product.as_str())
            .env("VERSION", run.version)
            .env("OS", run.os_arch.os())
            .env("ARCH", run.os_arch.arch())
            .env("DIST_DIR", run.dist_dir)
            .env("DIST_PATH", run.artifact_path);
        if let Some(build_output) = run.build_output {
            command.env("BUILD_OUTPUT", build_output);
        }

        let output = command
            .output()
            .with_context(|| format!("spawning dist script for product '{}'", run.product))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "dist script exited with {} for product '{}' ({}): {}",
                output.status,
                run.product,
                run.os_arch,
                stderr.trim()
            );
        }

        if !run.artifact_path.is_file() {
            bail!(
                "dist script did not produce an artifact at {}",
                run.artifact_path.display()
            );
        }

        Ok(vec![run.artifact_path.to_path_buf()])
    }
}
