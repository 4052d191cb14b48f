//! The default dister: one gzipped tarball per OS/arch containing the
//! built binary

use std::fs::File;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::Deserialize;

use super::{Dister, DisterRun};

pub const OS_ARCH_BIN_DIST_TYPE: &str = "os-arch-bin";

const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct OsArchBinConfig {
    /// gzip compression level, 0-9
    compression_level: Option<u32>,
}

/// Packages the build output into `<product>-<version>-<os>-<arch>.tgz`
#[derive(Debug)]
pub struct OsArchBinDister {
    compression_level: u32,
}

impl OsArchBinDister {
    pub fn from_config(config: Option<&toml::Value>) -> Result<Self> {
        let config: OsArchBinConfig = match config {
            Some(value) => value
                .clone()
                .try_into()
                .context("invalid os-arch-bin configuration")?,
            None => OsArchBinConfig::default(),
        };

        let compression_level = config
            .compression_level
            .unwrap_or(DEFAULT_COMPRESSION_LEVEL);
        if compression_level > 9 {
            bail!(
                "compression_level must be between 0 and 9, got {}",
                compression_level
            );
        }

        Ok(Self { compression_level })
    }
}

impl Dister for OsArchBinDister {
    fn type_name(&self) -> &'static str {
        OS_ARCH_BIN_DIST_TYPE
    }

    fn extension(&self) -> &str {
        "tgz"
    }

    fn run(&self, run: &DisterRun<'_>) -> Result<Vec<PathBuf>> {
        let build_output = run.build_output.ok_or_else(|| {
            anyhow!(
                "os-arch-bin requires a build output for product '{}', but none is configured",
                run.product
            )
        })?;
        if !build_output.is_file() {
            bail!(
                "build output for product '{}' ({}) not found at {}",
                run.product,
                run.os_arch,
                build_output.display()
            );
        }

        let file = File::create(run.artifact_path)
            .with_context(|| format!("creating {}", run.artifact_path.display()))?;
        let encoder = GzEncoder::new(file, Compression::new(self.compression_level));
        let mut builder = tar::Builder::new(encoder);
        builder
            .append_path_with_name(build_output, run.product.as_str())
            .with_context(|| format!("archiving {}", build_output.display()))?;
        let encoder = builder.into_inner().context("finalizing tar archive")?;
        encoder.finish().context("finalizing gzip stream")?;

        Ok(vec![run.artifact_path.to_path_buf()])
    }
}
