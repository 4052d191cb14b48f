//! Built-in publisher that copies artifacts into a local directory
//!
//! Useful for staging releases into a shared drop directory, and as the
//! reference implementation of the publisher contract. Writes a SHA-256
//! checksum file next to each copied artifact unless disabled.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{FlagValue, Publisher, PublisherFlag};
use crate::domain::ProductTaskOutputInfo;

pub const LOCAL_PUBLISHER_TYPE: &str = "local";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
struct LocalConfig {
    /// Directory artifacts are copied into
    destination: Option<String>,

    /// Write a `.sha256` file next to each copied artifact (default true)
    checksums: Option<bool>,
}

/// Copies a product's artifacts into a destination directory
#[derive(Debug)]
pub struct LocalPublisher {
    defaults: LocalConfig,
}

impl LocalPublisher {
    pub fn from_config(config: Option<&toml::Value>) -> Result<Self> {
        let defaults: LocalConfig = match config {
            Some(value) => value
                .clone()
                .try_into()
                .context("invalid local publisher configuration")?,
            None => LocalConfig::default(),
        };
        Ok(Self { defaults })
    }
}

impl Publisher for LocalPublisher {
    fn type_name(&self) -> &'static str {
        LOCAL_PUBLISHER_TYPE
    }

    fn flags(&self) -> Vec<PublisherFlag> {
        vec![
            PublisherFlag::string("destination", "directory artifacts are copied into"),
            PublisherFlag {
                name: "checksums".to_string(),
                description: "write a .sha256 file next to each copied artifact".to_string(),
                kind: super::FlagKind::Bool,
                default: None,
            },
        ]
    }

    fn run(
        &self,
        output_info: &ProductTaskOutputInfo,
        config: Option<&toml::Value>,
        flag_vals: &HashMap<String, FlagValue>,
        dry_run: bool,
        out: &mut dyn Write,
    ) -> Result<()> {
        let product_config: LocalConfig = match config {
            Some(value) => value
                .clone()
                .try_into()
                .context("invalid local publisher configuration")?,
            None => LocalConfig::default(),
        };

        // Precedence: flag value, then product config, then instance default
        let destination = flag_vals
            .get("destination")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .or(product_config.destination)
            .or_else(|| self.defaults.destination.clone());
        let Some(destination) = destination else {
            bail!(
                "local publisher requires a destination for product '{}' \
                 (set the 'destination' flag or config field)",
                output_info.product
            );
        };
        let destination = PathBuf::from(destination);

        let checksums = flag_vals
            .get("checksums")
            .and_then(|v| v.as_bool())
            .or(product_config.checksums)
            .or(self.defaults.checksums)
            .unwrap_or(true);

        for dist_id in output_info.sorted_dist_ids() {
            for artifact in output_info.artifacts_for(dist_id) {
                let Some(file_name) = artifact.file_name().and_then(|n| n.to_str()) else {
                    bail!("artifact path has no file name: {}", artifact.display());
                };
                let target = destination.join(file_name);

                if dry_run {
                    writeln!(
                        out,
                        "[DRY RUN] Would copy {} to {}",
                        artifact.display(),
                        target.display()
                    )?;
                    continue;
                }

                fs::create_dir_all(&destination).with_context(|| {
                    format!("creating destination directory {}", destination.display())
                })?;
                fs::copy(artifact, &target).with_context(|| {
                    format!("copying {} to {}", artifact.display(), target.display())
                })?;

                if checksums {
                    let digest = sha256_hex(artifact)?;
                    let checksum_path = destination.join(format!("{}.sha256", file_name));
                    fs::write(&checksum_path, format!("{}  {}\n", digest, file_name))
                        .with_context(|| format!("writing {}", checksum_path.display()))?;
                }

                writeln!(out, "Copied {} to {}", artifact.display(), target.display())?;
            }
        }

        Ok(())
    }
}

fn sha256_hex(path: &std::path::Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("opening {} for hashing", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("hashing {}", path.display()))?;
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn output_info(artifact: PathBuf) -> ProductTaskOutputInfo {
        let mut dist_artifacts = HashMap::new();
        dist_artifacts.insert("os-arch-bin".parse().unwrap(), vec![artifact]);
        ProductTaskOutputInfo {
            product: "foo".parse().unwrap(),
            version: "0.1.0".to_string(),
            dist_artifacts,
        }
    }

    #[test]
    fn publishes_artifact_with_checksum() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("foo-0.1.0-linux-amd64.tgz");
        fs::write(&artifact, b"artifact-bytes").unwrap();
        let dest = dir.path().join("releases");

        let publisher = LocalPublisher::from_config(None).unwrap();
        let mut flag_vals = HashMap::new();
        flag_vals.insert(
            "destination".to_string(),
            FlagValue::String(dest.to_str().unwrap().to_string()),
        );

        let mut out = Vec::new();
        publisher
            .run(&output_info(artifact), None, &flag_vals, false, &mut out)
            .unwrap();

        let copied = dest.join("foo-0.1.0-linux-amd64.tgz");
        assert_eq!(fs::read(&copied).unwrap(), b"artifact-bytes");

        let checksum = fs::read_to_string(dest.join("foo-0.1.0-linux-amd64.tgz.sha256")).unwrap();
        let expected = format!("{:x}", Sha256::digest(b"artifact-bytes"));
        assert_eq!(checksum, format!("{}  foo-0.1.0-linux-amd64.tgz\n", expected));

        let stdout = String::from_utf8(out).unwrap();
        assert!(stdout.contains("Copied"));
    }

    #[test]
    fn dry_run_performs_no_writes() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("foo-0.1.0-linux-amd64.tgz");
        fs::write(&artifact, b"artifact-bytes").unwrap();
        let dest = dir.path().join("releases");

        let publisher = LocalPublisher::from_config(None).unwrap();
        let mut flag_vals = HashMap::new();
        flag_vals.insert(
            "destination".to_string(),
            FlagValue::String(dest.to_str().unwrap().to_string()),
        );

        let mut out = Vec::new();
        publisher
            .run(&output_info(artifact), None, &flag_vals, true, &mut out)
            .unwrap();

        assert!(!dest.exists());
        let stdout = String::from_utf8(out).unwrap();
        assert!(stdout.contains("[DRY RUN] Would copy"));
    }

    #[test]
    fn destination_from_product_config_block() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("foo-0.1.0-linux-amd64.tgz");
        fs::write(&artifact, b"bytes").unwrap();
        let dest = dir.path().join("drop");

        let block: toml::Value = toml::from_str(&format!(
            "destination = \"{}\"\nchecksums = false",
            dest.display()
        ))
        .unwrap();

        let publisher = LocalPublisher::from_config(None).unwrap();
        let mut out = Vec::new();
        publisher
            .run(
                &output_info(artifact),
                Some(&block),
                &HashMap::new(),
                false,
                &mut out,
            )
            .unwrap();

        assert!(dest.join("foo-0.1.0-linux-amd64.tgz").is_file());
        assert!(!dest.join("foo-0.1.0-linux-amd64.tgz.sha256").exists());
    }

    #[test]
    fn missing_destination_fails() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("foo-0.1.0-linux-amd64.tgz");
        fs::write(&artifact, b"bytes").unwrap();

        let publisher = LocalPublisher::from_config(None).unwrap();
        let mut out = Vec::new();
        let result = publisher.run(&output_info(artifact), None, &HashMap::new(), false, &mut out);
        assert!(result.is_err());
    }
}
