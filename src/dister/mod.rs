//! Dister strategies: packaging a built product into dist artifacts
//!
//! A dister is a pluggable packaging strategy registered under a stable type
//! name. Given a built product's output, its identity, version, and one
//! target OS/arch, it produces one or more artifact files at the paths the
//! output path resolver computed for its dist kind, and returns the paths it
//! produced. The pipeline verifies that returned set against the computed
//! one; a mismatch is an internal error, never a silent divergence.
//!
//! Built-in disters:
//!
//! | Type name     | Artifact                                      |
//! |---------------|-----------------------------------------------|
//! | `os-arch-bin` | gzipped tarball containing the built binary   |
//! | `manual`      | whatever a configured script leaves in place  |

mod manual;
mod os_arch_bin;

pub use manual::{ManualDister, MANUAL_DIST_TYPE};
pub use os_arch_bin::{OsArchBinDister, OS_ARCH_BIN_DIST_TYPE};

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::{DistId, OsArch, ProductId};
use crate::registry::RegistryError;

/// Everything a dister needs for one invocation
///
/// All paths are pre-computed by the output path resolver; the dister's job
/// is to fill them in, not to choose them.
#[derive(Debug)]
pub struct DisterRun<'a> {
    pub project_dir: &'a Path,
    pub product: &'a ProductId,
    pub version: &'a str,
    pub dist_id: &'a DistId,
    pub os_arch: &'a OsArch,

    /// Location of the built binary, if the product has a build step
    pub build_output: Option<&'a Path>,

    /// Directory the artifact belongs in (already created)
    pub dist_dir: &'a Path,

    /// The artifact path this invocation must produce
    pub artifact_path: &'a Path,
}

/// A packaging strategy
pub trait Dister: fmt::Debug + Send + Sync {
    /// The registered type name, used for round-trip config serialization
    fn type_name(&self) -> &'static str;

    /// Artifact file extension, without a leading dot
    ///
    /// Determines the artifact paths the output path resolver computes for
    /// this dist kind, so it must be stable for a given configuration.
    fn extension(&self) -> &str;

    /// Produces the artifact(s) for one product/dist/OS-arch combination
    ///
    /// Returns the paths actually produced, which must equal the computed
    /// set for this invocation.
    fn run(&self, run: &DisterRun<'_>) -> Result<Vec<PathBuf>>;
}

/// Factory producing a validated dister instance from an opaque config block
pub type DisterFactory =
    Box<dyn Fn(Option<&toml::Value>) -> Result<Box<dyn Dister>> + Send + Sync>;

/// Registry of dister strategies, keyed by type name
///
/// Constructed once per invocation and passed explicitly through resolution;
/// never ambient global state.
pub struct DisterRegistry {
    factories: HashMap<String, DisterFactory>,
}

impl DisterRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in disters registered
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(
                OS_ARCH_BIN_DIST_TYPE,
                Box::new(|config| {
                    Ok(Box::new(OsArchBinDister::from_config(config)?) as Box<dyn Dister>)
                }),
            )
            .expect("empty registry accepts built-in type");
        registry
            .register(
                MANUAL_DIST_TYPE,
                Box::new(|config| {
                    Ok(Box::new(ManualDister::from_config(config)?) as Box<dyn Dister>)
                }),
            )
            .expect("empty registry accepts built-in type");
        registry
    }

    /// Registers a dister factory under a type name
    pub fn register(
        &mut self,
        type_name: &str,
        factory: DisterFactory,
    ) -> Result<(), RegistryError> {
        if self.factories.contains_key(type_name) {
            return Err(RegistryError::DuplicateType(type_name.to_string()));
        }
        self.factories.insert(type_name.to_string(), factory);
        Ok(())
    }

    /// Returns true if a dister is registered under the type name
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Instantiates a validated dister from its opaque configuration
    pub fn create(
        &self,
        type_name: &str,
        config: Option<&toml::Value>,
    ) -> Result<Box<dyn Dister>, RegistryError> {
        let factory = self
            .factories
            .get(type_name)
            .ok_or_else(|| RegistryError::UnknownType(type_name.to_string()))?;
        factory(config).map_err(|source| RegistryError::Strategy {
            type_name: type_name.to_string(),
            source,
        })
    }

    /// Registered type names, sorted
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }
}

impl Default for DisterRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
