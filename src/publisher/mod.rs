//! Publisher strategies: shipping dist artifacts to a destination
//!
//! A publisher is a pluggable strategy registered under a stable type name.
//! It receives the artifacts of exactly one product (a
//! [`ProductTaskOutputInfo`]) together with that product's opaque
//! configuration block and resolved flag values, and either performs the
//! publish side effect or, in dry-run mode, only reports what it would do.
//! Dry-run must never perform the side effect.

mod local;

pub use local::{LocalPublisher, LOCAL_PUBLISHER_TYPE};

use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use anyhow::{bail, Result};

use crate::domain::ProductTaskOutputInfo;
use crate::registry::RegistryError;

/// Value of one publisher flag
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    String(String),
    Bool(bool),
    Int(i64),
}

impl FlagValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    fn kind(&self) -> FlagKind {
        match self {
            FlagValue::String(_) => FlagKind::String,
            FlagValue::Bool(_) => FlagKind::Bool,
            FlagValue::Int(_) => FlagKind::Int,
        }
    }
}

/// Type of a publisher flag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    String,
    Bool,
    Int,
}

/// A command-line-style flag a publisher accepts
#[derive(Debug, Clone)]
pub struct PublisherFlag {
    pub name: String,
    pub description: String,
    pub kind: FlagKind,
    pub default: Option<FlagValue>,
}

impl PublisherFlag {
    pub fn string(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: FlagKind::String,
            default: None,
        }
    }

    pub fn bool_with_default(name: &str, description: &str, default: bool) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind: FlagKind::Bool,
            default: Some(FlagValue::Bool(default)),
        }
    }
}

/// Applies flag defaults and validates provided values against the declared
/// flag set
///
/// Unknown flag names and type mismatches are rejected before any publish
/// work begins.
pub fn resolve_flag_vals(
    flags: &[PublisherFlag],
    provided: &HashMap<String, FlagValue>,
) -> Result<HashMap<String, FlagValue>> {
    let mut resolved = HashMap::new();
    for flag in flags {
        if let Some(default) = &flag.default {
            resolved.insert(flag.name.clone(), default.clone());
        }
    }

    for (name, value) in provided {
        let Some(flag) = flags.iter().find(|f| &f.name == name) else {
            bail!("unknown flag '{}'", name);
        };
        if value.kind() != flag.kind {
            bail!(
                "flag '{}' expects a {:?} value, got {:?}",
                name,
                flag.kind,
                value.kind()
            );
        }
        resolved.insert(name.clone(), value.clone());
    }

    Ok(resolved)
}

/// A publish strategy
pub trait Publisher: fmt::Debug + Send + Sync {
    /// The registered type name, used for round-trip config serialization
    /// and for selecting the product's publish configuration block
    fn type_name(&self) -> &'static str;

    /// Flags this publisher accepts
    fn flags(&self) -> Vec<PublisherFlag>;

    /// Publishes one product's artifacts, or reports what it would do when
    /// `dry_run` is set
    fn run(
        &self,
        output_info: &ProductTaskOutputInfo,
        config: Option<&toml::Value>,
        flag_vals: &HashMap<String, FlagValue>,
        dry_run: bool,
        out: &mut dyn Write,
    ) -> Result<()>;
}

/// Factory producing a validated publisher instance from an opaque config
/// block
pub type PublisherFactory =
    Box<dyn Fn(Option<&toml::Value>) -> Result<Box<dyn Publisher>> + Send + Sync>;

/// Registry of publisher strategies, keyed by type name
pub struct PublisherRegistry {
    factories: HashMap<String, PublisherFactory>,
}

impl PublisherRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Creates a registry with the built-in publishers registered
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(
                LOCAL_PUBLISHER_TYPE,
                Box::new(|config| {
                    Ok(Box::new(LocalPublisher::from_config(config)?) as Box<dyn Publisher>)
                }),
            )
            .expect("empty registry accepts built-in type");
        registry
    }

    /// Registers a publisher factory under a type name
    pub fn register(
        &mut self,
        type_name: &str,
        factory: PublisherFactory,
    ) -> Result<(), RegistryError> {
        if self.factories.contains_key(type_name) {
            return Err(RegistryError::DuplicateType(type_name.to_string()));
        }
        self.factories.insert(type_name.to_string(), factory);
        Ok(())
    }

    /// Returns true if a publisher is registered under the type name
    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Instantiates a validated publisher from its opaque configuration
    pub fn create(
        &self,
        type_name: &str,
        config: Option<&toml::Value>,
    ) -> Result<Box<dyn Publisher>, RegistryError> {
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

impl Default for PublisherRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
