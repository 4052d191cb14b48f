//! shipkit - a declarative dist and publish pipeline for multi-product
//! source trees
//!
//! shipkit turns a project's `dist.toml` into a dependency-aware plan for
//! packaging ("disting") and publishing one or more products, each
//! potentially producing several OS/arch-specific artifacts through
//! pluggable packaging and publishing strategies.
//!
//! The flow: a [`ProjectConfig`] is resolved against the dister and
//! publisher registries into an immutable [`ProjectParam`]; the dist
//! pipeline packages selected products into artifacts at deterministic
//! paths; the publish pipeline ships a caller-selected subset of those
//! artifacts, strictly one product at a time.

pub mod dister;
pub mod domain;
pub mod pipeline;
pub mod publisher;
pub mod registry;

pub use domain::{
    ConfigError, DistId, OsArch, ProductDistId, ProductId, ProductTaskOutputInfo, ProjectConfig,
    ProjectInfo, ProjectParam,
};
