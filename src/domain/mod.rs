//! Core domain model: identifiers, configuration, resolution, and the
//! resolved parameter types the pipelines consume

pub mod config;
pub mod graph;
pub mod id;
pub mod osarch;
pub mod param;
pub mod paths;
pub mod resolve;

pub use config::{
    BuildConfig, DistConfig, DisterConfig, ProductConfig, ProjectConfig, PublishConfig,
};
pub use graph::{GraphError, ProductGraph};
pub use id::{DistId, IdError, ProductDistId, ProductId};
pub use osarch::{OsArch, OsArchError};
pub use param::{
    BuildParam, DistParam, ProductParam, ProductTaskOutputInfo, ProjectInfo, ProjectParam,
    PublishParam,
};
pub use resolve::ConfigError;
