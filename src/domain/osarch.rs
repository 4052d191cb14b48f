//! Target operating system and architecture pairs
//!
//! An `OsArch` names one build/dist target as `<os>-<arch>`, e.g.
//! `linux-amd64` or `darwin-arm64`. Artifact paths embed this string, so it
//! must be stable across invocations and hosts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum OsArchError {
    #[error("Invalid OS/arch '{0}': expected '<os>-<arch>', e.g. 'linux-amd64'")]
    Invalid(String),
}

/// One target operating system and architecture pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OsArch {
    os: String,
    arch: String,
}

impl OsArch {
    pub fn new(os: &str, arch: &str) -> Result<Self, OsArchError> {
        if !is_valid_part(os) || !is_valid_part(arch) {
            return Err(OsArchError::Invalid(format!("{}-{}", os, arch)));
        }
        Ok(Self {
            os: os.to_string(),
            arch: arch.to_string(),
        })
    }

    /// The host the process is running on
    pub fn current() -> Self {
        // Darwin is the conventional identifier for macOS in target strings
        let os = match std::env::consts::OS {
            "macos" => "darwin",
            other => other,
        };
        let arch = match std::env::consts::ARCH {
            "x86_64" => "amd64",
            "aarch64" => "arm64",
            "x86" => "386",
            other => other,
        };
        Self {
            os: os.to_string(),
            arch: arch.to_string(),
        }
    }

    pub fn os(&self) -> &str {
        &self.os
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }
}

fn is_valid_part(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
}

impl fmt::Display for OsArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os, self.arch)
    }
}

impl FromStr for OsArch {
    type Err = OsArchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (os, arch) = s
            .split_once('-')
            .ok_or_else(|| OsArchError::Invalid(s.to_string()))?;
        Self::new(os, arch).map_err(|_| OsArchError::Invalid(s.to_string()))
    }
}

impl TryFrom<String> for OsArch {
    type Error = OsArchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OsArch> for String {
    fn from(osarch: OsArch) -> Self {
        osarch.to_string()
    }
}
