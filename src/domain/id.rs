//! Identifiers for products and their distributions
//!
//! ID formats:
//! - Product IDs: bare names like `foo` (one or more of `[A-Za-z0-9_-]`)
//! - Dist IDs: artifact-kind names like `os-arch-bin`, unique within a product
//! - Product-dist selectors: `foo` (all dists of foo) or `foo.os-arch-bin`
//!
//! The dot is reserved as the selector separator, which is why it is not
//! allowed inside product or dist IDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid product ID '{0}': expected one or more of [A-Za-z0-9_-]")]
    InvalidProductId(String),

    #[error("Invalid dist ID '{0}': expected one or more of [A-Za-z0-9_-]")]
    InvalidDistId(String),

    #[error("Invalid product-dist selector '{0}': expected 'product' or 'product.dist'")]
    InvalidProductDistId(String),
}

fn is_valid_segment(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Unique identifier for a product within a project
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductId(String);

impl ProductId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !is_valid_segment(s) {
            return Err(IdError::InvalidProductId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for ProductId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProductId> for String {
    fn from(id: ProductId) -> Self {
        id.0
    }
}

/// Identifier for one configured kind of dist artifact within a product
///
/// Unique within a product's dist configuration, not globally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DistId(String);

impl DistId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DistId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !is_valid_segment(s) {
            return Err(IdError::InvalidDistId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl TryFrom<String> for DistId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DistId> for String {
    fn from(id: DistId) -> Self {
        id.0
    }
}

/// Selector pairing a product with an optional dist kind
///
/// `foo` selects every dist configured for product foo, `foo.os-arch-bin`
/// selects exactly one. Used to scope dist and publish operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProductDistId {
    product: ProductId,
    dist: Option<DistId>,
}

impl ProductDistId {
    /// Selects all dists configured for a product
    pub fn all_dists(product: ProductId) -> Self {
        Self {
            product,
            dist: None,
        }
    }

    /// Selects a single dist of a product
    pub fn single(product: ProductId, dist: DistId) -> Self {
        Self {
            product,
            dist: Some(dist),
        }
    }

    pub fn product(&self) -> &ProductId {
        &self.product
    }

    /// The selected dist kind, or None for "all dists of this product"
    pub fn dist(&self) -> Option<&DistId> {
        self.dist.as_ref()
    }
}

impl From<ProductId> for ProductDistId {
    fn from(product: ProductId) -> Self {
        Self::all_dists(product)
    }
}

impl fmt::Display for ProductDistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dist {
            Some(dist) => write!(f, "{}.{}", self.product, dist),
            None => write!(f, "{}", self.product),
        }
    }
}

impl FromStr for ProductDistId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('.') {
            Some((product, dist)) => {
                let product: ProductId = product
                    .parse()
                    .map_err(|_| IdError::InvalidProductDistId(s.to_string()))?;
                let dist: DistId = dist
                    .parse()
                    .map_err(|_| IdError::InvalidProductDistId(s.to_string()))?;
                Ok(Self::single(product, dist))
            }
            None => {
                let product: ProductId = s
                    .parse()
                    .map_err(|_| IdError::InvalidProductDistId(s.to_string()))?;
                Ok(Self::all_dists(product))
            }
        }
    }
}

impl TryFrom<String> for ProductDistId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProductDistId> for String {
    fn from(id: ProductDistId) -> Self {
        id.to_string()
    }
}
