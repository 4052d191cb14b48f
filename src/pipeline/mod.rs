//! The dist and publish pipelines
//!
//! Both pipelines scope their work with the same selector semantics: a list
//! of [`ProductDistId`] values names the (product, dist) pairs to operate
//! on, and an empty list means every configured product and every configured
//! dist kind. Dependency edges never widen a selection; selecting a product
//! selects that product's artifacts only.

pub mod dist;
pub mod publish;

mod build;

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::{DistId, ProductDistId, ProductId, ProjectParam};

#[derive(Debug, Error, PartialEq)]
pub enum SelectionError {
    #[error("Selector names unknown product '{0}'")]
    UnknownProduct(ProductId),

    #[error("Selector names dist '{dist}' which is not configured for product '{product}'")]
    UnknownDist { product: ProductId, dist: DistId },
}

/// Resolves selectors into a concrete (product, dists) mapping
///
/// An empty selector list selects every configured product and every
/// configured dist. Dist ID lists are sorted and de-duplicated.
pub fn resolve_selection(
    param: &ProjectParam,
    selectors: &[ProductDistId],
) -> Result<HashMap<ProductId, Vec<DistId>>, SelectionError> {
    let mut selection: HashMap<ProductId, Vec<DistId>> = HashMap::new();

    if selectors.is_empty() {
        for (product_id, product) in param.products() {
            let mut dist_ids: Vec<DistId> = product.dist.keys().cloned().collect();
            dist_ids.sort();
            selection.insert(product_id.clone(), dist_ids);
        }
        return Ok(selection);
    }

    for selector in selectors {
        let product_id = selector.product();
        let product = param
            .product(product_id)
            .ok_or_else(|| SelectionError::UnknownProduct(product_id.clone()))?;

        let dist_ids = selection.entry(product_id.clone()).or_default();
        match selector.dist() {
            Some(dist_id) => {
                if !product.dist.contains_key(dist_id) {
                    return Err(SelectionError::UnknownDist {
                        product: product_id.clone(),
                        dist: dist_id.clone(),
                    });
                }
                dist_ids.push(dist_id.clone());
            }
            None => dist_ids.extend(product.dist.keys().cloned()),
        }
    }

    for dist_ids in selection.values_mut() {
        dist_ids.sort();
        dist_ids.dedup();
    }
    Ok(selection)
}
