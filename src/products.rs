//! Products

use serde::{Deserialize, Serialize};

use crate::uuids::TypedUuid;

/// Product identifier.
pub type ProductId = TypedUuid<ProductSnapshot>;

/// A catalog product as it looked when it was added to the cart.
///
/// Snapshots are copied, not linked: a later catalog price change does not reach items already in
/// a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    /// Catalog identifier
    pub id: ProductId,

    /// Display name
    pub name: String,

    /// Unit price in whole currency units
    pub price: u64,

    /// Image reference, if the catalog has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl ProductSnapshot {
    /// Create a snapshot without an image.
    pub fn new(id: ProductId, name: impl Into<String>, price: u64) -> Self {
        Self {
            id,
            name: name.into(),
            price,
            image: None,
        }
    }

    /// Attach an image reference.
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }
}
