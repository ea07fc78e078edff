//! Cart
//!
//! The cart is a list of [`CartLine`]s plus a UI visibility flag. All changes go through
//! [`CartState::apply`], a pure transition over a [`CartAction`]; the [`store`] wraps that with
//! change notification and [`persistence`] writes every change to a [`KeyValueStore`].
//!
//! [`KeyValueStore`]: crate::storage::KeyValueStore

use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::products::{ProductId, ProductSnapshot};

pub mod persistence;
pub mod store;

/// One product in the cart with its quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// Product snapshot captured when first added
    pub product: ProductSnapshot,

    /// Number of units, never below one
    pub quantity: NonZeroU32,
}

impl CartLine {
    /// Price of this line: unit price times quantity.
    pub fn line_total(&self) -> u64 {
        self.product
            .price
            .saturating_mul(u64::from(self.quantity.get()))
    }
}

/// A named cart transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartAction {
    /// Add one unit of a product, creating the line if needed.
    AddItem(ProductSnapshot),

    /// Drop a product's line regardless of quantity.
    RemoveItem(ProductId),

    /// Set a line's quantity, clamped to at least one.
    UpdateQuantity(ProductId, i64),

    /// Remove every line.
    ClearCart,

    /// Flip the panel visibility.
    ToggleCart,

    /// Show the panel.
    OpenCart,

    /// Hide the panel.
    CloseCart,
}

/// Cart contents and panel visibility.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CartState {
    lines: Vec<CartLine>,
    is_open: bool,
}

impl CartState {
    /// An empty, closed cart.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// Whether the cart panel is shown.
    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Look up a product's line.
    pub fn line(&self, product: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product.id == product)
    }

    /// Whether the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Number of distinct products.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Sum of `price * quantity` over all lines.
    pub fn total(&self) -> u64 {
        self.lines
            .iter()
            .map(CartLine::line_total)
            .fold(0, u64::saturating_add)
    }

    /// Total number of units, not lines.
    pub fn item_count(&self) -> u64 {
        self.lines
            .iter()
            .map(|line| u64::from(line.quantity.get()))
            .sum()
    }

    /// Apply a transition in place.
    pub fn apply(&mut self, action: CartAction) {
        match action {
            CartAction::AddItem(product) => self.add(product),
            CartAction::RemoveItem(product) => self.lines.retain(|line| line.product.id != product),
            CartAction::UpdateQuantity(product, quantity) => {
                if let Some(line) = self.line_mut(product) {
                    line.quantity = clamp_quantity(quantity);
                }
            }
            CartAction::ClearCart => self.lines.clear(),
            CartAction::ToggleCart => self.is_open = !self.is_open,
            CartAction::OpenCart => self.is_open = true,
            CartAction::CloseCart => self.is_open = false,
        }
    }

    fn add(&mut self, product: ProductSnapshot) {
        if let Some(line) = self.line_mut(product.id) {
            line.quantity = line.quantity.saturating_add(1);
            return;
        }

        self.lines.push(CartLine {
            product,
            quantity: NonZeroU32::MIN,
        });
    }

    fn line_mut(&mut self, product: ProductId) -> Option<&mut CartLine> {
        self.lines.iter_mut().find(|line| line.product.id == product)
    }

    /// Rebuild a state from persisted parts, merging any duplicate product lines.
    pub(crate) fn from_parts(lines: Vec<CartLine>, is_open: bool) -> Self {
        let mut state = Self {
            lines: Vec::with_capacity(lines.len()),
            is_open,
        };

        for line in lines {
            match state.line_mut(line.product.id) {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(line.quantity.get());
                }
                None => state.lines.push(line),
            }
        }

        state
    }
}

fn clamp_quantity(quantity: i64) -> NonZeroU32 {
    let clamped = u32::try_from(quantity.max(1)).unwrap_or(u32::MAX);

    NonZeroU32::new(clamped).unwrap_or(NonZeroU32::MIN)
}
