//! Cart Store

use std::fmt::{Debug, Formatter, Result as FmtResult};

use crate::{
    cart::{CartAction, CartState},
    products::{ProductId, ProductSnapshot},
};

/// Handle returned by [`CartStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&CartState) + Send>;

/// Owner of the cart state.
///
/// The store is constructed explicitly and passed to whatever needs it. Mutation only happens
/// through [`CartStore::dispatch`] or the named operations wrapping it, and every dispatch notifies
/// subscribers with the new state.
pub struct CartStore {
    state: CartState,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl CartStore {
    /// A store holding an empty cart.
    pub fn new() -> Self {
        Self::with_state(CartState::new())
    }

    /// A store holding a restored cart.
    pub fn with_state(state: CartState) -> Self {
        Self {
            state,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    /// Current state.
    pub fn get_state(&self) -> &CartState {
        &self.state
    }

    /// Register a listener called after every dispatch.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&CartState) + Send + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;

        self.listeners.push((id, Box::new(listener)));

        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();

        self.listeners.retain(|(subscription, _)| *subscription != id);

        self.listeners.len() != before
    }

    /// Apply an action and notify subscribers.
    pub fn dispatch(&mut self, action: CartAction) {
        self.state.apply(action);

        for (_, listener) in &mut self.listeners {
            listener(&self.state);
        }
    }

    /// Add one unit of `product`.
    pub fn add_item(&mut self, product: ProductSnapshot) {
        self.dispatch(CartAction::AddItem(product));
    }

    /// Remove the line for `product`.
    pub fn remove_item(&mut self, product: ProductId) {
        self.dispatch(CartAction::RemoveItem(product));
    }

    /// Set the quantity for `product`, clamped to at least one.
    pub fn update_quantity(&mut self, product: ProductId, quantity: i64) {
        self.dispatch(CartAction::UpdateQuantity(product, quantity));
    }

    /// Empty the cart. Panel visibility is unchanged.
    pub fn clear_cart(&mut self) {
        self.dispatch(CartAction::ClearCart);
    }

    /// Flip panel visibility.
    pub fn toggle_cart(&mut self) {
        self.dispatch(CartAction::ToggleCart);
    }

    /// Show the panel.
    pub fn open_cart(&mut self) {
        self.dispatch(CartAction::OpenCart);
    }

    /// Hide the panel.
    pub fn close_cart(&mut self) {
        self.dispatch(CartAction::CloseCart);
    }

    /// Cart total, recomputed on every call.
    pub fn get_total(&self) -> u64 {
        self.state.total()
    }

    /// Number of units in the cart.
    pub fn get_item_count(&self) -> u64 {
        self.state.item_count()
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for CartStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("CartStore")
            .field("state", &self.state)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
