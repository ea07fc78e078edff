//! Orders

pub mod errors;
mod records;
pub mod repository;
pub mod supabase;

pub use errors::OrderRepositoryError;
pub use repository::{MockOrderRepository, OrderRepository, advance_order, transition_order};
pub use supabase::{SupabaseConfig, SupabaseOrderRepository};
