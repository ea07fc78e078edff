//! Payments

pub mod callback;
pub mod errors;
pub mod mercadopago;
pub mod service;

pub use callback::{CallbackParseError, GatewayCallback};
pub use errors::PaymentIntentError;
pub use mercadopago::{MercadoPagoClient, MercadoPagoConfig};
pub use service::*;
