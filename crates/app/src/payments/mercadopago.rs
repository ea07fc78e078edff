//! `MercadoPago` checkout preferences client.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::payments::{
    errors::PaymentIntentError,
    service::{CallbackUrls, PaymentIntent, PaymentIntentRequest, PaymentIntentService},
};

const CURRENCY_ID: &str = "ARS";

/// Configuration for the `MercadoPago` API.
#[derive(Debug, Clone)]
pub struct MercadoPagoConfig {
    /// API base URL, e.g. `"https://api.mercadopago.com"`.
    pub api_url: String,

    /// Seller access token.
    pub access_token: String,

    /// Text on the customer's card statement.
    pub statement_descriptor: String,

    /// Send customers to the sandbox checkout.
    pub sandbox: bool,
}

/// HTTP client creating `MercadoPago` checkout preferences.
#[derive(Debug, Clone)]
pub struct MercadoPagoClient {
    config: MercadoPagoConfig,
    http: Client,
}

impl MercadoPagoClient {
    /// Create a new client from the given configuration.
    #[must_use]
    pub fn new(config: MercadoPagoConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }

    fn preference<'a>(&'a self, request: &'a PaymentIntentRequest) -> PreferenceRequest<'a> {
        PreferenceRequest {
            items: request
                .line_items
                .iter()
                .map(|item| PreferenceItem {
                    title: &item.title,
                    quantity: item.quantity,
                    unit_price: Decimal::from(item.unit_price),
                    currency_id: CURRENCY_ID,
                })
                .collect(),
            payer: PreferencePayer {
                name: &request.payer.name,
                email: request.payer.email.as_deref(),
                phone: PreferencePhone {
                    area_code: "",
                    number: request
                        .payer
                        .phone
                        .chars()
                        .filter(char::is_ascii_digit)
                        .collect(),
                },
            },
            back_urls: &request.callback_urls,
            external_reference: request.external_reference.as_str(),
            statement_descriptor: &self.config.statement_descriptor,
            metadata: PreferenceMetadata {
                customer_name: &request.metadata.customer_name,
                customer_phone: &request.metadata.customer_phone,
                delivery_type: request.metadata.delivery_type.as_str(),
                address: &request.metadata.address,
                notes: &request.metadata.notes,
            },
        }
    }
}

#[async_trait]
impl PaymentIntentService for MercadoPagoClient {
    #[tracing::instrument(
        name = "payments.mercadopago.create_payment_intent",
        skip(self, request),
        fields(external_reference = %request.external_reference, total = request.total()),
        err
    )]
    async fn create_payment_intent(
        &self,
        request: PaymentIntentRequest,
    ) -> Result<PaymentIntent, PaymentIntentError> {
        let url = format!(
            "{}/checkout/preferences",
            self.config.api_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.access_token)
            .json(&self.preference(&request))
            .send()
            .await?;

        let status = response.status();

        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            let message = rejection_message(status, body);

            warn!(status = status.as_u16(), %message, "gateway rejected payment intent");

            return Err(PaymentIntentError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let preference: PreferenceResponse = response.json().await?;

        let redirect_url = if self.config.sandbox {
            preference.sandbox_init_point
        } else {
            preference.init_point
        }
        .ok_or_else(|| {
            PaymentIntentError::UnexpectedResponse(format!(
                "preference {} has no checkout URL",
                preference.id
            ))
        })?;

        info!(intent_id = %preference.id, "payment intent created");

        Ok(PaymentIntent {
            intent_id: preference.id,
            redirect_url,
        })
    }
}

fn rejection_message(status: StatusCode, body: ErrorBody) -> String {
    if let Some(message) = body.message.filter(|message| !message.is_empty()) {
        return message;
    }

    if let Some(error) = body.error.filter(|error| !error.is_empty()) {
        return error;
    }

    match status {
        StatusCode::UNAUTHORIZED => "access token rejected, check MP_ACCESS_TOKEN".to_string(),
        StatusCode::BAD_REQUEST => {
            "invalid payment data, check that every field is filled".to_string()
        }
        _ => "failed to create payment preference".to_string(),
    }
}

#[derive(Debug, Serialize)]
struct PreferenceRequest<'a> {
    items: Vec<PreferenceItem<'a>>,
    payer: PreferencePayer<'a>,
    back_urls: &'a CallbackUrls,
    external_reference: &'a str,
    statement_descriptor: &'a str,
    metadata: PreferenceMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct PreferenceItem<'a> {
    title: &'a str,
    quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    unit_price: Decimal,
    currency_id: &'static str,
}

#[derive(Debug, Serialize)]
struct PreferencePayer<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    phone: PreferencePhone<'a>,
}

#[derive(Debug, Serialize)]
struct PreferencePhone<'a> {
    area_code: &'a str,
    number: String,
}

#[derive(Debug, Serialize)]
struct PreferenceMetadata<'a> {
    customer_name: &'a str,
    customer_phone: &'a str,
    delivery_type: &'a str,
    address: &'a str,
    notes: &'a str,
}

#[derive(Debug, Deserialize)]
struct PreferenceResponse {
    id: String,
    #[serde(default)]
    init_point: Option<String>,
    #[serde(default)]
    sandbox_init_point: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}
