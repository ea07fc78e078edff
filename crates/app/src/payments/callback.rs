//! Gateway return parameters.
//!
//! After a hosted payment the gateway redirects to one of the checkout return routes with the
//! outcome in the query string. Older integrations report `collection_status`/`collection_id`
//! instead of `status`/`payment_id`; both spellings are accepted. The gateway writes the literal
//! `null` for absent values.

use gretta::orders::ExternalReference;
use reqwest::Url;
use thiserror::Error;

const APPROVED: &str = "approved";
const QUERY_BASE: &str = "gretta://callback/";

/// The return URL could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid callback URL: {0}")]
pub struct CallbackParseError(String);

/// Outcome reported by the gateway on return.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GatewayCallback {
    status: Option<String>,
    status_detail: Option<String>,
    payment_id: Option<String>,
    external_reference: Option<ExternalReference>,
    merchant_order_id: Option<String>,
    preference_id: Option<String>,
}

impl GatewayCallback {
    /// Parse a full return URL.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackParseError`] when `url` is not an absolute URL.
    pub fn from_url(url: &str) -> Result<Self, CallbackParseError> {
        let url = Url::parse(url).map_err(|error| CallbackParseError(error.to_string()))?;

        Ok(Self::from_pairs(
            url.query_pairs()
                .map(|(key, value)| (key.into_owned(), value.into_owned())),
        ))
    }

    /// Parse a bare query string, with or without the leading `?`.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackParseError`] when the query cannot form a URL.
    pub fn from_query(query: &str) -> Result<Self, CallbackParseError> {
        Self::from_url(&format!(
            "{QUERY_BASE}?{}",
            query.trim_start_matches('?')
        ))
    }

    /// Build from decoded key/value pairs. The first occurrence of each key wins.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut callback = Self::default();
        let mut collection_status = None;
        let mut collection_id = None;

        for (key, value) in pairs {
            let Some(value) = present(value) else {
                continue;
            };

            let slot = match key.as_str() {
                "status" => &mut callback.status,
                "collection_status" => &mut collection_status,
                "status_detail" => &mut callback.status_detail,
                "payment_id" => &mut callback.payment_id,
                "collection_id" => &mut collection_id,
                "merchant_order_id" => &mut callback.merchant_order_id,
                "preference_id" => &mut callback.preference_id,
                "external_reference" => {
                    if callback.external_reference.is_none() {
                        callback.external_reference = Some(ExternalReference::new(value));
                    }
                    continue;
                }
                _ => continue,
            };

            if slot.is_none() {
                *slot = Some(value);
            }
        }

        callback.status = callback.status.or(collection_status);
        callback.payment_id = callback.payment_id.or(collection_id);

        callback
    }

    /// Reported status, `"unknown"` when absent.
    pub fn status(&self) -> &str {
        self.status.as_deref().unwrap_or("unknown")
    }

    /// Gateway detail code, e.g. `cc_rejected_insufficient_amount`.
    pub fn status_detail(&self) -> Option<&str> {
        self.status_detail.as_deref()
    }

    /// Gateway payment identifier.
    pub fn payment_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    /// Reference of the attempt this payment belongs to.
    pub fn external_reference(&self) -> Option<&ExternalReference> {
        self.external_reference.as_ref()
    }

    /// Gateway merchant order.
    pub fn merchant_order_id(&self) -> Option<&str> {
        self.merchant_order_id.as_deref()
    }

    /// Gateway intent identifier.
    pub fn preference_id(&self) -> Option<&str> {
        self.preference_id.as_deref()
    }

    /// Only an explicit `approved` status counts.
    pub fn is_approved(&self) -> bool {
        self.status.as_deref() == Some(APPROVED)
    }

    /// Customer-facing explanation of a rejected payment.
    pub fn rejection_reason(&self) -> &'static str {
        match self.status_detail() {
            Some("cc_rejected_insufficient_amount") => "insufficient funds on the card",
            Some("cc_rejected_bad_filled_security_code") => "incorrect security code",
            Some("cc_rejected_bad_filled_date") => "incorrect expiry date",
            Some("cc_rejected_bad_filled_other") => "the card details contain an error",
            Some("cc_rejected_blacklist") => "the card was rejected for security reasons",
            Some("cc_rejected_call_for_authorize") => {
                "the payment must be authorised with your bank"
            }
            Some("cc_rejected_card_disabled") => "the card is disabled",
            Some("cc_rejected_duplicated_payment") => "a duplicate payment was detected",
            Some("cc_rejected_high_risk") => "the payment was rejected as high risk",
            Some("cc_rejected_max_attempts") => "too many attempts with this card",
            _ => "the payment was rejected",
        }
    }
}

fn present(value: String) -> Option<String> {
    let trimmed = value.trim();

    (!trimmed.is_empty() && trimmed != "null").then(|| trimmed.to_string())
}
