//! Checkout form
//!
//! Raw form input is checked field by field; every failing field is reported at once so the form
//! can show all messages together.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    sync::LazyLock,
};

use regex::Regex;
use smallvec::SmallVec;
use thiserror::Error;

use crate::orders::{Customer, Delivery, DeliveryType, PaymentMethod};

const NAME_MIN_CHARS: usize = 3;
const NAME_MAX_CHARS: usize = 100;
const PHONE_MIN_CHARS: usize = 10;
const ADDRESS_MIN_CHARS: usize = 10;
const NOTES_MAX_CHARS: usize = 500;

#[expect(clippy::expect_used, reason = "literal pattern, checked by tests")]
static PHONE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\+?54)?3\d{9}$").expect("valid phone pattern"));

#[expect(clippy::expect_used, reason = "literal pattern, checked by tests")]
static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email pattern"));

/// Form field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// Customer name
    Name,

    /// Customer phone
    Phone,

    /// Customer email
    Email,

    /// Delivery address
    Address,

    /// Order notes
    Notes,
}

impl Field {
    /// Field name as shown next to the input.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Email => "email",
            Self::Address => "address",
            Self::Notes => "notes",
        }
    }
}

/// A single field-level validation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// The offending field
    pub field: Field,

    /// What is wrong with it
    pub message: &'static str,
}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}: {}", self.field.as_str(), self.message)
    }
}

/// All field errors of one submission. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid checkout form ({})", summary(.0))]
pub struct ValidationErrors(SmallVec<[FieldError; 4]>);

fn summary(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    /// The individual field errors.
    pub fn errors(&self) -> &[FieldError] {
        &self.0
    }

    /// First message for `field`, if it failed.
    pub fn for_field(&self, field: Field) -> Option<&'static str> {
        self.0
            .iter()
            .find(|error| error.field == field)
            .map(|error| error.message)
    }
}

/// Raw checkout form input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutForm {
    /// Customer name
    pub name: String,

    /// Customer phone
    pub phone: String,

    /// Customer email; blank means none
    pub email: String,

    /// Pickup or delivery
    pub delivery_type: DeliveryType,

    /// Delivery address; ignored for pickup
    pub address: String,

    /// Courier note; ignored for pickup
    pub address_note: String,

    /// Payment method
    pub payment_method: PaymentMethod,

    /// Order notes; blank means none
    pub notes: String,
}

/// Validated checkout details, ready to become an order draft.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutDetails {
    /// Contact details
    pub customer: Customer,

    /// Delivery details
    pub delivery: Delivery,

    /// Payment method
    pub payment_method: PaymentMethod,

    /// Order notes
    pub notes: Option<String>,
}

impl CheckoutForm {
    /// Check every field.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] listing each failing field.
    pub fn validate(self) -> Result<CheckoutDetails, ValidationErrors> {
        let mut errors = SmallVec::new();

        let mut fail = |field, message| errors.push(FieldError { field, message });

        let name = self.name.trim();
        let name_chars = name.chars().count();

        if name_chars < NAME_MIN_CHARS {
            fail(Field::Name, "name must be at least 3 characters");
        } else if name_chars > NAME_MAX_CHARS {
            fail(Field::Name, "name is too long");
        }

        let phone = self.phone.trim();

        if phone.chars().count() < PHONE_MIN_CHARS {
            fail(Field::Phone, "enter a valid phone number");
        } else if !PHONE_PATTERN.is_match(phone) {
            fail(Field::Phone, "format: 351XXXXXXX or +54351XXXXXXX");
        }

        let email = non_blank(&self.email);

        if let Some(email) = email.as_deref()
            && !EMAIL_PATTERN.is_match(email)
        {
            fail(Field::Email, "enter a valid email");
        }

        let delivery = match self.delivery_type {
            DeliveryType::Pickup => Delivery::Pickup,
            DeliveryType::Delivery => {
                let address = self.address.trim();

                if address.chars().count() < ADDRESS_MIN_CHARS {
                    fail(
                        Field::Address,
                        "address is required for delivery (at least 10 characters)",
                    );
                }

                Delivery::Delivery {
                    address: address.to_string(),
                    note: non_blank(&self.address_note),
                }
            }
        };

        let notes = non_blank(&self.notes);

        if notes
            .as_deref()
            .is_some_and(|notes| notes.chars().count() > NOTES_MAX_CHARS)
        {
            fail(Field::Notes, "notes can be at most 500 characters");
        }

        if !errors.is_empty() {
            return Err(ValidationErrors(errors));
        }

        Ok(CheckoutDetails {
            customer: Customer {
                name: name.to_string(),
                phone: phone.to_string(),
                email,
            },
            delivery,
            payment_method: self.payment_method,
            notes,
        })
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();

    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    fn form() -> CheckoutForm {
        CheckoutForm {
            name: "  Lucía Fernández ".to_string(),
            phone: "3515551234".to_string(),
            email: String::new(),
            delivery_type: DeliveryType::Pickup,
            address: String::new(),
            address_note: String::new(),
            payment_method: PaymentMethod::Cash,
            notes: String::new(),
        }
    }

    #[test]
    fn valid_pickup_form_is_trimmed() -> TestResult {
        let details = form().validate()?;

        assert_eq!(details.customer.name, "Lucía Fernández");
        assert_eq!(details.customer.email, None);
        assert_eq!(details.delivery, Delivery::Pickup);
        assert_eq!(details.notes, None);

        Ok(())
    }

    #[test]
    fn delivery_without_address_fails() {
        let mut input = form();
        input.delivery_type = DeliveryType::Delivery;

        let result = input.validate();

        assert!(
            matches!(&result, Err(errors) if errors.for_field(Field::Address).is_some()),
            "expected an address error, got {result:?}"
        );
    }

    #[test]
    fn delivery_with_short_address_fails() {
        let mut input = form();
        input.delivery_type = DeliveryType::Delivery;
        input.address = "Calle 1".to_string();

        assert!(input.validate().is_err());
    }

    #[test]
    fn pickup_ignores_address_fields() -> TestResult {
        let mut input = form();
        input.address = "x".to_string();
        input.address_note = "timbre roto".to_string();

        let details = input.validate()?;

        assert_eq!(details.delivery.address(), None);
        assert_eq!(details.delivery.note(), None);

        Ok(())
    }

    #[test]
    fn delivery_keeps_address_and_note() -> TestResult {
        let mut input = form();
        input.delivery_type = DeliveryType::Delivery;
        input.address = " Bv. San Juan 456, Córdoba ".to_string();
        input.address_note = "portón verde".to_string();

        let details = input.validate()?;

        assert_eq!(details.delivery.address(), Some("Bv. San Juan 456, Córdoba"));
        assert_eq!(details.delivery.note(), Some("portón verde"));

        Ok(())
    }

    #[test]
    fn phone_formats() {
        for valid in ["3515551234", "543515551234", "+543515551234"] {
            let mut input = form();
            input.phone = valid.to_string();

            assert!(input.validate().is_ok(), "{valid} should be accepted");
        }

        for invalid in ["351555", "1155551234", "+1 351 555 1234", "35155512345"] {
            let mut input = form();
            input.phone = invalid.to_string();

            assert!(input.validate().is_err(), "{invalid} should be rejected");
        }
    }

    #[test]
    fn email_is_optional_but_checked() -> TestResult {
        let mut input = form();
        input.email = "lucia@example.com".to_string();

        assert_eq!(
            input.clone().validate()?.customer.email.as_deref(),
            Some("lucia@example.com")
        );

        input.email = "lucia.example.com".to_string();

        assert!(input.validate().is_err());

        Ok(())
    }

    #[test]
    fn notes_are_bounded() {
        let mut input = form();
        input.notes = "a".repeat(500);

        assert!(input.clone().validate().is_ok());

        input.notes = "a".repeat(501);

        assert!(input.validate().is_err());
    }

    #[test]
    fn all_failing_fields_are_reported() {
        let input = CheckoutForm {
            name: "Al".to_string(),
            phone: "123".to_string(),
            email: "nope".to_string(),
            delivery_type: DeliveryType::Delivery,
            address: String::new(),
            address_note: String::new(),
            payment_method: PaymentMethod::Gateway,
            notes: "b".repeat(600),
        };

        let fields: Vec<Field> = input
            .validate()
            .err()
            .map(|errors| errors.errors().iter().map(|error| error.field).collect())
            .unwrap_or_default();

        assert_eq!(
            fields,
            vec![
                Field::Name,
                Field::Phone,
                Field::Email,
                Field::Address,
                Field::Notes
            ]
        );
    }

    #[test]
    fn name_length_is_counted_in_characters() {
        let mut input = form();
        input.name = "Ñoño".to_string();

        assert!(input.clone().validate().is_ok());

        input.name = "é".repeat(101);

        assert!(input.validate().is_err());
    }
}
