//! # Validation Module
//!
//! Input validation for checkout, quote and payment inputs.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: UI / API collaborator                                        │
//! │  └── Format checks and immediate feedback                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  └── Shape of line items, holders, delivery, reasons                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Aggregate rules (order / quote / credit)                     │
//! │  └── Status transitions, money movements                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::{Delivery, GuestContact, Holder, LineItemInput};
use crate::{MAX_ITEM_QUANTITY, MAX_LINE_ITEMS, MAX_UNIT_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

fn required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

fn max_len(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    if value.trim().chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }
    Ok(())
}

// =============================================================================
// Line Items
// =============================================================================

/// Validates a priced line list from the cart collaborator.
///
/// ## Rules
/// - 1..=100 lines
/// - Non-empty product reference
/// - Quantity 1..=999
/// - Unit price 0..=`MAX_UNIT_PRICE_CENTS`
///
/// ```rust
/// use mercado_core::validation::validate_line_items;
///
/// assert!(validate_line_items(&[]).is_err());
/// ```
pub fn validate_line_items(items: &[LineItemInput]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Required {
            field: "line_items".to_string(),
        });
    }

    if items.len() > MAX_LINE_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "line_items".to_string(),
            min: 1,
            max: MAX_LINE_ITEMS as i64,
        });
    }

    for item in items {
        required("product_ref", &item.product_ref)?;

        if item.quantity < 1 || item.quantity > MAX_ITEM_QUANTITY {
            return Err(ValidationError::OutOfRange {
                field: "quantity".to_string(),
                min: 1,
                max: MAX_ITEM_QUANTITY,
            });
        }

        if item.unit_price_cents < 0 {
            return Err(ValidationError::InvalidFormat {
                field: "unit_price".to_string(),
                reason: "cannot be negative".to_string(),
            });
        }
        if item.unit_price_cents > MAX_UNIT_PRICE_CENTS {
            return Err(ValidationError::OutOfRange {
                field: "unit_price".to_string(),
                min: 0,
                max: MAX_UNIT_PRICE_CENTS,
            });
        }
    }

    Ok(())
}

// =============================================================================
// Holder
// =============================================================================

/// Validates an email address (shape only: `local@domain.tld`).
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    required("email", email)?;
    max_len("email", email, 254)?;

    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@domain.tld".to_string(),
        });
    }

    Ok(())
}

/// Validates a guest contact bundle.
pub fn validate_guest(contact: &GuestContact) -> ValidationResult<()> {
    required("name", &contact.name)?;
    max_len("name", &contact.name, 120)?;
    validate_email(&contact.email)?;

    if let Some(phone) = &contact.phone {
        max_len("phone", phone, 30)?;
    }
    if let Some(document) = &contact.document {
        max_len("document", document, 30)?;
    }

    Ok(())
}

/// Validates the holder of a quote or order.
pub fn validate_holder(holder: &Holder) -> ValidationResult<()> {
    match holder {
        Holder::Customer { customer_id } => required("customer_id", customer_id),
        Holder::Guest(contact) => validate_guest(contact),
    }
}

// =============================================================================
// Delivery, reasons, proofs
// =============================================================================

/// Validates the delivery choice; home delivery needs a non-empty address.
pub fn validate_delivery(delivery: &Delivery) -> ValidationResult<()> {
    match delivery {
        Delivery::Home { address } => {
            required("delivery_address", address)?;
            max_len("delivery_address", address, 300)
        }
        Delivery::StorePickup => Ok(()),
    }
}

/// Validates a payment-proof storage reference.
pub fn validate_proof_reference(reference: &str) -> ValidationResult<()> {
    required("proof_reference", reference)?;
    max_len("proof_reference", reference, 2048)
}

/// Returns the trimmed reason, or `None` when blank.
pub fn normalize_reason(reason: Option<&str>) -> Option<String> {
    reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

// =============================================================================
// Unit Tests
// =============================================================================
