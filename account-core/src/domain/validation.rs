//! Field validators
//!
//! Pure checks with no side effects. Used at construction, on every mutation
//! and again when a stored record is rebuilt.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use super::result::{Error, Result};

/// atom ("." atom)* "@" label ("." label)+
static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(?:\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$",
    )
    .expect("email pattern compiles")
});

/// True iff `text` is a well-formed email address
pub fn validate_email(text: &str) -> bool {
    EMAIL_RE.is_match(text)
}

/// Fail on the first `(field, value)` pair whose value is blank
pub fn validate_required(fields: &[(&str, &str)]) -> Result<()> {
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(Error::validation(format!("{} is required", field)));
        }
    }
    Ok(())
}

/// Fail unless `amount` is strictly positive
pub fn validate_positive_amount(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// Trim and lowercase an email, then check it
pub fn normalize_email(text: &str) -> Result<String> {
    let email = text.trim().to_lowercase();
    validate_required(&[("email", &email)])?;
    if !validate_email(&email) {
        return Err(Error::validation(format!("invalid email address: {}", text)));
    }
    Ok(email)
}
