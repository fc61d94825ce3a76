//! Field-level checks shared by the request types.
//!
//! Every helper takes the JSON path of the field it inspects so the resulting
//! `ServiceError::ValidationError` can point the caller at the offending value.

use crate::errors::ServiceError;

pub const MAX_NAME_LENGTH: usize = 120;
pub const MAX_ADDRESS_FIELD_LENGTH: usize = 120;
pub const MAX_EMAIL_LENGTH: usize = 254;

pub fn ensure_non_empty(param: &str, value: &str, max_len: usize) -> Result<(), ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid_field(
            param,
            format!("{} cannot be empty", field_name(param)),
        ));
    }
    ensure_length(param, trimmed, max_len)
}

pub fn ensure_length(param: &str, value: &str, max_len: usize) -> Result<(), ServiceError> {
    if value.chars().count() > max_len {
        return Err(ServiceError::invalid_field(
            param,
            format!(
                "{} must be {} characters or fewer",
                field_name(param),
                max_len
            ),
        ));
    }
    Ok(())
}

pub fn ensure_ascii_identifier(param: &str, value: &str, max_len: usize) -> Result<(), ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::invalid_field(
            param,
            format!("{} cannot be empty", field_name(param)),
        ));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':' | '/' | '#'))
    {
        return Err(ServiceError::invalid_field(
            param,
            format!("{} contains unsupported characters", field_name(param)),
        ));
    }
    ensure_length(param, trimmed, max_len)
}

pub fn ensure_email(param: &str, value: &str) -> Result<(), ServiceError> {
    ensure_non_empty(param, value, MAX_EMAIL_LENGTH)?;
    if !validator::validate_email(value.trim()) {
        return Err(ServiceError::invalid_field(
            param,
            format!("{} is not a valid email address", field_name(param)),
        ));
    }
    Ok(())
}

pub fn ensure_phone(param: &str, value: &str) -> Result<(), ServiceError> {
    if !is_valid_phone(value) {
        return Err(ServiceError::invalid_field(
            param,
            format!("{} is not a valid phone number", field_name(param)),
        ));
    }
    Ok(())
}

pub fn ensure_country_code(param: &str, value: &str) -> Result<(), ServiceError> {
    let country = value.trim();
    if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ServiceError::invalid_field(
            param,
            format!(
                "{} must be a two-character ISO country code",
                field_name(param)
            ),
        ));
    }
    Ok(())
}

fn is_valid_phone(phone: &str) -> bool {
    if phone.trim().is_empty() {
        return false;
    }
    if !phone
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')' | '.'))
    {
        return false;
    }
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    (7..=16).contains(&digits)
}

/// `$.buyer.email` -> `buyer.email`
fn field_name(param: &str) -> &str {
    param.strip_prefix("$.").unwrap_or(param)
}
