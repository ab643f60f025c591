//! Input validation and access rules shared by services

use bson::oid::ObjectId;
use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{ServiceError, ServiceResult};
use crate::models::User;

pub const MAX_TITLE_LENGTH: usize = 200;
pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static PAYMENT_INTENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^pi_[A-Za-z0-9_]+$").expect("valid payment intent regex"));

/// Trimmed title of 1..=200 characters
pub fn title(value: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation("Title is required"));
    }
    if value.chars().count() > MAX_TITLE_LENGTH {
        return Err(ServiceError::validation(format!(
            "Title must be at most {} characters",
            MAX_TITLE_LENGTH
        )));
    }
    Ok(value.to_string())
}

/// Non-blank text field
pub fn required(field: &str, value: &str) -> ServiceResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ServiceError::validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

/// Lowercased, trimmed email address
pub fn email(value: &str) -> ServiceResult<String> {
    let value = value.trim().to_lowercase();
    if !EMAIL_RE.is_match(&value) {
        return Err(ServiceError::validation("Invalid email address"));
    }
    Ok(value)
}

pub fn password(value: &str) -> ServiceResult<()> {
    if value.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ServiceError::validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

pub fn non_negative(field: &str, value: i64) -> ServiceResult<()> {
    if value < 0 {
        return Err(ServiceError::validation(format!("{} must not be negative", field)));
    }
    Ok(())
}

pub fn positive(field: &str, value: i64) -> ServiceResult<()> {
    if value <= 0 {
        return Err(ServiceError::validation(format!("{} must be greater than zero", field)));
    }
    Ok(())
}

/// Lowercase three-letter ISO currency code
pub fn currency(value: &str) -> ServiceResult<String> {
    let value = value.trim().to_lowercase();
    if value.len() != 3 || !value.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ServiceError::validation("Invalid currency code"));
    }
    Ok(value)
}

/// Stripe PaymentIntent id such as `pi_3Nx...`; anything else never reaches the gateway
pub fn payment_intent_id(value: &str) -> ServiceResult<&str> {
    if !PAYMENT_INTENT_RE.is_match(value) {
        return Err(ServiceError::validation("Invalid payment intent id"));
    }
    Ok(value)
}

pub fn ensure_admin(user: &User) -> ServiceResult<()> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(ServiceError::forbidden())
    }
}

/// Admins and group members
pub fn ensure_trusted(user: &User) -> ServiceResult<()> {
    if user.is_trusted() {
        Ok(())
    } else {
        Err(ServiceError::forbidden())
    }
}

/// Owner or admin
pub fn ensure_can_manage(user: &User, owner_id: ObjectId) -> ServiceResult<()> {
    if user.can_manage(owner_id) {
        Ok(())
    } else {
        Err(ServiceError::forbidden())
    }
}
