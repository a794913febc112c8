//! Validation helper functions for configuration types.

use crate::core::errors::{CodesimError, Result};

/// Validate that a usize value is greater than zero.
pub fn validate_positive_usize(value: usize, field: &str) -> Result<()> {
    if value == 0 {
        return Err(CodesimError::config_field(
            format!("{} must be greater than 0", field),
            field,
        ));
    }
    Ok(())
}

/// Validate that a u64 value is greater than zero.
pub fn validate_positive_u64(value: u64, field: &str) -> Result<()> {
    if value == 0 {
        return Err(CodesimError::config_field(
            format!("{} must be greater than 0", field),
            field,
        ));
    }
    Ok(())
}

/// Validate that an f64 value is finite and non-negative.
pub fn validate_non_negative(value: f64, field: &str) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(CodesimError::config_field(
            format!("{} must be a finite non-negative number", field),
            field,
        ));
    }
    Ok(())
}

/// Validate that at least one weight is positive.
pub fn validate_weights_not_all_zero(weights: &[f64], field: &str) -> Result<()> {
    if weights.iter().all(|w| *w <= 0.0) {
        return Err(CodesimError::config_field(
            format!("{} weights must not all be zero", field),
            field,
        ));
    }
    Ok(())
}
