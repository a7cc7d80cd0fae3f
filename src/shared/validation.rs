//! Validation Utilities

use validator::ValidationErrors;

use super::error::RelayError;

/// Convert validation errors on a relay request into `RelayError::InvalidContent`
pub fn validation_error(errors: ValidationErrors) -> RelayError {
    let message = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let detail = e.message.clone().map(|m| m.to_string()).unwrap_or_default();
                format!("{}: {}", field, detail)
            })
        })
        .next()
        .unwrap_or_else(|| "Validation failed".into());

    RelayError::InvalidContent(message)
}
