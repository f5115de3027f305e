use crate::server::response::ApiError;

const MAX_USERNAME_LEN: usize = 64;
const MAX_CATALOG_NAME_LEN: usize = 64;
const MAX_CURRENCY_AFFIX_LEN: usize = 16;

fn is_valid_username_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

pub fn validate_username(name: &str) -> Result<(), ApiError> {
    if name.is_empty() {
        return Err(ApiError::bad_request("Username cannot be empty"));
    }
    if name.len() > MAX_USERNAME_LEN {
        return Err(ApiError::bad_request(format!(
            "Username cannot exceed {MAX_USERNAME_LEN} characters"
        )));
    }
    if !name.chars().all(is_valid_username_char) {
        return Err(ApiError::bad_request(
            "Username can only contain alphanumeric characters, hyphens, underscores, and periods",
        ));
    }
    if name.starts_with(['-', '_', '.']) {
        return Err(ApiError::bad_request(
            "Username cannot start with a hyphen, underscore, or period",
        ));
    }
    Ok(())
}

/// Kube and package names: non-blank, bounded like the `VARCHAR(64)` columns.
pub fn validate_catalog_name(name: &str, entity: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{entity} name cannot be empty")));
    }
    if name.chars().count() > MAX_CATALOG_NAME_LEN {
        return Err(ApiError::bad_request(format!(
            "{entity} name cannot exceed {MAX_CATALOG_NAME_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_currency_affix(value: &str, field: &str) -> Result<(), ApiError> {
    if value.chars().count() > MAX_CURRENCY_AFFIX_LEN {
        return Err(ApiError::bad_request(format!(
            "Package {field} cannot exceed {MAX_CURRENCY_AFFIX_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_non_negative(value: f64, field: &str) -> Result<(), ApiError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ApiError::bad_request(format!(
            "{field} must be a non-negative number"
        )));
    }
    Ok(())
}
