use crate::error::{CommunityError, CommunityResult};
use actix_web::web;
use std::collections::HashMap;
use url::form_urlencoded;

/// Parses URL-encoded form data from bytes, rejecting bodies that are not UTF-8.
pub fn parse_form(form_bytes: &web::Bytes) -> CommunityResult<HashMap<String, String>> {
    let body = std::str::from_utf8(form_bytes)
        .map_err(|_| CommunityError::Validation("Invalid UTF-8 in request body.".to_string()))?;
    Ok(form_urlencoded::parse(body.as_bytes()).into_owned().collect())
}

/// A trimmed, non-empty field.
pub fn required_field<'a>(form: &'a HashMap<String, String>, key: &str) -> CommunityResult<&'a str> {
    form.get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| CommunityError::Validation(format!("Missing field '{}'.", key)))
}

pub fn optional_field<'a>(form: &'a HashMap<String, String>, key: &str) -> &'a str {
    form.get(key).map(|v| v.trim()).unwrap_or("")
}

pub fn id_field(form: &HashMap<String, String>, key: &str) -> CommunityResult<i64> {
    required_field(form, key)?
        .parse()
        .map_err(|_| CommunityError::Validation(format!("Field '{}' must be a number.", key)))
}

/// HTML checkboxes send "on"; API clients send "true" or "1".
pub fn checkbox_field(form: &HashMap<String, String>, key: &str) -> bool {
    matches!(optional_field(form, key), "on" | "true" | "1")
}
