use super::{ValidationError, FIELD_REQUIRED, INVALID_EMAIL, INVALID_URL};
use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;

const URL_SCHEMES: [&str; 4] = ["http", "https", "ftp", "ftps"];

/// Missing and whitespace-only values are both rejected; the value is returned trimmed.
pub fn required(value: Option<&str>) -> Result<String, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ValidationError::new(FIELD_REQUIRED)),
    }
}

pub fn max_length(value: &str, max: usize) -> Result<(), ValidationError> {
    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::new(format!(
            "Ensure this field has at most {} characters (it has {}).",
            max, len
        )));
    }
    Ok(())
}

/// Syntactic URL check: a known scheme and a host.
pub fn valid_url(value: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(value.trim()).map_err(|_| ValidationError::new(INVALID_URL))?;

    if !URL_SCHEMES.contains(&url.scheme()) {
        return Err(ValidationError::new(INVALID_URL));
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(ValidationError::new(INVALID_URL)),
    }
}

pub fn valid_email(value: &str) -> Result<(), ValidationError> {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)+$")
            .expect("email pattern compiles")
    });

    if re.is_match(value.trim()) {
        Ok(())
    } else {
        Err(ValidationError::new(INVALID_EMAIL))
    }
}

/// Every selected value must be one of `available`; an empty selection is a missing field.
pub fn valid_choices<'a>(
    selected: &'a [String],
    available: impl Fn(&str) -> bool,
) -> Result<&'a [String], ValidationError> {
    if selected.is_empty() {
        return Err(ValidationError::new(FIELD_REQUIRED));
    }

    if let Some(bad) = selected.iter().find(|v| !available(v)) {
        return Err(ValidationError::new(format!(
            "Select a valid choice. {} is not one of the available choices.",
            bad
        )));
    }

    Ok(selected)
}
