mod admin_auth;
mod token_auth;

pub use admin_auth::{admin_auth_middleware, AdminAuthConfig};
pub use token_auth::{token_auth_middleware, Authenticated, CurrentUser};

use axum::http::{header::AUTHORIZATION, HeaderMap};

/// What the `Authorization` header carried for the accepted schemes.
#[derive(Debug, PartialEq, Eq)]
enum Credentials<'a> {
    Missing,
    /// One of the schemes matched but no key followed it.
    Empty,
    Key(&'a str),
}

fn credentials<'a>(headers: &'a HeaderMap, schemes: &[&str]) -> Credentials<'a> {
    let Some(header) = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) else {
        return Credentials::Missing;
    };

    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    if !schemes.iter().any(|s| s.eq_ignore_ascii_case(scheme)) {
        return Credentials::Missing;
    }

    match parts.next().map(str::trim) {
        Some(key) if !key.is_empty() && !key.contains(' ') => Credentials::Key(key),
        _ => Credentials::Empty,
    }
}
