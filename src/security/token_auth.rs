use super::{credentials, Credentials};
use crate::error::{RegistryError, Result};
use crate::models::{hash_token, User};
use crate::store::Store;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

const TOKEN_SCHEMES: &[&str] = &["Token", "Bearer"];

/// The caller resolved from its API token, or anonymous.
#[derive(Debug, Clone, Default)]
pub struct CurrentUser(pub Option<User>);

/// A caller that must be signed in. Runs before the body extractor, so
/// anonymous writes get 403 whatever they send.
#[derive(Debug, Clone)]
pub struct Authenticated(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = RegistryError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentUser>()
            .and_then(|current| current.0.clone())
            .map(Authenticated)
            .ok_or(RegistryError::NotAuthenticated)
    }
}

/// Resolves `Authorization: Token <key>` (or `Bearer <key>`) to a user.
///
/// Requests without credentials continue as anonymous; a key that matches
/// no user is rejected with 401.
pub async fn token_auth_middleware(
    State(store): State<Arc<Store>>,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token_hash = match credentials(req.headers(), TOKEN_SCHEMES) {
        Credentials::Missing => None,
        Credentials::Empty => {
            tracing::debug!("Authorization header without a token key");
            return Err(RegistryError::InvalidToken);
        }
        Credentials::Key(key) => Some(hash_token(key)),
    };

    let user = match token_hash {
        Some(hash) => match store.find_user_by_token(&hash).await? {
            Some(user) => Some(user),
            None => {
                tracing::warn!("Rejected request with unknown API token");
                return Err(RegistryError::InvalidToken);
            }
        },
        None => None,
    };

    if let Some(user) = &user {
        tracing::debug!("Authenticated {} ({})", user.username, user.id);
    }
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
