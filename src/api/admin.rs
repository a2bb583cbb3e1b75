//! Admin endpoints (behind the admin-auth middleware)
//!
//! - GET /admin/registrations?search=&recent_days=
//! - GET|PUT /admin/registrations/{id}
//! - POST /admin/users - create a push user, returns its token once
//! - POST /admin/users/{id}/token - rotate a user's token

use super::extract::Json;
use super::AppState;
use crate::error::{RegistryError, Result};
use crate::models::{
    generate_token, hash_token, is_valid_username, recent_cutoff, RegistrationInfo, User,
};
use crate::registration::PropertyInput;
use crate::sets::{parse_sets, serialize_properties, serialize_sets};
use crate::store::RegistrationFilter;
use crate::validators::{max_length, required, valid_url, ValidationErrors};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use tracing::info;

const INVALID_USERNAME: &str =
    "Enter a valid username. This value may contain only letters, numbers and @/./+/-/_ characters.";

#[derive(Debug, Default, Deserialize)]
pub struct ListRegistrationsQuery {
    pub search: Option<String>,
    pub recent_days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AdminRegistrationView {
    #[serde(flatten)]
    pub registration: RegistrationInfo,
    pub was_registered_recently: bool,
}

impl AdminRegistrationView {
    fn new(registration: RegistrationInfo, recent_days: i64) -> Self {
        Self {
            was_registered_recently: registration.was_registered_recently(recent_days),
            registration,
        }
    }
}

pub async fn list_registrations(
    State(state): State<AppState>,
    Query(query): Query<ListRegistrationsQuery>,
) -> Result<Json<Vec<AdminRegistrationView>>> {
    let registered_since = match query.recent_days {
        Some(days) if days < 0 => {
            return Err(RegistryError::InvalidRequest {
                message: "recent_days must not be negative".to_string(),
            });
        }
        Some(days) => Some(recent_cutoff(Utc::now(), days).ok_or_else(|| {
            RegistryError::InvalidRequest {
                message: format!("recent_days {} is out of range", days),
            }
        })?),
        None => None,
    };

    let filter = RegistrationFilter {
        search: query.search.filter(|s| !s.trim().is_empty()),
        registered_since,
        limit: None,
    };

    let registrations = state.store.list_registrations(&filter).await?;
    Ok(Json(
        registrations
            .into_iter()
            .map(|r| AdminRegistrationView::new(r, state.recent_days))
            .collect(),
    ))
}

pub async fn get_registration(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AdminRegistrationView>> {
    let registration = state
        .store
        .get_registration(id)
        .await?
        .ok_or(RegistryError::RegistrationNotFound { reg_id: id })?;
    Ok(Json(AdminRegistrationView::new(registration, state.recent_days)))
}

#[derive(Debug, Deserialize)]
pub struct SetPair {
    pub spec: String,
    pub name: String,
}

/// Editable fields; absent fields are left as they are.
#[derive(Debug, Default, Deserialize)]
pub struct RegistrationUpdate {
    pub provider_short_name: Option<String>,
    pub provider_long_name: Option<String>,
    pub base_url: Option<String>,
    pub property_list: Option<PropertyInput>,
    pub approved_sets: Option<Vec<SetPair>>,
    pub registration_date: Option<DateTime<Utc>>,
}

impl RegistrationUpdate {
    fn apply(self, registration: &mut RegistrationInfo) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if let Some(name) = &self.provider_long_name {
            if let Some(name) = errors.check("provider_long_name", required(Some(name.as_str()))) {
                if errors.check("provider_long_name", max_length(&name, 100)).is_some() {
                    registration.provider_long_name = name;
                }
            }
        }
        if let Some(short) = &self.provider_short_name {
            let short = short.trim();
            if errors.check("provider_short_name", max_length(short, 50)).is_some() {
                registration.provider_short_name = short.to_string();
            }
        }
        if let Some(url) = &self.base_url {
            if errors.check("base_url", valid_url(url)).is_some() {
                registration.base_url = url.trim().to_string();
            }
        }
        if let Some(properties) = &self.property_list {
            let names = properties.names();
            registration.property_list = serialize_properties(names.iter().map(String::as_str));
        }
        if let Some(sets) = &self.approved_sets {
            registration.approved_sets =
                serialize_sets(sets.iter().map(|s| (s.spec.as_str(), s.name.as_str())));
        }
        if let Some(date) = self.registration_date {
            registration.registration_date = date;
        }

        errors.into_result()
    }
}

pub async fn update_registration(
    State(state): State<AppState>,
    Extension(source_ip): Extension<IpAddr>,
    Path(id): Path<i64>,
    Json(update): Json<RegistrationUpdate>,
) -> Result<Json<AdminRegistrationView>> {
    let mut registration = state
        .store
        .get_registration(id)
        .await?
        .ok_or(RegistryError::RegistrationNotFound { reg_id: id })?;

    update.apply(&mut registration)?;
    state.store.save_registration(&registration).await?;

    info!(
        "Admin at {} updated registration {} ({} set(s))",
        source_ip,
        id,
        parse_sets(&registration.approved_sets).len()
    );
    Ok(Json(AdminRegistrationView::new(registration, state.recent_days)))
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: Option<String>,
}

/// The only response that ever carries a plain token.
#[derive(Debug, Serialize)]
pub struct IssuedToken {
    pub id: i64,
    pub username: String,
    pub token: String,
}

impl IssuedToken {
    fn new(user: User, token: String) -> Self {
        Self {
            id: user.id,
            username: user.username,
            token,
        }
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    Extension(source_ip): Extension<IpAddr>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse> {
    let mut errors = ValidationErrors::new();
    if let Some(username) = errors.check("username", required(request.username.as_deref())) {
        if !is_valid_username(&username) {
            errors.add("username", INVALID_USERNAME);
        }
    }
    errors.into_result()?;
    let username = request.username.unwrap_or_default().trim().to_string();

    let token = generate_token();
    let user = state.store.create_user(&username, &hash_token(&token)).await?;
    info!("Admin at {} created user {} ({})", source_ip, user.username, user.id);

    Ok((StatusCode::CREATED, Json(IssuedToken::new(user, token))))
}

pub async fn rotate_token(
    State(state): State<AppState>,
    Extension(source_ip): Extension<IpAddr>,
    Path(id): Path<i64>,
) -> Result<Json<IssuedToken>> {
    let user = state
        .store
        .get_user(id)
        .await?
        .ok_or(RegistryError::NotFound { resource: "User", id })?;

    let token = generate_token();
    state.store.set_user_token(id, &hash_token(&token)).await?;
    info!("Admin at {} rotated the token of user {}", source_ip, id);

    Ok(Json(IssuedToken::new(user, token)))
}
