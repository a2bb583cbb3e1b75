//! Push endpoint
//!
//! - GET /pushed_data/ - every record, anonymous allowed
//! - POST /pushed_data/ - create a record owned by the caller
//! - PUT|PATCH /pushed_data/ - bulk update of the caller's records
//! - GET|PUT|PATCH|DELETE /pushed_data/{id}/ - one record, changes by its owner only

use super::extract::Json;
use super::AppState;
use crate::error::{RegistryError, Result};
use crate::models::{PushedData, PushedDataView, User};
use crate::push::PushedDataInput;
use crate::security::Authenticated;
use crate::store::Store;
use crate::validators::{ValidationErrors, FIELD_REQUIRED};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use std::collections::HashMap;
use tracing::info;

async fn to_view(store: &Store, data: PushedData) -> Result<PushedDataView> {
    let source = store
        .get_user(data.source_id)
        .await?
        .map(|u| u.username)
        .unwrap_or_default();
    Ok(PushedDataView::new(data, source))
}

async fn to_views(store: &Store, records: Vec<PushedData>) -> Result<Vec<PushedDataView>> {
    let usernames: HashMap<i64, String> = store
        .list_users()
        .await?
        .into_iter()
        .map(|u| (u.id, u.username))
        .collect();

    Ok(records
        .into_iter()
        .map(|data| {
            let source = usernames.get(&data.source_id).cloned().unwrap_or_default();
            PushedDataView::new(data, source)
        })
        .collect())
}

async fn load(store: &Store, id: i64) -> Result<PushedData> {
    store
        .get_pushed(id)
        .await?
        .ok_or(RegistryError::NotFound {
            resource: "PushedData",
            id,
        })
}

fn ensure_owner(user: &User, data: &PushedData) -> Result<()> {
    if data.source_id != user.id {
        tracing::warn!(
            "User {} tried to modify record {} owned by user {}",
            user.id,
            data.id,
            data.source_id
        );
        return Err(RegistryError::PermissionDenied);
    }
    Ok(())
}

pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<PushedDataView>>> {
    let records = state.store.list_pushed(None).await?;
    Ok(Json(to_views(&state.store, records).await?))
}

pub async fn create(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(input): Json<PushedDataInput>,
) -> Result<impl IntoResponse> {
    let fields = input.clean(None, &state.doi_resolves).await?;

    let data = state
        .store
        .create_pushed(user.id, fields, Utc::now().date_naive())
        .await?;
    info!("User {} pushed record {}", user.username, data.id);

    Ok((
        StatusCode::CREATED,
        Json(PushedDataView::new(data, user.username)),
    ))
}

pub async fn bulk_update(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(items): Json<Vec<PushedDataInput>>,
) -> Result<Json<Vec<PushedDataView>>> {
    apply_bulk(&state, &user, items, false).await.map(Json)
}

pub async fn partial_bulk_update(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Json(items): Json<Vec<PushedDataInput>>,
) -> Result<Json<Vec<PushedDataView>>> {
    apply_bulk(&state, &user, items, true).await.map(Json)
}

/// All-or-nothing: every item must carry an id, belong to the caller and
/// validate before anything is written.
async fn apply_bulk(
    state: &AppState,
    user: &User,
    items: Vec<PushedDataInput>,
    partial: bool,
) -> Result<Vec<PushedDataView>> {
    let mut missing_id = false;
    let mut id_errors = Vec::with_capacity(items.len());
    for item in &items {
        let mut errors = ValidationErrors::new();
        if item.id.is_none() {
            errors.add("id", FIELD_REQUIRED);
            missing_id = true;
        }
        id_errors.push(errors);
    }
    if missing_id {
        return Err(RegistryError::BulkValidation(id_errors));
    }

    let mut targets = Vec::with_capacity(items.len());
    for item in &items {
        let id = item.id.unwrap_or_default();
        let data = load(&state.store, id).await?;
        ensure_owner(user, &data)?;
        targets.push(data);
    }

    let mut cleaned = Vec::with_capacity(items.len());
    let mut all_errors = Vec::with_capacity(items.len());
    for (item, data) in items.iter().zip(&targets) {
        let existing = data.fields();
        match item
            .clean(partial.then_some(&existing), &state.doi_resolves)
            .await
        {
            Ok(fields) => {
                cleaned.push(Some(fields));
                all_errors.push(ValidationErrors::new());
            }
            Err(errors) => {
                cleaned.push(None);
                all_errors.push(errors);
            }
        }
    }
    if all_errors.iter().any(|e| !e.is_empty()) {
        return Err(RegistryError::BulkValidation(all_errors));
    }

    let today = Utc::now().date_naive();
    for (data, fields) in targets.iter_mut().zip(cleaned.into_iter().flatten()) {
        data.apply(fields, today);
    }
    state.store.save_pushed_many(&targets).await?;

    let updated: Vec<PushedDataView> = targets
        .into_iter()
        .map(|data| PushedDataView::new(data, user.username.clone()))
        .collect();
    info!("User {} updated {} record(s) in bulk", user.username, updated.len());
    Ok(updated)
}

pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PushedDataView>> {
    let data = load(&state.store, id).await?;
    Ok(Json(to_view(&state.store, data).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<i64>,
    Json(input): Json<PushedDataInput>,
) -> Result<Json<PushedDataView>> {
    apply_one(&state, &user, id, input, false).await.map(Json)
}

pub async fn partial_update(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<i64>,
    Json(input): Json<PushedDataInput>,
) -> Result<Json<PushedDataView>> {
    apply_one(&state, &user, id, input, true).await.map(Json)
}

async fn apply_one(
    state: &AppState,
    user: &User,
    id: i64,
    input: PushedDataInput,
    partial: bool,
) -> Result<PushedDataView> {
    let mut data = load(&state.store, id).await?;
    ensure_owner(user, &data)?;

    let existing = data.fields();
    let fields = input
        .clean(partial.then_some(&existing), &state.doi_resolves)
        .await?;

    data.apply(fields, Utc::now().date_naive());
    state.store.save_pushed(&data).await?;

    Ok(PushedDataView::new(data, user.username.clone()))
}

pub async fn destroy(
    State(state): State<AppState>,
    Authenticated(user): Authenticated,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let data = load(&state.store, id).await?;
    ensure_owner(&user, &data)?;

    state.store.delete_pushed(id).await?;
    info!("User {} deleted record {}", user.username, id);
    Ok(StatusCode::NO_CONTENT)
}
