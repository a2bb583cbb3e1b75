use super::AppState;
use crate::error::{RegistryError, Result};
use crate::models::UserView;
use axum::{
    extract::{Path, State},
    Json,
};
use std::collections::HashMap;

/// Every user with the ids of the records they pushed.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<UserView>>> {
    let mut owned: HashMap<i64, Vec<i64>> = HashMap::new();
    for data in state.store.list_pushed(None).await? {
        owned.entry(data.source_id).or_default().push(data.id);
    }

    let users = state.store.list_users().await?;
    Ok(Json(
        users
            .into_iter()
            .map(|u| UserView {
                data: owned.remove(&u.id).unwrap_or_default(),
                id: u.id,
                username: u.username,
            })
            .collect(),
    ))
}

pub async fn detail(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<UserView>> {
    let user = state
        .store
        .get_user(id)
        .await?
        .ok_or(RegistryError::NotFound { resource: "User", id })?;
    let data = state
        .store
        .list_pushed(Some(id))
        .await?
        .into_iter()
        .map(|d| d.id)
        .collect();

    Ok(Json(UserView {
        id: user.id,
        username: user.username,
        data,
    }))
}
