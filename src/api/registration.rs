//! Registration wizard endpoints
//!
//! - POST /registration/ - contact details, starts a registration
//! - POST /registration/{reg_id}/metadata/ - metadata permissions
//! - POST /registration/{reg_id}/provider/ - provider basics, probes OAI providers
//! - POST /registration/{reg_id}/oai/ - OAI finish (sets and properties)
//! - POST /registration/{reg_id}/other/ - non-OAI finish
//! - GET /registration/ - latest registrations
//! - GET /providers/{name}/ - one registered provider

use super::extract::Json;
use super::AppState;
use crate::error::Result;
use crate::models::RegistrationInfo;
use crate::registration::{
    ContactInfoForm, InitialProviderForm, MetadataQuestionsForm, OaiProviderForm,
    OtherProviderForm, ProviderStep,
};
use crate::sets::{parse_properties, parse_sets};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

const LATEST_PROVIDERS: usize = 5;

#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub reg_id: i64,
    pub next_step: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SetView {
    pub spec: String,
    pub name: String,
}

/// Public view of a registration; contact details are left out.
#[derive(Debug, Serialize)]
pub struct ProviderView {
    pub id: i64,
    pub provider_long_name: String,
    pub provider_short_name: String,
    pub base_url: String,
    pub description: String,
    pub oai_provider: bool,
    pub property_list: Vec<String>,
    pub approved_sets: Vec<SetView>,
    pub registration_date: DateTime<Utc>,
    pub recently_registered: bool,
}

impl ProviderView {
    fn new(registration: RegistrationInfo, recent_days: i64) -> Self {
        let recently_registered = registration.was_registered_recently(recent_days);
        Self {
            id: registration.id,
            property_list: parse_properties(&registration.property_list),
            approved_sets: parse_sets(&registration.approved_sets)
                .into_iter()
                .map(|(spec, name)| SetView { spec, name })
                .collect(),
            provider_long_name: registration.provider_long_name,
            provider_short_name: registration.provider_short_name,
            base_url: registration.base_url,
            description: registration.description,
            oai_provider: registration.oai_provider,
            registration_date: registration.registration_date,
            recently_registered,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompletedResponse {
    pub status: &'static str,
    pub provider: ProviderView,
}

#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub latest_provider_list: Vec<ProviderView>,
}

pub async fn contact_info(
    State(state): State<AppState>,
    Json(form): Json<ContactInfoForm>,
) -> Result<impl IntoResponse> {
    let registration = state.registrar.start(&form).await?;

    Ok((
        StatusCode::CREATED,
        Json(StepResponse {
            reg_id: registration.id,
            next_step: "metadata",
        }),
    ))
}

pub async fn metadata_questions(
    State(state): State<AppState>,
    Path(reg_id): Path<i64>,
    Json(form): Json<MetadataQuestionsForm>,
) -> Result<Json<StepResponse>> {
    state.registrar.answer_metadata(reg_id, &form).await?;

    Ok(Json(StepResponse {
        reg_id,
        next_step: "provider",
    }))
}

pub async fn provider_information(
    State(state): State<AppState>,
    Path(reg_id): Path<i64>,
    Json(form): Json<InitialProviderForm>,
) -> Result<Json<ProviderStep>> {
    Ok(Json(state.registrar.submit_provider(reg_id, &form).await?))
}

pub async fn oai_provider(
    State(state): State<AppState>,
    Path(reg_id): Path<i64>,
    Json(form): Json<OaiProviderForm>,
) -> Result<Json<CompletedResponse>> {
    let registration = state.registrar.finish_oai(reg_id, &form).await?;

    Ok(Json(CompletedResponse {
        status: "registered",
        provider: ProviderView::new(registration, state.recent_days),
    }))
}

pub async fn other_provider(
    State(state): State<AppState>,
    Path(reg_id): Path<i64>,
    Json(form): Json<OtherProviderForm>,
) -> Result<Json<CompletedResponse>> {
    let registration = state.registrar.finish_other(reg_id, &form).await?;

    Ok(Json(CompletedResponse {
        status: "registered",
        provider: ProviderView::new(registration, state.recent_days),
    }))
}

pub async fn index(State(state): State<AppState>) -> Result<Json<IndexResponse>> {
    let latest = state.registrar.latest(LATEST_PROVIDERS).await?;

    Ok(Json(IndexResponse {
        latest_provider_list: latest
            .into_iter()
            .map(|r| ProviderView::new(r, state.recent_days))
            .collect(),
    }))
}

pub async fn provider_detail(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ProviderView>> {
    let registration = state.registrar.detail(&name).await?;
    Ok(Json(ProviderView::new(registration, state.recent_days)))
}
