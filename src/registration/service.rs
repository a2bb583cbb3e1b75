use super::forms::{
    ContactInfoForm, InitialProviderForm, MetadataQuestionsForm, OaiProviderForm, OtherProviderForm,
};
use crate::error::{RegistryError, Result};
use crate::models::RegistrationInfo;
use crate::oai::{IdentifyInfo, OaiClient};
use crate::sets::{
    format_set_choices, parse_properties, parse_sets, serialize_oai_sets, serialize_properties,
    serialize_sets, short_spec,
};
use crate::store::{RegistrationFilter, Store};
use crate::validators::{UrlResolves, ValidOaiUrl, ValidationErrors};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const XML_NOT_VALID: &str = "XML Not Valid";
pub const REGISTRATION_NOT_FOUND: &str = "Registration not found";

/// Result of a provider save: `value` is the success flag, `reason` the
/// message shown to the registrant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveOutcome {
    pub value: bool,
    pub reason: String,
}

impl SaveOutcome {
    fn failed(reason: impl Into<String>) -> Self {
        Self {
            value: false,
            reason: reason.into(),
        }
    }

    fn saved(name: &str) -> Self {
        Self {
            value: true,
            reason: format!("{} registered and saved successfully", name),
        }
    }
}

/// Where the wizard goes after the provider step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "next_step", rename_all = "lowercase")]
pub enum ProviderStep {
    Oai {
        reg_id: i64,
        repository_name: String,
        choices: Vec<SetChoice>,
        property_list: Vec<String>,
    },
    Other {
        reg_id: i64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetChoice {
    pub value: String,
    pub label: String,
}

/// Drives a registration through contact, metadata, provider and finish steps.
pub struct Registrar {
    store: Arc<Store>,
    oai: OaiClient,
    url_resolves: UrlResolves,
    valid_oai: ValidOaiUrl,
    property_lookback_days: i64,
}

impl Registrar {
    pub fn new(
        store: Arc<Store>,
        oai: OaiClient,
        url_resolves: UrlResolves,
        valid_oai: ValidOaiUrl,
        property_lookback_days: i64,
    ) -> Self {
        Self {
            store,
            oai,
            url_resolves,
            valid_oai,
            property_lookback_days,
        }
    }

    async fn load(&self, reg_id: i64) -> Result<RegistrationInfo> {
        self.store
            .get_registration(reg_id)
            .await?
            .ok_or(RegistryError::RegistrationNotFound { reg_id })
    }

    /// Contact step: creates the registration and hands back its id.
    pub async fn start(&self, form: &ContactInfoForm) -> Result<RegistrationInfo> {
        let new = form.clean()?;
        let registration = self.store.create_registration(new).await?;
        info!(
            "Started registration {} for {}",
            registration.id, registration.contact_email
        );
        Ok(registration)
    }

    pub async fn answer_metadata(
        &self,
        reg_id: i64,
        form: &MetadataQuestionsForm,
    ) -> Result<RegistrationInfo> {
        let answers = form.clean()?;
        let mut registration = self.load(reg_id).await?;

        registration.meta_tos = answers.meta_tos;
        registration.meta_privacy = answers.meta_privacy;
        registration.meta_sharing_tos = answers.meta_sharing_tos;
        registration.meta_license = answers.meta_license;
        registration.meta_license_extended = answers.meta_license_extended;
        registration.meta_future_license = answers.meta_future_license;

        self.store.save_registration(&registration).await?;
        Ok(registration)
    }

    /// Provider step. OAI providers are probed immediately; a failed probe is
    /// reported against `base_url`.
    pub async fn submit_provider(
        &self,
        reg_id: i64,
        form: &InitialProviderForm,
    ) -> Result<ProviderStep> {
        let basics = form.clean(&self.url_resolves).await?;
        let mut registration = self.load(reg_id).await?;

        registration.provider_long_name = basics.provider_long_name.clone();
        registration.provider_short_name = basics.provider_short_name;
        registration.base_url = basics.base_url.clone();
        registration.description = basics.description;
        registration.oai_provider = basics.oai_provider;
        self.store.save_registration(&registration).await?;

        if !basics.oai_provider {
            return Ok(ProviderStep::Other { reg_id });
        }

        let (outcome, identify) = self
            .probe_and_save(&basics.provider_long_name, &basics.base_url, reg_id)
            .await?;
        if !outcome.value {
            let mut errors = ValidationErrors::new();
            errors.add("base_url", outcome.reason);
            return Err(errors.into());
        }

        let registration = self.load(reg_id).await?;
        let choices = format_set_choices(&registration)
            .into_iter()
            .map(|(value, label)| SetChoice { value, label })
            .collect();

        Ok(ProviderStep::Oai {
            reg_id,
            repository_name: identify.map(|i| i.repository_name).unwrap_or_default(),
            choices,
            property_list: parse_properties(&registration.property_list),
        })
    }

    /// Probes `base_url` and records its sets and metadata properties on the registration.
    pub async fn save_oai_info(
        &self,
        provider_long_name: &str,
        base_url: &str,
        reg_id: i64,
    ) -> Result<SaveOutcome> {
        Ok(self.probe_and_save(provider_long_name, base_url, reg_id).await?.0)
    }

    async fn probe_and_save(
        &self,
        provider_long_name: &str,
        base_url: &str,
        reg_id: i64,
    ) -> Result<(SaveOutcome, Option<IdentifyInfo>)> {
        let identify = match self.oai.identify(base_url).await {
            Ok(info) => info,
            Err(e) => {
                warn!("Identify failed for {}: {}", base_url, e);
                return Ok((SaveOutcome::failed(XML_NOT_VALID), None));
            }
        };

        let Some(mut registration) = self.store.get_registration(reg_id).await? else {
            return Ok((SaveOutcome::failed(REGISTRATION_NOT_FOUND), Some(identify)));
        };

        let sets = self.oai.list_sets(base_url).await.unwrap_or_else(|e| {
            warn!("ListSets failed for {}: {}", base_url, e);
            Vec::new()
        });

        let from = (Utc::now() - Duration::days(self.property_lookback_days)).date_naive();
        let properties = self
            .oai
            .sample_properties(base_url, from)
            .await
            .unwrap_or_else(|e| {
                warn!("Property sampling failed for {}: {}", base_url, e);
                BTreeSet::new()
            });

        registration.provider_long_name = provider_long_name.to_string();
        registration.base_url = base_url.to_string();
        registration.oai_provider = true;
        registration.approved_sets = serialize_oai_sets(&sets);
        registration.property_list = serialize_properties(properties.iter().map(String::as_str));
        registration.registration_date = Utc::now();
        self.store.save_registration(&registration).await?;

        info!(
            "Saved OAI provider '{}' ({} sets, {} properties)",
            provider_long_name,
            sets.len(),
            properties.len()
        );
        Ok((SaveOutcome::saved(provider_long_name), Some(identify)))
    }

    /// Records a non-OAI provider on the registration.
    pub async fn save_other_info(
        &self,
        provider_long_name: &str,
        base_url: &str,
        reg_id: i64,
    ) -> Result<SaveOutcome> {
        let Some(mut registration) = self.store.get_registration(reg_id).await? else {
            return Ok(SaveOutcome::failed(REGISTRATION_NOT_FOUND));
        };

        apply_other(&mut registration, provider_long_name, base_url);
        self.store.save_registration(&registration).await?;

        info!("Saved provider '{}'", provider_long_name);
        Ok(SaveOutcome::saved(provider_long_name))
    }

    /// Final OAI step. Approved sets keep their full spec as advertised.
    pub async fn finish_oai(&self, reg_id: i64, form: &OaiProviderForm) -> Result<RegistrationInfo> {
        let mut registration = self.load(reg_id).await?;
        let fields = form
            .clean(&format_set_choices(&registration), &self.valid_oai)
            .await?;

        let approved: Vec<(String, String)> = parse_sets(&registration.approved_sets)
            .into_iter()
            .filter(|(spec, _)| fields.approved.contains(short_spec(spec)))
            .collect();

        registration.provider_long_name = fields.provider_long_name;
        registration.base_url = fields.base_url;
        registration.oai_provider = true;
        registration.approved_sets =
            serialize_sets(approved.iter().map(|(s, n)| (s.as_str(), n.as_str())));
        registration.property_list =
            serialize_properties(fields.properties.iter().map(String::as_str));
        registration.registration_date = Utc::now();
        self.store.save_registration(&registration).await?;

        info!(
            "Registration {} complete: OAI provider '{}' with {} approved set(s)",
            reg_id,
            registration.provider_long_name,
            approved.len()
        );
        Ok(registration)
    }

    pub async fn finish_other(
        &self,
        reg_id: i64,
        form: &OtherProviderForm,
    ) -> Result<RegistrationInfo> {
        let fields = form.clean()?;
        let mut registration = self.load(reg_id).await?;

        apply_other(&mut registration, &fields.provider_long_name, &fields.base_url);
        registration.property_list =
            serialize_properties(fields.properties.iter().map(String::as_str));
        self.store.save_registration(&registration).await?;

        info!(
            "Registration {} complete: provider '{}'",
            reg_id, registration.provider_long_name
        );
        Ok(registration)
    }

    /// The first `limit` registrations by registration date, earliest first.
    pub async fn latest(&self, limit: usize) -> Result<Vec<RegistrationInfo>> {
        self.store
            .list_registrations(&RegistrationFilter {
                limit: Some(limit),
                ..Default::default()
            })
            .await
    }

    pub async fn detail(&self, provider_long_name: &str) -> Result<RegistrationInfo> {
        self.store
            .find_registration_by_name(provider_long_name)
            .await?
            .ok_or_else(|| RegistryError::ProviderNotFound {
                name: provider_long_name.to_string(),
            })
    }
}

fn apply_other(registration: &mut RegistrationInfo, provider_long_name: &str, base_url: &str) {
    registration.provider_long_name = provider_long_name.to_string();
    registration.base_url = base_url.to_string();
    registration.oai_provider = false;
    registration.registration_date = Utc::now();
}
