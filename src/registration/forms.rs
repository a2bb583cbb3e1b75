//! Wizard step forms
//!
//! Each form deserializes from the request body with every field optional so
//! that a missing field is reported as `This field is required.` rather than
//! rejected by the JSON extractor.

use crate::models::NewRegistration;
use crate::sets::{parse_properties, short_spec};
use crate::validators::{
    max_length, required, valid_choices, valid_email, valid_url, UrlResolves, ValidOaiUrl,
    ValidationErrors,
};
use serde::Deserialize;
use std::collections::BTreeSet;

pub const NAME_MAX: usize = 100;
pub const SHORT_NAME_MAX: usize = 50;
pub const BASE_URL_MAX: usize = 100;
pub const LICENSE_MAX: usize = 100;

/// Required text with a length cap; records any failure against `field`.
fn required_text(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    max: Option<usize>,
) -> Option<String> {
    let value = errors.check(field, required(value))?;
    if let Some(max) = max {
        errors.check(field, max_length(&value, max))?;
    }
    Some(value)
}

#[derive(Debug, Default, Deserialize)]
pub struct ContactInfoForm {
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
}

impl ContactInfoForm {
    pub fn clean(&self) -> Result<NewRegistration, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let contact_name = required_text(
            &mut errors,
            "contact_name",
            self.contact_name.as_deref(),
            Some(NAME_MAX),
        );
        let contact_email = required_text(&mut errors, "contact_email", self.contact_email.as_deref(), None)
            .and_then(|email| errors.check("contact_email", valid_email(&email)).map(|_| email));

        match (contact_name, contact_email) {
            (Some(contact_name), Some(contact_email)) if errors.is_empty() => Ok(NewRegistration {
                contact_name,
                contact_email,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MetadataQuestionsForm {
    #[serde(default)]
    pub meta_tos: bool,
    #[serde(default)]
    pub meta_privacy: bool,
    #[serde(default)]
    pub meta_sharing_tos: bool,
    pub meta_license: Option<String>,
    #[serde(default)]
    pub meta_license_extended: bool,
    #[serde(default)]
    pub meta_future_license: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataAnswers {
    pub meta_tos: bool,
    pub meta_privacy: bool,
    pub meta_sharing_tos: bool,
    pub meta_license: String,
    pub meta_license_extended: bool,
    pub meta_future_license: bool,
}

impl MetadataQuestionsForm {
    pub fn clean(&self) -> Result<MetadataAnswers, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let meta_license = required_text(
            &mut errors,
            "meta_license",
            self.meta_license.as_deref(),
            Some(LICENSE_MAX),
        );

        match meta_license {
            Some(meta_license) => Ok(MetadataAnswers {
                meta_tos: self.meta_tos,
                meta_privacy: self.meta_privacy,
                meta_sharing_tos: self.meta_sharing_tos,
                meta_license,
                meta_license_extended: self.meta_license_extended,
                meta_future_license: self.meta_future_license,
            }),
            None => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct InitialProviderForm {
    pub provider_long_name: Option<String>,
    pub provider_short_name: Option<String>,
    pub base_url: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub oai_provider: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderBasics {
    pub provider_long_name: String,
    pub provider_short_name: String,
    pub base_url: String,
    pub description: String,
    pub oai_provider: bool,
}

impl InitialProviderForm {
    /// Field checks first; the reachability probe only runs on a syntactically valid URL.
    pub async fn clean(&self, url_resolves: &UrlResolves) -> Result<ProviderBasics, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let provider_long_name = required_text(
            &mut errors,
            "provider_long_name",
            self.provider_long_name.as_deref(),
            Some(NAME_MAX),
        );
        let description = required_text(&mut errors, "description", self.description.as_deref(), None);

        let provider_short_name = self
            .provider_short_name
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        errors.check("provider_short_name", max_length(&provider_short_name, SHORT_NAME_MAX));

        let base_url = required_text(&mut errors, "base_url", self.base_url.as_deref(), Some(BASE_URL_MAX));
        if let Some(url) = &base_url {
            errors.check("base_url", url_resolves.validate(url).await);
        }

        match (provider_long_name, description, base_url) {
            (Some(provider_long_name), Some(description), Some(base_url)) if errors.is_empty() => {
                Ok(ProviderBasics {
                    provider_long_name,
                    provider_short_name,
                    base_url,
                    description,
                    oai_provider: self.oai_provider,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Property list as submitted: either a JSON array of names or one string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PropertyInput {
    List(Vec<String>),
    Text(String),
}

impl PropertyInput {
    pub fn names(&self) -> Vec<String> {
        match self {
            PropertyInput::List(items) => parse_properties(&items.join(",")),
            PropertyInput::Text(text) => parse_properties(text),
        }
    }
}

fn required_properties(errors: &mut ValidationErrors, input: Option<&PropertyInput>) -> Option<Vec<String>> {
    let names = input.map(PropertyInput::names).unwrap_or_default();
    if names.is_empty() {
        errors.add("property_list", crate::validators::FIELD_REQUIRED);
        return None;
    }
    Some(names)
}

#[derive(Debug, Default, Deserialize)]
pub struct OaiProviderForm {
    pub provider_long_name: Option<String>,
    pub base_url: Option<String>,
    pub property_list: Option<PropertyInput>,
    #[serde(default)]
    pub approved_sets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OaiProviderFields {
    pub provider_long_name: String,
    pub base_url: String,
    pub properties: Vec<String>,
    /// Short set specs picked from the offered choices.
    pub approved: BTreeSet<String>,
}

impl OaiProviderForm {
    /// `base_url` must still answer Identify; the probe only runs on a syntactically valid URL.
    pub async fn clean(
        &self,
        choices: &BTreeSet<(String, String)>,
        valid_oai: &ValidOaiUrl,
    ) -> Result<OaiProviderFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let provider_long_name = required_text(
            &mut errors,
            "provider_long_name",
            self.provider_long_name.as_deref(),
            Some(NAME_MAX),
        );
        let mut base_url = required_text(&mut errors, "base_url", self.base_url.as_deref(), None)
            .and_then(|url| errors.check("base_url", valid_url(&url)).map(|_| url));
        if let Some(url) = &base_url {
            if errors.check("base_url", valid_oai.validate(url).await).is_none() {
                base_url = None;
            }
        }
        let properties = required_properties(&mut errors, self.property_list.as_ref());

        let approved = errors
            .check(
                "approved_sets",
                valid_choices(&self.approved_sets, |v| {
                    choices.iter().any(|(spec, _)| spec == short_spec(v))
                }),
            )
            .map(|picked| picked.iter().map(|v| short_spec(v).to_string()).collect());

        match (provider_long_name, base_url, properties, approved) {
            (Some(provider_long_name), Some(base_url), Some(properties), Some(approved))
                if errors.is_empty() =>
            {
                Ok(OaiProviderFields {
                    provider_long_name,
                    base_url,
                    properties,
                    approved,
                })
            }
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OtherProviderForm {
    pub provider_long_name: Option<String>,
    pub base_url: Option<String>,
    pub property_list: Option<PropertyInput>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtherProviderFields {
    pub provider_long_name: String,
    pub base_url: String,
    pub properties: Vec<String>,
}

impl OtherProviderForm {
    pub fn clean(&self) -> Result<OtherProviderFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let provider_long_name = required_text(
            &mut errors,
            "provider_long_name",
            self.provider_long_name.as_deref(),
            Some(NAME_MAX),
        );
        let base_url = required_text(&mut errors, "base_url", self.base_url.as_deref(), None)
            .and_then(|url| errors.check("base_url", valid_url(&url)).map(|_| url));
        let properties = required_properties(&mut errors, self.property_list.as_ref());

        match (provider_long_name, base_url, properties) {
            (Some(provider_long_name), Some(base_url), Some(properties)) if errors.is_empty() => {
                Ok(OtherProviderFields {
                    provider_long_name,
                    base_url,
                    properties,
                })
            }
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oai::OaiClient;
    use crate::validators::{
        FIELD_REQUIRED, INVALID_EMAIL, INVALID_OAI_URL, INVALID_URL, URL_DOES_NOT_RESOLVE,
    };
    use reqwest::Client;
    use wiremock::matchers::{method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn s(v: &str) -> Option<String> {
        Some(v.to_string())
    }

    #[test]
    fn test_contact_info_valid() {
        let form = ContactInfoForm {
            contact_name: s("BubbaRay Dudley"),
            contact_email: s("BullyRay@dudleyboyz.net"),
        };
        let new = form.clean().unwrap();
        assert_eq!(new.contact_name, "BubbaRay Dudley");
    }

    #[test]
    fn test_missing_contact_name() {
        let form = ContactInfoForm {
            contact_name: s(""),
            contact_email: s("BullyRay@dudleyboyz.net"),
        };
        let errors = form.clean().unwrap_err();
        assert_eq!(errors.get("contact_name").unwrap(), [FIELD_REQUIRED.to_string()]);
    }

    #[test]
    fn test_missing_and_malformed_contact_email() {
        let missing = ContactInfoForm {
            contact_name: s("Spike Dudley"),
            contact_email: s(""),
        };
        assert!(missing.clean().unwrap_err().has("contact_email"));

        let malformed = ContactInfoForm {
            contact_name: s("Spike Dudley"),
            contact_email: s("email"),
        };
        assert_eq!(
            malformed.clean().unwrap_err().get("contact_email").unwrap(),
            [INVALID_EMAIL.to_string()]
        );
    }

    #[test]
    fn test_metadata_questions_need_license() {
        let form = MetadataQuestionsForm {
            meta_tos: true,
            ..Default::default()
        };
        assert!(form.clean().unwrap_err().has("meta_license"));

        let form = MetadataQuestionsForm {
            meta_tos: true,
            meta_license: s("MIT"),
            ..Default::default()
        };
        let answers = form.clean().unwrap();
        assert!(answers.meta_tos);
        assert!(!answers.meta_privacy);
        assert_eq!(answers.meta_license, "MIT");
    }

    async fn reachable() -> (MockServer, UrlResolves) {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;
        (mock, UrlResolves::new(Client::new()))
    }

    #[tokio::test]
    async fn test_initial_provider_valid() {
        let (mock, url_resolves) = reachable().await;
        let form = InitialProviderForm {
            provider_long_name: s("Devon - Get the Tables"),
            base_url: Some(mock.uri()),
            description: s("A description"),
            ..Default::default()
        };
        let basics = form.clean(&url_resolves).await.unwrap();
        assert!(!basics.oai_provider);
        assert_eq!(basics.provider_short_name, "");
    }

    #[tokio::test]
    async fn test_initial_provider_missing_name() {
        let (mock, url_resolves) = reachable().await;
        let form = InitialProviderForm {
            provider_long_name: s(""),
            base_url: Some(mock.uri()),
            description: s("A description"),
            oai_provider: true,
            ..Default::default()
        };
        assert!(form.clean(&url_resolves).await.unwrap_err().has("provider_long_name"));
    }

    #[tokio::test]
    async fn test_initial_provider_malformed_url() {
        let url_resolves = UrlResolves::new(Client::new());
        let form = InitialProviderForm {
            provider_long_name: s("Devon - Get the Tables"),
            base_url: s("DEVONGETTHETABLLESSSSSS"),
            description: s("A description"),
            ..Default::default()
        };
        let errors = form.clean(&url_resolves).await.unwrap_err();
        assert_eq!(errors.get("base_url").unwrap(), [INVALID_URL.to_string()]);
    }

    #[tokio::test]
    async fn test_initial_provider_unreachable_url() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock)
            .await;
        let form = InitialProviderForm {
            provider_long_name: s("Devon - Get the Tables"),
            base_url: Some(mock.uri()),
            description: s("A description"),
            ..Default::default()
        };
        let errors = form.clean(&UrlResolves::new(Client::new())).await.unwrap_err();
        assert_eq!(errors.get("base_url").unwrap(), [URL_DOES_NOT_RESOLVE.to_string()]);
    }

    #[tokio::test]
    async fn test_initial_provider_base_url_too_long() {
        let url_resolves = UrlResolves::new(Client::new());
        let form = InitialProviderForm {
            provider_long_name: s("Long"),
            base_url: Some(format!("http://example.org/{}", "a".repeat(100))),
            description: s("A description"),
            ..Default::default()
        };
        let errors = form.clean(&url_resolves).await.unwrap_err();
        assert!(errors.get("base_url").unwrap()[0].starts_with("Ensure this field has at most 100"));
    }

    fn choices() -> BTreeSet<(String, String)> {
        [("totally".to_string(), "approved".to_string())].into_iter().collect()
    }

    const IDENTIFY: &str = r#"<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <Identify>
    <repositoryName>St. Cloud State</repositoryName>
    <baseURL>http://repository.stcloudstate.edu/do/oai/</baseURL>
    <protocolVersion>2.0</protocolVersion>
  </Identify>
</OAI-PMH>"#;

    async fn oai_endpoint() -> (MockServer, ValidOaiUrl) {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "Identify"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(IDENTIFY, "text/xml"))
            .mount(&mock)
            .await;
        (mock, ValidOaiUrl::new(OaiClient::new(Client::new(), 1)))
    }

    #[tokio::test]
    async fn test_oai_provider_form_valid() {
        let (mock, valid_oai) = oai_endpoint().await;
        let form = OaiProviderForm {
            provider_long_name: s("SuperCena"),
            base_url: Some(mock.uri()),
            property_list: Some(PropertyInput::Text("some, properties".to_string())),
            approved_sets: vec!["totally".to_string()],
        };
        let fields = form.clean(&choices(), &valid_oai).await.unwrap();
        assert_eq!(fields.properties, vec!["some", "properties"]);
        assert!(fields.approved.contains("totally"));
    }

    #[tokio::test]
    async fn test_oai_provider_form_rejects_unknown_set() {
        let (mock, valid_oai) = oai_endpoint().await;
        let form = OaiProviderForm {
            provider_long_name: s("SuperCena"),
            base_url: Some(mock.uri()),
            property_list: Some(PropertyInput::List(vec!["title".to_string()])),
            approved_sets: vec!["nope".to_string()],
        };
        let errors = form.clean(&choices(), &valid_oai).await.unwrap_err();
        assert_eq!(
            errors.get("approved_sets").unwrap(),
            ["Select a valid choice. nope is not one of the available choices.".to_string()]
        );
        assert!(!errors.has("property_list"));
    }

    #[tokio::test]
    async fn test_oai_provider_form_requires_sets_and_properties() {
        let (mock, valid_oai) = oai_endpoint().await;
        let form = OaiProviderForm {
            provider_long_name: s("SuperCena"),
            base_url: Some(mock.uri()),
            ..Default::default()
        };
        let errors = form.clean(&choices(), &valid_oai).await.unwrap_err();
        assert_eq!(errors.get("approved_sets").unwrap(), [FIELD_REQUIRED.to_string()]);
        assert!(errors.has("property_list"));
    }

    #[tokio::test]
    async fn test_oai_provider_form_rejects_non_oai_url() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&mock)
            .await;
        let form = OaiProviderForm {
            provider_long_name: s("SuperCena"),
            base_url: Some(mock.uri()),
            property_list: Some(PropertyInput::Text("title".to_string())),
            approved_sets: vec!["totally".to_string()],
        };
        let valid_oai = ValidOaiUrl::new(OaiClient::new(Client::new(), 1));
        let errors = form.clean(&choices(), &valid_oai).await.unwrap_err();
        assert_eq!(errors.get("base_url").unwrap(), [INVALID_OAI_URL.to_string()]);
    }

    #[test]
    fn test_other_provider_form() {
        let form = OtherProviderForm {
            provider_long_name: s("The COSMIC KEEEEEY"),
            base_url: s("http://wwe.com"),
            property_list: Some(PropertyInput::Text("['title', 'date']".to_string())),
        };
        assert_eq!(form.clean().unwrap().properties, vec!["title", "date"]);

        let bad = OtherProviderForm {
            provider_long_name: s("The COSMIC KEEEEEY"),
            base_url: s("wwe"),
            property_list: None,
        };
        let errors = bad.clean().unwrap_err();
        assert_eq!(errors.get("base_url").unwrap(), [INVALID_URL.to_string()]);
        assert!(errors.has("property_list"));
    }

    #[test]
    fn test_property_input_deserializes_both_forms() {
        let list: OtherProviderForm =
            serde_json::from_str(r#"{"property_list": ["a", "b"]}"#).unwrap();
        let text: OtherProviderForm = serde_json::from_str(r#"{"property_list": "a, b"}"#).unwrap();
        assert_eq!(list.property_list.unwrap().names(), text.property_list.unwrap().names());
    }
}
