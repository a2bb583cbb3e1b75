//! Pushed record input and validation
//!
//! Field checks run first; the DOI resolver is only consulted once every field
//! passes, and its failure is reported under `non_field_errors`.

use crate::models::PushedFields;
use crate::validators::{required, valid_url, DoiResolves, ValidationErrors, NON_FIELD_ERRORS};
use serde::Deserialize;

/// A record as submitted. Every field is optional so that absence can be
/// reported per field, and so that PATCH can leave fields untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushedDataInput {
    /// Only meaningful in bulk updates.
    pub id: Option<i64>,
    pub url: Option<String>,
    pub doi: Option<String>,
    pub tags: Option<String>,
    pub title: Option<String>,
    #[serde(rename = "serviceID")]
    pub service_id: Option<String>,
    pub description: Option<String>,
    pub contributors: Option<String>,
}

impl PushedDataInput {
    /// Validates a full record, or with `existing` a partial one whose
    /// missing fields keep their stored values.
    pub async fn clean(
        &self,
        existing: Option<&PushedFields>,
        doi_resolves: &DoiResolves,
    ) -> Result<PushedFields, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        // Present value, else the stored one when patching
        let pick = |value: &Option<String>, stored: fn(&PushedFields) -> &String| -> Option<String> {
            match (value, existing) {
                (Some(v), _) => Some(v.clone()),
                (None, Some(fields)) => Some(stored(fields).clone()),
                (None, None) => None,
            }
        };

        let url = errors
            .check("url", required(pick(&self.url, |f| &f.url).as_deref()))
            .and_then(|url| errors.check("url", valid_url(&url)).map(|_| url));
        let doi = errors.check("doi", required(pick(&self.doi, |f| &f.doi).as_deref()));
        let title = errors.check("title", required(pick(&self.title, |f| &f.title).as_deref()));
        let service_id = errors.check(
            "serviceID",
            required(pick(&self.service_id, |f| &f.service_id).as_deref()),
        );
        let contributors = errors.check(
            "contributors",
            required(pick(&self.contributors, |f| &f.contributors).as_deref()),
        );
        let tags = pick(&self.tags, |f| &f.tags).unwrap_or_default();
        let description = pick(&self.description, |f| &f.description).unwrap_or_default();

        let (Some(url), Some(doi), Some(title), Some(service_id), Some(contributors)) =
            (url, doi, title, service_id, contributors)
        else {
            return Err(errors);
        };

        // An untouched DOI was already checked when it was stored
        let doi_changed = existing.map_or(true, |fields| fields.doi != doi);
        if doi_changed {
            if let Err(e) = doi_resolves.validate(&doi).await {
                errors.add(NON_FIELD_ERRORS, e.0);
                return Err(errors);
            }
        }

        Ok(PushedFields {
            url,
            doi,
            tags: tags.trim().to_string(),
            title,
            service_id,
            description: description.trim().to_string(),
            contributors,
        })
    }
}
