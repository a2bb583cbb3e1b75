use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A bibliographic record pushed by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedData {
    pub id: i64,
    pub url: String,
    pub doi: String,
    pub tags: String,
    pub title: String,
    pub service_id: String,
    pub description: String,
    pub contributors: String,
    pub date_updated: NaiveDate,
    pub source_id: i64,
}

/// Validated field values for a create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushedFields {
    pub url: String,
    pub doi: String,
    pub tags: String,
    pub title: String,
    pub service_id: String,
    pub description: String,
    pub contributors: String,
}

impl PushedData {
    pub fn fields(&self) -> PushedFields {
        PushedFields {
            url: self.url.clone(),
            doi: self.doi.clone(),
            tags: self.tags.clone(),
            title: self.title.clone(),
            service_id: self.service_id.clone(),
            description: self.description.clone(),
            contributors: self.contributors.clone(),
        }
    }

    pub fn apply(&mut self, fields: PushedFields, today: NaiveDate) {
        self.url = fields.url;
        self.doi = fields.doi;
        self.tags = fields.tags;
        self.title = fields.title;
        self.service_id = fields.service_id;
        self.description = fields.description;
        self.contributors = fields.contributors;
        self.date_updated = today;
    }
}

/// Wire representation; `source` is the owner's username.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushedDataView {
    pub id: i64,
    pub url: String,
    pub doi: String,
    pub tags: String,
    pub title: String,
    #[serde(rename = "serviceID")]
    pub service_id: String,
    pub description: String,
    pub contributors: String,
    #[serde(rename = "dateUpdated")]
    pub date_updated: NaiveDate,
    pub source: String,
}

impl PushedDataView {
    pub fn new(data: PushedData, source: String) -> Self {
        Self {
            id: data.id,
            url: data.url,
            doi: data.doi,
            tags: data.tags,
            title: data.title,
            service_id: data.service_id,
            description: data.description,
            contributors: data.contributors,
            date_updated: data.date_updated,
            source,
        }
    }
}
