//! OAI-PMH client
//!
//! Issues the handful of verbs the registration workflow needs against a
//! provider's base URL:
//!
//! - `Identify`: proves the URL speaks OAI-PMH
//! - `ListSets`: the set hierarchy offered for approval (follows resumption tokens)
//! - `ListRecords`: one page sampled to discover which metadata properties the provider uses

mod parse;

pub use parse::{parse_identify, parse_record_properties, parse_sets};

use chrono::NaiveDate;
use reqwest::Client;
use serde::Serialize;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, warn};

/// Metadata prefix sampled for property discovery.
pub const DEFAULT_METADATA_PREFIX: &str = "oai_dc";

#[derive(Debug, Error)]
pub enum OaiError {
    #[error("request to {url} failed: {cause}")]
    Request { url: String, cause: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("unexpected root element <{0}>")]
    UnexpectedRoot(String),

    #[error("missing <{0}> element")]
    MissingElement(&'static str),

    #[error("OAI-PMH error {code}: {message}")]
    Protocol { code: String, message: String },
}

impl OaiError {
    /// OAI-PMH error codes that mean "nothing here" rather than failure.
    fn is_empty_result(&self) -> bool {
        matches!(self, OaiError::Protocol { code, .. } if code == "noSetHierarchy" || code == "noRecordsMatch")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IdentifyInfo {
    pub repository_name: String,
    pub base_url: String,
    pub protocol_version: String,
    pub earliest_datestamp: Option<String>,
    pub deleted_record: Option<String>,
    pub granularity: Option<String>,
    pub admin_emails: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OaiSet {
    pub spec: String,
    pub name: String,
}

#[derive(Clone)]
pub struct OaiClient {
    http: Client,
    max_set_pages: usize,
}

impl OaiClient {
    pub fn new(http: Client, max_set_pages: usize) -> Self {
        Self {
            http,
            max_set_pages: max_set_pages.max(1),
        }
    }

    async fn fetch(&self, base_url: &str, params: &[(&str, &str)]) -> Result<String, OaiError> {
        let response = self
            .http
            .get(base_url)
            .query(params)
            .send()
            .await
            .map_err(|e| OaiError::Request {
                url: base_url.to_string(),
                cause: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OaiError::Status {
                url: base_url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| OaiError::Request {
            url: base_url.to_string(),
            cause: e.to_string(),
        })
    }

    pub async fn identify(&self, base_url: &str) -> Result<IdentifyInfo, OaiError> {
        let body = self.fetch(base_url, &[("verb", "Identify")]).await?;
        let info = parse_identify(&body)?;
        debug!(
            "Identify {} -> repository '{}' (protocol {})",
            base_url, info.repository_name, info.protocol_version
        );
        Ok(info)
    }

    /// All sets the provider advertises, following resumption tokens up to
    /// the configured page limit.
    pub async fn list_sets(&self, base_url: &str) -> Result<Vec<OaiSet>, OaiError> {
        let mut all = Vec::new();
        let mut token: Option<String> = None;

        for page in 0..self.max_set_pages {
            let body = match &token {
                Some(t) => {
                    self.fetch(base_url, &[("verb", "ListSets"), ("resumptionToken", t.as_str())])
                        .await?
                }
                None => self.fetch(base_url, &[("verb", "ListSets")]).await?,
            };

            let (sets, next) = match parse_sets(&body) {
                Ok(parsed) => parsed,
                Err(e) if e.is_empty_result() => (Vec::new(), None),
                Err(e) => return Err(e),
            };
            all.extend(sets);

            match next {
                Some(t) => token = Some(t),
                None => return Ok(all),
            }

            if page + 1 == self.max_set_pages {
                warn!(
                    "ListSets for {} still had a resumption token after {} pages, stopping",
                    base_url, self.max_set_pages
                );
            }
        }

        Ok(all)
    }

    /// Distinct metadata element names in the first `ListRecords` page
    /// harvested from `from`.
    pub async fn sample_properties(
        &self,
        base_url: &str,
        from: NaiveDate,
    ) -> Result<BTreeSet<String>, OaiError> {
        let from = from.format("%Y-%m-%d").to_string();
        let body = self
            .fetch(
                base_url,
                &[
                    ("verb", "ListRecords"),
                    ("metadataPrefix", DEFAULT_METADATA_PREFIX),
                    ("from", from.as_str()),
                ],
            )
            .await?;

        match parse_record_properties(&body) {
            Ok(properties) => Ok(properties),
            Err(e) if e.is_empty_result() => Ok(BTreeSet::new()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> OaiClient {
        OaiClient::new(Client::new(), 5)
    }

    fn xml(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/xml")
    }

    #[tokio::test]
    async fn test_identify_against_server() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/do/oai/"))
            .and(query_param("verb", "Identify"))
            .respond_with(xml(
                "<OAI-PMH><Identify><repositoryName>Mocked</repositoryName><protocolVersion>2.0</protocolVersion></Identify></OAI-PMH>",
            ))
            .mount(&mock)
            .await;

        let info = client()
            .identify(&format!("{}/do/oai/", mock.uri()))
            .await
            .unwrap();
        assert_eq!(info.repository_name, "Mocked");
        assert_eq!(info.protocol_version, "2.0");
    }

    #[tokio::test]
    async fn test_identify_404() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock)
            .await;

        let err = client().identify(&mock.uri()).await.unwrap_err();
        assert!(matches!(err, OaiError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_list_sets_follows_resumption_token() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListSets"))
            .and(query_param("resumptionToken", "next"))
            .respond_with(xml(
                "<OAI-PMH><ListSets><set><setSpec>b</setSpec><setName>B</setName></set></ListSets></OAI-PMH>",
            ))
            .with_priority(1)
            .mount(&mock)
            .await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListSets"))
            .respond_with(xml(
                "<OAI-PMH><ListSets><set><setSpec>a</setSpec><setName>A</setName></set><resumptionToken>next</resumptionToken></ListSets></OAI-PMH>",
            ))
            .with_priority(2)
            .mount(&mock)
            .await;

        let sets = client().list_sets(&mock.uri()).await.unwrap();
        let specs: Vec<&str> = sets.iter().map(|s| s.spec.as_str()).collect();
        assert_eq!(specs, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_list_sets_page_limit() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListSets"))
            .respond_with(xml(
                "<OAI-PMH><ListSets><set><setSpec>loop</setSpec><setName>Loop</setName></set><resumptionToken>again</resumptionToken></ListSets></OAI-PMH>",
            ))
            .expect(3)
            .mount(&mock)
            .await;

        let sets = OaiClient::new(Client::new(), 3)
            .list_sets(&mock.uri())
            .await
            .unwrap();
        assert_eq!(sets.len(), 3);
    }

    #[tokio::test]
    async fn test_no_set_hierarchy_is_empty() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListSets"))
            .respond_with(xml(
                r#"<OAI-PMH><error code="noSetHierarchy">This repository does not support sets</error></OAI-PMH>"#,
            ))
            .mount(&mock)
            .await;

        assert!(client().list_sets(&mock.uri()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sample_properties_sends_date_query() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("verb", "ListRecords"))
            .and(query_param("metadataPrefix", "oai_dc"))
            .and(query_param("from", "2015-01-03"))
            .respond_with(xml(
                "<OAI-PMH><ListRecords><record><metadata><dc><title>T</title><subject>S</subject></dc></metadata></record></ListRecords></OAI-PMH>",
            ))
            .mount(&mock)
            .await;

        let from = NaiveDate::from_ymd_opt(2015, 1, 3).unwrap();
        let properties = client().sample_properties(&mock.uri(), from).await.unwrap();
        assert!(properties.contains("title"));
        assert!(properties.contains("subject"));
    }

    #[tokio::test]
    async fn test_no_records_match_is_empty() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(xml(r#"<OAI-PMH><error code="noRecordsMatch"/></OAI-PMH>"#))
            .mount(&mock)
            .await;

        let from = NaiveDate::from_ymd_opt(2015, 1, 3).unwrap();
        assert!(client()
            .sample_properties(&mock.uri(), from)
            .await
            .unwrap()
            .is_empty());
    }
}
