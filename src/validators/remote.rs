use super::{
    valid_url, ValidationError, DOI_DOES_NOT_RESOLVE, INVALID_OAI_URL, URL_DOES_NOT_RESOLVE,
};
use crate::oai::OaiClient;
use reqwest::Client;
use tracing::{debug, info};

/// Passes when a GET on the URL ends in a 2xx or 3xx response (redirects followed).
#[derive(Clone)]
pub struct UrlResolves {
    http: Client,
}

impl UrlResolves {
    pub fn new(http: Client) -> Self {
        Self { http }
    }

    pub async fn validate(&self, url: &str) -> Result<(), ValidationError> {
        let parsed = valid_url(url)?;

        match self.http.get(parsed).send().await {
            Ok(response)
                if response.status().is_success() || response.status().is_redirection() =>
            {
                debug!("{} resolved with {}", url, response.status());
                Ok(())
            }
            Ok(response) => {
                info!("{} does not resolve: HTTP {}", url, response.status());
                Err(ValidationError::new(URL_DOES_NOT_RESOLVE))
            }
            Err(e) => {
                info!("{} does not resolve: {}", url, e);
                Err(ValidationError::new(URL_DOES_NOT_RESOLVE))
            }
        }
    }
}

/// Passes when `url?verb=Identify` returns a well-formed OAI-PMH Identify response.
#[derive(Clone)]
pub struct ValidOaiUrl {
    oai: OaiClient,
}

impl ValidOaiUrl {
    pub fn new(oai: OaiClient) -> Self {
        Self { oai }
    }

    pub async fn validate(&self, url: &str) -> Result<(), ValidationError> {
        valid_url(url)?;

        self.oai.identify(url.trim()).await.map(|_| ()).map_err(|e| {
            info!("{} is not a valid OAI-PMH endpoint: {}", url, e);
            ValidationError::new(INVALID_OAI_URL)
        })
    }
}

/// Passes when the DOI resolver answers the DOI with a 2xx response.
#[derive(Clone)]
pub struct DoiResolves {
    http: Client,
    resolver: String,
}

impl DoiResolves {
    pub fn new(http: Client, resolver: &str) -> Self {
        let resolver = if resolver.ends_with('/') {
            resolver.to_string()
        } else {
            format!("{}/", resolver)
        };
        Self { http, resolver }
    }

    fn resolver_url(&self, doi: &str) -> String {
        let doi = doi.trim();
        let doi = doi
            .strip_prefix("doi:")
            .or_else(|| doi.strip_prefix("DOI:"))
            .unwrap_or(doi);
        format!("{}{}", self.resolver, doi.trim_start_matches('/'))
    }

    pub async fn validate(&self, doi: &str) -> Result<(), ValidationError> {
        let target = self.resolver_url(doi);

        match self.http.get(&target).send().await {
            Ok(response) if response.status().is_success() => Ok(()),
            Ok(response) => {
                info!("DOI {} did not resolve: HTTP {}", doi, response.status());
                Err(ValidationError::new(DOI_DOES_NOT_RESOLVE))
            }
            Err(e) => {
                info!("DOI {} did not resolve: {}", doi, e);
                Err(ValidationError::new(DOI_DOES_NOT_RESOLVE))
            }
        }
    }
}
