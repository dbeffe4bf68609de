//! Outbound request construction.

use url::Url;

use crate::config::UpstreamConfig;
use crate::relay::error::RelayError;

/// The fixed query sent upstream for every inbound request.
///
/// Built fresh per request from configuration only; no inbound parameter
/// ever reaches it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    pub base_url: String,
    pub sorting: String,
    pub categories: String,
    pub purity: String,
    pub resolutions: String,
    pub api_key: Option<String>,
}

impl OutboundRequest {
    pub fn from_config(config: &UpstreamConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            sorting: config.sorting.clone(),
            categories: config.categories.clone(),
            purity: config.purity.clone(),
            resolutions: config.resolutions.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
        }
    }

    /// Final upstream URL. Any query already on the base URL is replaced.
    pub fn to_url(&self) -> Result<Url, RelayError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| RelayError::InvalidConfig(format!("{}: {}", self.base_url, e)))?;
        if url.cannot_be_a_base() {
            return Err(RelayError::InvalidConfig(format!(
                "{}: not a hierarchical URL",
                self.base_url
            )));
        }

        url.set_query(None);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("sorting", &self.sorting)
                .append_pair("categories", &self.categories)
                .append_pair("purity", &self.purity)
                .append_pair("resolutions", &self.resolutions);
            if let Some(key) = &self.api_key {
                query.append_pair("apikey", key);
            }
        }
        Ok(url)
    }

    /// URL safe for logs: the API key is masked.
    pub fn redacted_url(&self) -> String {
        let redacted = Self {
            api_key: self.api_key.as_ref().map(|_| "***".to_string()),
            ..self.clone()
        };
        match redacted.to_url() {
            Ok(url) => url.to_string(),
            Err(_) => self.base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(base_url: &str, api_key: Option<&str>) -> OutboundRequest {
        let config = UpstreamConfig {
            base_url: base_url.to_string(),
            api_key: api_key.map(str::to_string),
            ..UpstreamConfig::default()
        };
        OutboundRequest::from_config(&config)
    }

    #[test]
    fn test_fixed_query() {
        let url = request("https://images.example.com/img", None).to_url().unwrap();
        assert_eq!(
            url.as_str(),
            "https://images.example.com/img?sorting=random&categories=010&purity=101&resolutions=1920x1080"
        );
    }

    #[test]
    fn test_api_key_appended() {
        let url = request("https://images.example.com/img", Some("a b"))
            .to_url()
            .unwrap();
        assert!(url.as_str().ends_with("&apikey=a+b"));
    }

    #[test]
    fn test_empty_api_key_is_omitted() {
        let url = request("https://images.example.com/img", Some("")).to_url().unwrap();
        assert!(!url.as_str().contains("apikey"));
    }

    #[test]
    fn test_existing_query_is_replaced() {
        let url = request("https://images.example.com/img?purity=111&x=1", None)
            .to_url()
            .unwrap();
        assert_eq!(url.query_pairs().count(), 4);
        assert!(!url.as_str().contains("x=1"));
        assert!(url.as_str().contains("purity=101"));
    }

    #[test]
    fn test_malformed_base_url() {
        let err = request("::not a url", None).to_url().unwrap_err();
        assert!(matches!(err, RelayError::InvalidConfig(_)));

        let err = request("mailto:someone@example.com", None).to_url().unwrap_err();
        assert!(matches!(err, RelayError::InvalidConfig(_)));
    }

    #[test]
    fn test_redacted_url_masks_key() {
        let redacted = request("https://images.example.com/img", Some("secret")).redacted_url();
        assert!(!redacted.contains("secret"));
        assert!(redacted.contains("apikey=***") || redacted.contains("apikey=%2A%2A%2A"));
    }
}
