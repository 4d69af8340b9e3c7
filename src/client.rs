use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::config::Config;

/// Anything that can answer a GROQ query with raw JSON.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn query(&self, groq: &str, params: &[(&str, Value)]) -> Result<Value>;
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    result: Value,
}

/// HTTP client for the hosted content API.
#[derive(Debug, Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    endpoint: Url,
    token: Option<String>,
}

impl ContentClient {
    pub fn new(config: &Config) -> Result<Self> {
        let base = match config.api_base.as_deref() {
            Some(b) => b.trim_end_matches('/').to_string(),
            None if config.use_cdn => format!("https://{}.apicdn.sanity.io", config.project_id),
            None => format!("https://{}.api.sanity.io", config.project_id),
        };
        let version = config.api_version.trim_start_matches('v');
        let endpoint = Url::parse(&format!("{base}/v{version}/data/query/{}", config.dataset))
            .with_context(|| format!("invalid content API base: {base}"))?;
        let http = reqwest::Client::builder().user_agent("webnexter/0.1").build()?;
        Ok(Self { http, endpoint, token: config.api_token.clone() })
    }

    pub fn endpoint(&self) -> &Url { &self.endpoint }

    /// Full request URL; parameters are JSON-encoded under `$name` keys.
    pub fn query_url(&self, groq: &str, params: &[(&str, Value)]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("query", groq);
            for (name, value) in params {
                pairs.append_pair(&format!("${name}"), &value.to_string());
            }
        }
        url
    }
}

#[async_trait]
impl ContentSource for ContentClient {
    async fn query(&self, groq: &str, params: &[(&str, Value)]) -> Result<Value> {
        let url = self.query_url(groq, params);
        tracing::info!(endpoint = %self.endpoint, params = params.len(), "content query");
        let mut req = self.http.get(url);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.context("sending content query")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow!("content API returned {status}: {body}"));
        }
        let parsed: QueryResponse = resp.json().await.context("reading content API response")?;
        Ok(parsed.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_follows_project_and_cdn_choice() {
        let cfg = Config::default();
        let c = ContentClient::new(&cfg).unwrap();
        assert_eq!(c.endpoint().as_str(), "https://paoqp1wp.api.sanity.io/v2025-04-05/data/query/production");

        let cdn = Config { use_cdn: true, api_version: "v2024-01-01".into(), ..Config::default() };
        let c = ContentClient::new(&cdn).unwrap();
        assert_eq!(c.endpoint().as_str(), "https://paoqp1wp.apicdn.sanity.io/v2024-01-01/data/query/production");
    }

    #[test]
    fn params_are_json_encoded() {
        let c = ContentClient::new(&Config::default()).unwrap();
        let url = c.query_url("*[slug.current == $slug][0]", &[("slug", Value::from("storefront"))]);
        let pairs: Vec<(String, String)> = url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert_eq!(pairs[0], ("query".to_string(), "*[slug.current == $slug][0]".to_string()));
        assert_eq!(pairs[1], ("$slug".to_string(), "\"storefront\"".to_string()));
    }

    #[test]
    fn bad_base_is_reported() {
        let cfg = Config { api_base: Some("not a url".into()), ..Config::default() };
        assert!(ContentClient::new(&cfg).is_err());
    }
}
