use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PROVIDER_HOST: &str = "cdn.sanity.io";
pub const DEFAULT_PROJECT_ID: &str = "paoqp1wp";
pub const DEFAULT_DATASET: &str = "production";
pub const DEFAULT_API_VERSION: &str = "2025-04-05";

/// The subset of configuration the asset resolver needs. Passed explicitly so resolution
/// never reads process state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    pub provider_host: String,
    pub project_id: String,
    pub dataset: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            provider_host: DEFAULT_PROVIDER_HOST.to_string(),
            project_id: DEFAULT_PROJECT_ID.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
        }
    }
}

/// Process-wide settings: defaults, then `webnexter.toml`, then `WEBNEXTER_*` env vars.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub provider_host: String,
    pub project_id: String,
    pub dataset: String,
    pub api_version: String,
    /// Overrides the query endpoint (`https://<project>.api.sanity.io` by default).
    pub api_base: Option<String>,
    pub api_token: Option<String>,
    pub use_cdn: bool,
    pub query_ttl_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_host: DEFAULT_PROVIDER_HOST.to_string(),
            project_id: DEFAULT_PROJECT_ID.to_string(),
            dataset: DEFAULT_DATASET.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            api_base: None,
            api_token: None,
            use_cdn: false,
            query_ttl_secs: 60,
        }
    }
}

impl Config {
    /// Load from an explicit file, or the per-user config dir when `path` is None.
    /// A missing file is not an error; a malformed one is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => default_config_path(),
        };
        let mut cfg = match path {
            Some(p) if p.exists() => Self::from_file(&p)?,
            _ => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok());
        cfg.warn_on_fallbacks();
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing config: {}", path.display()))
    }

    /// Apply `WEBNEXTER_*` overrides. The lookup is injected so tests don't touch the real
    /// environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        if let Some(v) = get("WEBNEXTER_PROVIDER_HOST") { self.provider_host = v; }
        if let Some(v) = get("WEBNEXTER_PROJECT_ID") { self.project_id = v; }
        if let Some(v) = get("WEBNEXTER_DATASET") { self.dataset = v; }
        if let Some(v) = get("WEBNEXTER_API_VERSION") { self.api_version = v; }
        if let Some(v) = get("WEBNEXTER_API_BASE") { self.api_base = Some(v); }
        if let Some(v) = get("WEBNEXTER_API_TOKEN") { self.api_token = Some(v); }
        if let Some(v) = get("WEBNEXTER_USE_CDN") {
            self.use_cdn = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        if let Some(ttl) = get("WEBNEXTER_QUERY_TTL_SECS").and_then(|s| s.parse().ok()) {
            self.query_ttl_secs = ttl;
        }
    }

    fn warn_on_fallbacks(&self) {
        if self.project_id == DEFAULT_PROJECT_ID {
            tracing::warn!(project_id = %self.project_id, "using development fallback project id");
        }
        if self.dataset == DEFAULT_DATASET {
            tracing::debug!(dataset = %self.dataset, "using default dataset");
        }
        if self.api_token.is_none() {
            tracing::debug!("no API token configured; only published content is readable");
        }
    }

    pub fn resolver(&self) -> ResolverConfig {
        ResolverConfig {
            provider_host: self.provider_host.clone(),
            project_id: self.project_id.clone(),
            dataset: self.dataset.clone(),
        }
    }

    /// Copy safe to print: the token is replaced by a marker.
    pub fn redacted(&self) -> Self {
        let mut c = self.clone();
        if c.api_token.is_some() { c.api_token = Some("<redacted>".to_string()); }
        c
    }
}

fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("dev", "webnexter", "webnexter")?;
    Some(proj.config_dir().join("webnexter.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_dev_fallbacks() {
        let c = Config::default();
        assert_eq!(c.resolver(), ResolverConfig::default());
        assert_eq!(c.api_version, "2025-04-05");
        assert!(!c.use_cdn);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("webnexter.toml");
        std::fs::write(&path, "dataset = \"staging\"\nuse_cdn = true\n").unwrap();
        let c = Config::from_file(&path).unwrap();
        assert_eq!(c.dataset, "staging");
        assert!(c.use_cdn);
        assert_eq!(c.project_id, DEFAULT_PROJECT_ID);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("webnexter.toml");
        std::fs::write(&path, "dataset = [").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = [
            ("WEBNEXTER_PROJECT_ID", "abc"),
            ("WEBNEXTER_USE_CDN", "TRUE"),
            ("WEBNEXTER_QUERY_TTL_SECS", "5"),
            ("WEBNEXTER_DATASET", "  "),
        ]
        .into_iter()
        .collect();
        let mut c = Config::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.project_id, "abc");
        assert!(c.use_cdn);
        assert_eq!(c.query_ttl_secs, 5);
        assert_eq!(c.dataset, DEFAULT_DATASET);
    }

    #[test]
    fn redaction_hides_token() {
        let c = Config { api_token: Some("sk-secret".into()), ..Config::default() };
        assert_eq!(c.redacted().api_token.as_deref(), Some("<redacted>"));
        assert_eq!(Config::default().redacted().api_token, None);
    }
}
