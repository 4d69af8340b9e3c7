pub mod assets;
pub mod catalog;
pub mod client;
pub mod config;
pub mod content;
pub mod loader;
pub mod playback;
pub mod queries;
pub mod storage;

// --- Library API for embedding ---

/// Convenience re-exports for embedders.
pub mod prelude {
    pub use crate::assets::{AssetReference, AssetUrlResolver, ImageAsset, ImageUrlBuilder, ResolvedUrl, Unresolvable};
    pub use crate::config::{Config, ResolverConfig};
    pub use crate::content::{Project, Service, ServiceRef};
    pub use crate::loader::LoadState;
    pub use crate::playback::{FaultCode, MediaFault, MediaRecord, PlaybackController, PlaybackError, PlaybackState, Presentation};
    pub use crate::{Portfolio, Webnexter};
}

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

use crate::assets::{AssetReference, AssetUrlResolver, ResolvedUrl};
use crate::client::{ContentClient, ContentSource};
use crate::config::Config;
use crate::content::{Project, Service, ServiceRef};
use crate::loader::{cache_key, Loader};
use crate::playback::{resolve_ticket, MediaRecord, PlaybackController};
use crate::storage::MemoryStorage;

/// Data behind the portfolio listing: every service, the one selected by the
/// `?service=` parameter (if any), and the projects it selects.
#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub services: Vec<Service>,
    pub selected: Option<ServiceRef>,
    pub projects: Vec<Project>,
}

/// Async library entry point. Owns configuration, the content source, the query cache and
/// the asset resolver.
pub struct Webnexter {
    config: Config,
    source: Arc<dyn ContentSource>,
    loader: Loader<MemoryStorage>,
    resolver: AssetUrlResolver,
}

impl Webnexter {
    /// Build against the hosted content API described by `config`. Does no I/O.
    pub fn connect(config: Config) -> Result<Self> {
        let client = ContentClient::new(&config)?;
        Ok(Self::with_source(config, Arc::new(client)))
    }

    pub fn with_source(config: Config, source: Arc<dyn ContentSource>) -> Self {
        let loader = Loader::new(MemoryStorage::new(), config.query_ttl_secs);
        let resolver = AssetUrlResolver::new(config.resolver());
        Self { config, source, loader, resolver }
    }

    pub fn config(&self) -> &Config { &self.config }

    pub fn resolver(&self) -> &AssetUrlResolver { &self.resolver }

    async fn cached<T>(&self, scope: &str, groq: String, params: Vec<(&str, Value)>, refresh: bool) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let key = cache_key(scope, &groq, &params);
        self.loader
            .try_load(&key, refresh, || async {
                let value = self.source.query(&groq, &params).await?;
                serde_json::from_value(value).with_context(|| format!("decoding {scope} result"))
            })
            .await
    }

    /// All services in display order.
    pub async fn services(&self, refresh: bool) -> Result<Vec<Service>> {
        let mut services: Vec<Service> = self
            .cached::<Option<Vec<Service>>>("services", queries::services(), Vec::new(), refresh)
            .await?
            .unwrap_or_default();
        catalog::sort_services(&mut services);
        Ok(services)
    }

    pub async fn service(&self, slug: &str) -> Result<Option<Service>> {
        self.cached("service", queries::service_by_slug(), vec![("slug", Value::from(slug))], false).await
    }

    /// All projects, featured first then newest.
    pub async fn projects(&self, refresh: bool) -> Result<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .cached::<Option<Vec<Project>>>("projects", queries::projects(), Vec::new(), refresh)
            .await?
            .unwrap_or_default();
        catalog::sort_projects(&mut projects);
        Ok(projects)
    }

    pub async fn featured_projects(&self) -> Result<Vec<Project>> {
        Ok(self
            .cached::<Option<Vec<Project>>>("featured", queries::featured_projects(), Vec::new(), false)
            .await?
            .unwrap_or_default())
    }

    pub async fn projects_for_service(&self, service_id: &str) -> Result<Vec<Project>> {
        Ok(self
            .cached::<Option<Vec<Project>>>(
                "by-service",
                queries::projects_by_service(),
                vec![("serviceId", Value::from(service_id))],
                false,
            )
            .await?
            .unwrap_or_default())
    }

    pub async fn project(&self, slug: &str) -> Result<Option<Project>> {
        self.cached("project", queries::project_by_slug(), vec![("slug", Value::from(slug))], false).await
    }

    /// Up to three other projects in the same service.
    pub async fn related_projects(&self, project: &Project) -> Result<Vec<Project>> {
        let Some(service) = project.service.as_ref() else { return Ok(Vec::new()) };
        Ok(self
            .cached::<Option<Vec<Project>>>(
                "related",
                queries::related_projects(),
                vec![("serviceId", Value::from(service.id.as_str())), ("slug", Value::from(project.slug.current.as_str()))],
                false,
            )
            .await?
            .unwrap_or_default())
    }

    /// Services plus projects narrowed to the service named by `service_slug`.
    pub async fn portfolio(&self, service_slug: Option<&str>, refresh: bool) -> Result<Portfolio> {
        let (services, projects) = futures::try_join!(self.services(refresh), self.projects(refresh))?;
        let selected = catalog::select_service(&services, service_slug).map(ServiceRef::from);
        if service_slug.is_some() && selected.is_none() {
            tracing::warn!(slug = ?service_slug, "unknown service filter; showing all projects");
        }
        let projects = catalog::filter_by_service(&projects, selected.as_ref()).into_iter().cloned().collect();
        Ok(Portfolio { services, selected, projects })
    }

    pub fn resolve(&self, reference: Option<&AssetReference>) -> Option<ResolvedUrl> {
        self.resolver.resolve(reference)
    }

    /// A controller already driven through resolution of `record`.
    pub async fn player_for(&self, record: MediaRecord) -> PlaybackController {
        let mut controller = PlaybackController::new();
        let ticket = controller.load(record);
        let outcome = resolve_ticket(&self.resolver, &ticket).await;
        controller.apply(outcome);
        controller
    }

    /// Drop cached query results. Returns the number of entries removed.
    pub async fn clear_cache(&self, prefix: Option<&str>) -> Result<u64> {
        self.loader.invalidate(prefix).await
    }
}
