mod builder;

pub use builder::RepofetchBuilder;

use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use log::debug;
use tokio::{sync::watch, task::JoinHandle, time};

use crate::{
    azure::{url::is_azure_url, AzureClient},
    error::FetchError,
    git::GitClient,
    model::RepositoryOptions,
};

/// Contract shared by every repository backend.
#[async_trait]
pub trait RepoManager: Send + Sync {
    /// Materializes a snapshot of the requested ref at `destination`.
    async fn download(
        &self,
        destination: &Path,
        options: &RepositoryOptions,
    ) -> Result<(), FetchError>;

    /// Commit id the requested ref currently points at.
    async fn latest_commit_id(&self, options: &RepositoryOptions) -> Result<String, FetchError>;

    /// All refs of the repository.
    async fn list_refs(&self, options: &RepositoryOptions) -> Result<Vec<String>, FetchError>;

    /// All file paths at the requested ref, optionally filtered by
    /// extension.
    async fn list_files(&self, options: &RepositoryOptions) -> Result<Vec<String>, FetchError>;

    /// Drops every cached listing. Idempotent.
    fn purge_cache(&self);
}

/// Repository access service.
///
/// Holds one Azure DevOps REST backend and one generic git backend and
/// routes every operation to exactly one of them, decided purely by the
/// shape of the repository URL.
#[derive(Clone)]
pub struct Repofetch {
    azure: Arc<dyn RepoManager>,
    git: Arc<dyn RepoManager>,
    shutdown: watch::Sender<bool>,
}

impl Repofetch {
    pub fn builder() -> RepofetchBuilder {
        RepofetchBuilder::default()
    }

    pub(crate) fn new(azure: AzureClient, git: GitClient) -> Self {
        let (shutdown, _) = watch::channel(false);
        Repofetch {
            azure: Arc::new(azure),
            git: Arc::new(git),
            shutdown,
        }
    }

    /// Classification is pure string inspection; no network call is made to
    /// decide the route.
    fn backend(&self, repository_url: &str) -> &dyn RepoManager {
        if is_azure_url(repository_url) {
            self.azure.as_ref()
        } else {
            self.git.as_ref()
        }
    }

    /// Materializes a snapshot of the requested ref at `destination`: an
    /// extracted archive for Azure DevOps URLs, a checked-out clone for
    /// everything else.
    pub async fn clone_repository(
        &self,
        destination: impl AsRef<Path>,
        options: &RepositoryOptions,
    ) -> Result<(), FetchError> {
        self.backend(&options.repository_url)
            .download(destination.as_ref(), options)
            .await
    }

    pub async fn latest_commit_id(&self, options: &RepositoryOptions) -> Result<String, FetchError> {
        self.backend(&options.repository_url)
            .latest_commit_id(options)
            .await
    }

    pub async fn list_refs(&self, options: &RepositoryOptions) -> Result<Vec<String>, FetchError> {
        self.backend(&options.repository_url).list_refs(options).await
    }

    pub async fn list_files(&self, options: &RepositoryOptions) -> Result<Vec<String>, FetchError> {
        self.backend(&options.repository_url).list_files(options).await
    }

    /// Clears the caches of both backends.
    pub fn purge_cache(&self) {
        self.azure.purge_cache();
        self.git.purge_cache();
    }

    /// Spawns the periodic cache sweep: every `ttl` both backend caches are
    /// purged, until [`Repofetch::shutdown`] is called.
    ///
    /// Starting more than one sweep per service instance is the caller's
    /// responsibility to avoid.
    pub fn start_cache_clean_timer(&self, ttl: Duration) -> JoinHandle<()> {
        let service = self.clone();
        let mut shutdown = self.shutdown.subscribe();
        tokio::spawn(async move {
            if *shutdown.borrow() {
                return;
            }
            let mut ticker = time::interval(ttl);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        debug!("cache TTL expired, purging repository caches");
                        service.purge_cache();
                    }
                    _ = shutdown.changed() => {
                        debug!("shutdown signalled, stopping the cache sweep");
                        return;
                    }
                }
            }
        })
    }

    /// Stops the background cache sweep. Requests in flight are unaffected.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
