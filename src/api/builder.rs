use crate::{azure::AzureClient, error::FetchError, git::GitClient, Repofetch};

const DEFAULT_CACHE_SIZE: usize = 4;

/// Configures and constructs a [`Repofetch`] service.
///
/// Both backends get their own refs and files caches of the configured
/// sizes. A size of 0 disables that cache.
#[derive(Debug, Default)]
pub struct RepofetchBuilder {
    refs_cache_size: Option<usize>,
    files_cache_size: Option<usize>,
}

impl RepofetchBuilder {
    /// Capacity of the refs caches.
    ///
    /// Defaults to a small per-backend cache.
    pub fn refs_cache_size(mut self, size: usize) -> Self {
        self.refs_cache_size = Some(size);
        self
    }

    /// Capacity of the file-listing caches.
    pub fn files_cache_size(mut self, size: usize) -> Self {
        self.files_cache_size = Some(size);
        self
    }

    /// Disables caching entirely: every listing goes to the remote.
    pub fn without_caching(self) -> Self {
        self.refs_cache_size(0).files_cache_size(0)
    }

    pub fn try_build(self) -> Result<Repofetch, FetchError> {
        let refs_cache_size = self.refs_cache_size.unwrap_or(DEFAULT_CACHE_SIZE);
        let files_cache_size = self.files_cache_size.unwrap_or(DEFAULT_CACHE_SIZE);

        let azure = AzureClient::new(refs_cache_size, files_cache_size)?;
        let git = GitClient::new(refs_cache_size, files_cache_size);
        Ok(Repofetch::new(azure, git))
    }
}

#[cfg(test)]
mod tests {
    use crate::Repofetch;

    #[test]
    fn builds_with_defaults() {
        assert!(Repofetch::builder().try_build().is_ok());
    }

    #[test]
    fn builds_without_caching() {
        assert!(Repofetch::builder().without_caching().try_build().is_ok());
    }
}
