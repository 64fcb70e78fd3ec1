use std::{
    collections::BTreeSet,
    num::NonZeroUsize,
    sync::{Arc, Mutex},
};

use log::debug;
use lru::LruCache;

use crate::model::RepositoryOptions;

/// Identity of a cached ref listing.
///
/// The raw URL string is part of the key, case preserved: two URLs that
/// differ only in casing are distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RefsCacheKey {
    repository_url: String,
    reference_name: String,
}

impl RefsCacheKey {
    pub(crate) fn from_options(options: &RepositoryOptions) -> Self {
        RefsCacheKey {
            repository_url: options.repository_url.clone(),
            reference_name: options.reference().to_string(),
        }
    }
}

/// Identity of a cached file listing. The extension filter is an ordered
/// set, so logically identical filters always collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FilesCacheKey {
    repository_url: String,
    reference_name: String,
    extensions: BTreeSet<String>,
}

impl FilesCacheKey {
    pub(crate) fn from_options(options: &RepositoryOptions) -> Self {
        FilesCacheKey {
            repository_url: options.repository_url.clone(),
            reference_name: options.reference().to_string(),
            extensions: options.extensions.clone(),
        }
    }
}

/// Two bounded LRU stores (ref listings, file listings) behind one cheaply
/// clonable handle.
///
/// A store constructed with size 0 is disabled: gets always miss and puts
/// are dropped. Entries are evicted by LRU overflow or by a full purge,
/// never individually. A poisoned lock degrades to a miss so a cache fault
/// can never fail a request.
#[derive(Clone, Default)]
pub(crate) struct RepoCache {
    inner: Arc<Stores>,
}

#[derive(Default)]
struct Stores {
    refs: Option<Mutex<LruCache<RefsCacheKey, Vec<String>>>>,
    files: Option<Mutex<LruCache<FilesCacheKey, Vec<String>>>>,
}

impl RepoCache {
    pub(crate) fn new(refs_size: usize, files_size: usize) -> Self {
        RepoCache {
            inner: Arc::new(Stores {
                refs: NonZeroUsize::new(refs_size).map(|size| Mutex::new(LruCache::new(size))),
                files: NonZeroUsize::new(files_size).map(|size| Mutex::new(LruCache::new(size))),
            }),
        }
    }

    pub(crate) fn get_refs(&self, key: &RefsCacheKey) -> Option<Vec<String>> {
        let store = self.inner.refs.as_ref()?;
        store.lock().ok()?.get(key).cloned()
    }

    pub(crate) fn put_refs(&self, key: RefsCacheKey, refs: Vec<String>) {
        if let Some(store) = &self.inner.refs {
            if let Ok(mut store) = store.lock() {
                store.put(key, refs);
            }
        }
    }

    pub(crate) fn get_files(&self, key: &FilesCacheKey) -> Option<Vec<String>> {
        let store = self.inner.files.as_ref()?;
        store.lock().ok()?.get(key).cloned()
    }

    pub(crate) fn put_files(&self, key: FilesCacheKey, files: Vec<String>) {
        if let Some(store) = &self.inner.files {
            if let Ok(mut store) = store.lock() {
                store.put(key, files);
            }
        }
    }

    /// Clears both stores. Safe to call at any time, including when empty.
    pub(crate) fn purge(&self) {
        debug!("purging repository caches");
        if let Some(store) = &self.inner.refs {
            if let Ok(mut store) = store.lock() {
                store.clear();
            }
        }
        if let Some(store) = &self.inner.files {
            if let Ok(mut store) = store.lock() {
                store.clear();
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn refs_len(&self) -> usize {
        match &self.inner.refs {
            Some(store) => store.lock().map(|store| store.len()).unwrap_or(0),
            None => 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn files_len(&self) -> usize {
        match &self.inner.files {
            Some(store) => store.lock().map(|store| store.len()).unwrap_or(0),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn refs_key(url: &str) -> RefsCacheKey {
        RefsCacheKey::from_options(&RepositoryOptions::new(url))
    }

    #[test]
    fn put_then_get_round_trips() {
        let cache = RepoCache::new(2, 2);
        let refs = vec!["refs/heads/main".to_string()];
        cache.put_refs(refs_key("https://example.com/a"), refs.clone());
        assert_eq!(cache.get_refs(&refs_key("https://example.com/a")), Some(refs));
        assert_eq!(cache.get_refs(&refs_key("https://example.com/b")), None);
    }

    #[test]
    fn urls_differing_in_case_are_distinct_entries() {
        let cache = RepoCache::new(2, 2);
        cache.put_refs(refs_key("https://example.com/Repo"), vec![]);
        assert_eq!(cache.get_refs(&refs_key("https://example.com/repo")), None);
    }

    #[test]
    fn capacity_overflow_evicts_least_recently_used() {
        let cache = RepoCache::new(2, 2);
        cache.put_refs(refs_key("a"), vec!["1".to_string()]);
        cache.put_refs(refs_key("b"), vec!["2".to_string()]);
        // Touch "a" so that "b" becomes the eviction candidate.
        assert!(cache.get_refs(&refs_key("a")).is_some());
        cache.put_refs(refs_key("c"), vec!["3".to_string()]);

        assert_eq!(cache.refs_len(), 2);
        assert!(cache.get_refs(&refs_key("a")).is_some());
        assert!(cache.get_refs(&refs_key("b")).is_none());
        assert!(cache.get_refs(&refs_key("c")).is_some());
    }

    #[test]
    fn purge_clears_both_stores_and_is_idempotent() {
        let cache = RepoCache::new(2, 2);
        cache.put_refs(refs_key("a"), vec![]);
        cache.put_files(
            FilesCacheKey::from_options(&RepositoryOptions::new("a")),
            vec![],
        );
        assert_eq!((cache.refs_len(), cache.files_len()), (1, 1));

        cache.purge();
        assert_eq!((cache.refs_len(), cache.files_len()), (0, 0));

        cache.purge();
        assert_eq!((cache.refs_len(), cache.files_len()), (0, 0));
    }

    #[test]
    fn disabled_cache_never_holds_anything() {
        let cache = RepoCache::new(0, 0);
        cache.put_refs(refs_key("a"), vec!["1".to_string()]);
        assert_eq!(cache.get_refs(&refs_key("a")), None);
        assert_eq!(cache.refs_len(), 0);
        cache.purge();
    }

    #[test]
    fn file_keys_with_different_filters_do_not_collide() {
        let cache = RepoCache::new(2, 2);
        let mut with_filter = RepositoryOptions::new("a");
        with_filter.extensions = BTreeSet::from(["yml".to_string()]);
        let unfiltered = RepositoryOptions::new("a");

        cache.put_files(
            FilesCacheKey::from_options(&with_filter),
            vec!["stack.yml".to_string()],
        );
        assert_eq!(
            cache.get_files(&FilesCacheKey::from_options(&unfiltered)),
            None
        );
    }
}
