use std::path::Path;

use async_trait::async_trait;
use git2::{
    build::CheckoutBuilder, Cred, CredentialType, Direction, ErrorClass, ErrorCode, FetchOptions,
    ObjectType, Remote, RemoteCallbacks, Repository, TreeWalkMode, TreeWalkResult,
};
use log::{debug, trace};
use tokio::task;

use crate::{
    api::RepoManager,
    cache::{FilesCacheKey, RefsCacheKey, RepoCache},
    error::FetchError,
    model::{filter_by_extensions, RepositoryOptions},
};

/// Repository access over the git protocol, for every host that is not
/// recognized as an Azure DevOps URL.
///
/// libgit2 work is blocking, so each operation runs on the blocking thread
/// pool. Metadata queries go through ls-remote where possible; only
/// `list_files` needs an actual (scratch) clone.
#[derive(Clone)]
pub(crate) struct GitClient {
    cache: RepoCache,
}

impl GitClient {
    pub(crate) fn new(refs_cache_size: usize, files_cache_size: usize) -> Self {
        GitClient {
            cache: RepoCache::new(refs_cache_size, files_cache_size),
        }
    }

    #[cfg(test)]
    pub(crate) fn cache(&self) -> &RepoCache {
        &self.cache
    }

    async fn download(
        &self,
        destination: &Path,
        options: &RepositoryOptions,
    ) -> Result<(), FetchError> {
        let destination = destination.to_path_buf();
        let options = options.clone();
        task::spawn_blocking(move || clone_repository(&destination, &options)).await?
    }

    async fn latest_commit_id(&self, options: &RepositoryOptions) -> Result<String, FetchError> {
        let options = options.clone();
        task::spawn_blocking(move || resolve_latest_commit(&options)).await?
    }

    async fn list_refs(&self, options: &RepositoryOptions) -> Result<Vec<String>, FetchError> {
        let key = RefsCacheKey::from_options(options);
        if let Some(refs) = self.cache.get_refs(&key) {
            debug!("serving refs of {} from cache", options.repository_url);
            return Ok(refs);
        }

        let cloned = options.clone();
        let refs = task::spawn_blocking(move || list_remote_refs(&cloned)).await??;

        self.cache.put_refs(key, refs.clone());
        Ok(refs)
    }

    async fn list_files(&self, options: &RepositoryOptions) -> Result<Vec<String>, FetchError> {
        let key = FilesCacheKey::from_options(options);
        if let Some(files) = self.cache.get_files(&key) {
            debug!("serving files of {} from cache", options.repository_url);
            return Ok(files);
        }

        let cloned = options.clone();
        let files = task::spawn_blocking(move || list_tree_files(&cloned)).await??;

        self.cache.put_files(key, files.clone());
        Ok(files)
    }
}

#[async_trait]
impl RepoManager for GitClient {
    async fn download(
        &self,
        destination: &Path,
        options: &RepositoryOptions,
    ) -> Result<(), FetchError> {
        GitClient::download(self, destination, options).await
    }

    async fn latest_commit_id(&self, options: &RepositoryOptions) -> Result<String, FetchError> {
        GitClient::latest_commit_id(self, options).await
    }

    async fn list_refs(&self, options: &RepositoryOptions) -> Result<Vec<String>, FetchError> {
        GitClient::list_refs(self, options).await
    }

    async fn list_files(&self, options: &RepositoryOptions) -> Result<Vec<String>, FetchError> {
        GitClient::list_files(self, options).await
    }

    fn purge_cache(&self) {
        self.cache.purge();
    }
}

/// Fetches the requested ref (or the remote HEAD) into `destination` and
/// checks it out detached. `depth > 0` makes the fetch shallow.
fn clone_repository(destination: &Path, options: &RepositoryOptions) -> Result<(), FetchError> {
    let reference = match options.reference_name.as_deref() {
        Some(reference) if !reference.is_empty() => reference,
        _ => "HEAD",
    };
    debug!(
        "cloning {} at {} into {}",
        options.repository_url,
        reference,
        destination.display()
    );

    let repo = Repository::init(destination).map_err(classify_git_error)?;
    let mut remote = repo
        .remote("origin", &options.repository_url)
        .map_err(classify_git_error)?;
    remote
        .fetch(&[reference], Some(&mut fetch_options(options)), None)
        .map_err(classify_git_error)?;

    let fetch_head = repo
        .find_reference("FETCH_HEAD")
        .map_err(classify_git_error)?;
    let commit = fetch_head.peel_to_commit().map_err(classify_git_error)?;

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_tree(commit.as_object(), Some(&mut checkout))
        .map_err(classify_git_error)?;
    repo.set_head_detached(commit.id()).map_err(classify_git_error)
}

/// ls-remote listing as (full ref name, commit id) pairs.
fn remote_refs(options: &RepositoryOptions) -> Result<Vec<(String, String)>, FetchError> {
    let mut remote =
        Remote::create_detached(options.repository_url.as_str()).map_err(classify_git_error)?;
    let connection = remote
        .connect_auth(Direction::Fetch, Some(remote_callbacks(options)), None)
        .map_err(classify_git_error)?;

    let refs = connection
        .list()
        .map_err(classify_git_error)?
        .iter()
        .map(|head| (head.name().to_string(), head.oid().to_string()))
        .collect();
    Ok(refs)
}

fn list_remote_refs(options: &RepositoryOptions) -> Result<Vec<String>, FetchError> {
    let refs = remote_refs(options)?
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| name != "HEAD")
        .collect();
    Ok(refs)
}

/// Commit id the requested ref points at on the remote, or the remote HEAD
/// when no ref is given. Short branch and tag names are accepted.
fn resolve_latest_commit(options: &RepositoryOptions) -> Result<String, FetchError> {
    let reference = options.reference();
    let refs = remote_refs(options)?;

    if reference.is_empty() {
        return refs
            .into_iter()
            .find(|(name, _)| name == "HEAD")
            .map(|(_, oid)| oid)
            .ok_or_else(|| FetchError::other("the remote does not advertise a HEAD"));
    }

    let as_branch = format!("refs/heads/{reference}");
    let as_tag = format!("refs/tags/{reference}");
    refs.into_iter()
        .find(|(name, _)| name == reference || name == &as_branch || name == &as_tag)
        .map(|(_, oid)| oid)
        .ok_or_else(|| FetchError::other(format!("reference {reference} not found on the remote")))
}

/// Clones into a scratch directory and walks the tree at the requested ref.
fn list_tree_files(options: &RepositoryOptions) -> Result<Vec<String>, FetchError> {
    let scratch = tempfile::tempdir()?;
    clone_repository(scratch.path(), options)?;

    let repo = Repository::open(scratch.path()).map_err(classify_git_error)?;
    let head = repo.head().map_err(classify_git_error)?;
    let tree = head
        .peel_to_commit()
        .and_then(|commit| commit.tree())
        .map_err(classify_git_error)?;

    let mut paths = Vec::new();
    tree.walk(TreeWalkMode::PreOrder, |root, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            if let Some(name) = entry.name() {
                paths.push(format!("{root}{name}"));
            }
        }
        TreeWalkResult::Ok
    })
    .map_err(classify_git_error)?;

    Ok(filter_by_extensions(paths, &options.extensions))
}

fn fetch_options(options: &RepositoryOptions) -> FetchOptions<'_> {
    let mut fetch_options = FetchOptions::new();
    fetch_options
        .remote_callbacks(remote_callbacks(options))
        .download_tags(git2::AutotagOption::None);
    if options.depth > 0 {
        fetch_options.depth(options.depth as i32);
    }
    fetch_options
}

fn remote_callbacks(options: &RepositoryOptions) -> RemoteCallbacks<'_> {
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username, allowed_types| {
        trace!(
            "credentials requested for {}, username {:?}, allowed types {:?}",
            url,
            username,
            allowed_types
        );
        // Asking for ssh username
        if allowed_types.contains(CredentialType::USERNAME) {
            return Cred::username(username.unwrap_or("git"));
        }
        // SSH auth
        if allowed_types.contains(CredentialType::SSH_KEY) {
            return Cred::ssh_key_from_agent(username.unwrap_or("git"));
        }
        // HTTP auth from the per-call options
        if allowed_types.contains(CredentialType::USER_PASS_PLAINTEXT) {
            return Cred::userpass_plaintext(
                options.username.as_deref().unwrap_or_default(),
                options.password.as_deref().unwrap_or_default(),
            );
        }
        Err(git2::Error::from_str("no valid authentication available"))
    });
    callbacks
}

/// libgit2 reports authentication problems with a structured code, but the
/// HTTP status of a failed smart-protocol request only survives in the
/// message text.
fn classify_git_error(err: git2::Error) -> FetchError {
    if err.code() == ErrorCode::Auth {
        return FetchError::AuthenticationFailure;
    }
    match err.class() {
        ErrorClass::Net => FetchError::Transport(Box::new(err)),
        ErrorClass::Http => {
            let message = err.message().to_string();
            if message.contains("401") || message.contains("403") {
                FetchError::AuthenticationFailure
            } else if message.contains("404") {
                FetchError::IncorrectRepositoryUrl
            } else {
                FetchError::Transport(Box::new(err))
            }
        }
        _ if err.code() == ErrorCode::NotFound => FetchError::IncorrectRepositoryUrl,
        _ => FetchError::Other(Box::new(err)),
    }
}
