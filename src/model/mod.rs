use std::collections::BTreeSet;

/// Parameters of a single repository operation.
///
/// Options are immutable per call. An explicit `username`/`password` pair
/// always takes precedence over credentials embedded in the URL itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryOptions {
    pub repository_url: String,
    /// Ref to operate on, e.g. `refs/heads/main`. `None` means the remote
    /// default branch.
    pub reference_name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Clone depth for the git backend. `0` fetches the full history.
    pub depth: u32,
    /// File-extension filter for `list_files`. Empty means no filtering.
    pub extensions: BTreeSet<String>,
}

impl RepositoryOptions {
    pub fn new(repository_url: impl Into<String>) -> Self {
        RepositoryOptions {
            repository_url: repository_url.into(),
            ..Default::default()
        }
    }

    pub(crate) fn reference(&self) -> &str {
        self.reference_name.as_deref().unwrap_or_default()
    }
}

/// Keeps only paths whose suffix after the last `.` is in `extensions`.
/// The match is case-sensitive; paths without an extension never match.
pub(crate) fn filter_by_extensions(
    paths: Vec<String>,
    extensions: &BTreeSet<String>,
) -> Vec<String> {
    if extensions.is_empty() {
        return paths;
    }
    paths
        .into_iter()
        .filter(|path| {
            path.rsplit_once('.')
                .is_some_and(|(_, extension)| extensions.contains(extension))
        })
        .collect()
}
