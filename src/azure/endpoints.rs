use url::Url;

use super::url::AzureUrl;
use crate::error::FetchError;

/// The provider REST surface this client is wire-compatible with.
pub(crate) const API_VERSION: &str = "6.0";

/// Endpoint for downloading a zip snapshot of `/` at the given ref, with
/// full recursion.
pub(crate) fn download_url(
    base: &Url,
    identity: &AzureUrl,
    reference: Option<&str>,
) -> Result<Url, FetchError> {
    let mut url = repository_url(base, identity, &["items"])?;
    url.query_pairs_mut()
        .append_pair("scopePath", "/")
        .append_pair("download", "true")
        .append_pair("$format", "zip")
        .append_pair("recursionLevel", "full")
        .append_pair("api-version", API_VERSION);
    append_version_descriptor(&mut url, reference);
    Ok(url)
}

/// Endpoint probing the repository's root item at the given ref. Confirms
/// that repository and ref exist without transferring content, and carries
/// the commit id the ref currently points at.
pub(crate) fn root_item_url(
    base: &Url,
    identity: &AzureUrl,
    reference: Option<&str>,
) -> Result<Url, FetchError> {
    let mut url = repository_url(base, identity, &["items"])?;
    url.query_pairs_mut()
        .append_pair("scopePath", "/")
        .append_pair("api-version", API_VERSION);
    append_version_descriptor(&mut url, reference);
    Ok(url)
}

/// Endpoint listing all refs of the repository. Takes no ref parameter.
pub(crate) fn refs_url(base: &Url, identity: &AzureUrl) -> Result<Url, FetchError> {
    let mut url = repository_url(base, identity, &["refs"])?;
    url.query_pairs_mut().append_pair("api-version", API_VERSION);
    Ok(url)
}

/// Endpoint listing the full recursive tree for a resolved tree object id
/// (not a ref name).
pub(crate) fn tree_url(
    base: &Url,
    identity: &AzureUrl,
    object_id: &str,
) -> Result<Url, FetchError> {
    let mut url = repository_url(base, identity, &["trees", object_id])?;
    url.query_pairs_mut()
        .append_pair("api-version", API_VERSION)
        .append_pair("recursive", "true");
    Ok(url)
}

/// `<base>/<org>/<project>/_apis/git/repositories/<repo>/<resource...>`,
/// with every segment percent-escaped.
fn repository_url(base: &Url, identity: &AzureUrl, resource: &[&str]) -> Result<Url, FetchError> {
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| FetchError::other("base URL cannot carry a path"))?;
        segments.pop_if_empty().extend([
            identity.organization.as_str(),
            identity.project.as_str(),
            "_apis",
            "git",
            "repositories",
            identity.repository.as_str(),
        ]);
        segments.extend(resource);
    }
    Ok(url)
}

/// The version descriptor addresses a ref by its short name plus a type
/// discriminator. Omitted entirely when no ref is requested, which makes the
/// provider fall back to the default branch.
fn append_version_descriptor(url: &mut Url, reference: Option<&str>) {
    let Some(reference) = reference.filter(|reference| !reference.is_empty()) else {
        return;
    };
    url.query_pairs_mut()
        .append_pair("versionDescriptor.version", short_reference_name(reference))
        .append_pair(
            "versionDescriptor.versionType",
            reference_version_type(reference),
        );
}

/// `refs/heads/main` -> `main`, `refs/tags/v1` -> `v1`; anything else is
/// used verbatim.
fn short_reference_name(reference: &str) -> &str {
    reference
        .strip_prefix("refs/heads/")
        .or_else(|| reference.strip_prefix("refs/tags/"))
        .unwrap_or(reference)
}

fn reference_version_type(reference: &str) -> &str {
    if reference.starts_with("refs/tags/") {
        "tag"
    } else {
        "branch"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn base() -> Url {
        Url::parse("https://dev.azure.com").unwrap()
    }

    fn identity() -> AzureUrl {
        AzureUrl {
            organization: "organisation".to_string(),
            project: "project".to_string(),
            repository: "repository".to_string(),
            username: None,
            password: None,
        }
    }

    /// Scheme, host and path must match exactly; query parameter sets must
    /// match exactly, order-independent.
    fn assert_endpoint(actual: &Url, expected: &str) {
        let expected = Url::parse(expected).unwrap();
        assert_eq!(actual.scheme(), expected.scheme());
        assert_eq!(actual.host_str(), expected.host_str());
        assert_eq!(actual.path(), expected.path());

        let actual_query: HashMap<String, String> = actual.query_pairs().into_owned().collect();
        let expected_query: HashMap<String, String> = expected.query_pairs().into_owned().collect();
        assert_eq!(actual_query, expected_query);
    }

    #[test]
    fn builds_download_url() {
        let url = download_url(&base(), &identity(), Some("refs/heads/main")).unwrap();
        assert_endpoint(
            &url,
            "https://dev.azure.com/organisation/project/_apis/git/repositories/repository/items\
             ?scopePath=/&download=true&versionDescriptor.version=main&$format=zip\
             &recursionLevel=full&api-version=6.0&versionDescriptor.versionType=branch",
        );
    }

    #[test]
    fn builds_root_item_url() {
        let url = root_item_url(&base(), &identity(), Some("refs/heads/main")).unwrap();
        assert_endpoint(
            &url,
            "https://dev.azure.com/organisation/project/_apis/git/repositories/repository/items\
             ?scopePath=/&api-version=6.0&versionDescriptor.version=main\
             &versionDescriptor.versionType=branch",
        );
    }

    #[test]
    fn builds_refs_url() {
        let url = refs_url(&base(), &identity()).unwrap();
        assert_endpoint(
            &url,
            "https://dev.azure.com/organisation/project/_apis/git/repositories/repository/refs\
             ?api-version=6.0",
        );
    }

    #[test]
    fn builds_tree_url() {
        let url = tree_url(&base(), &identity(), "sha1").unwrap();
        assert_endpoint(
            &url,
            "https://dev.azure.com/organisation/project/_apis/git/repositories/repository/trees/sha1\
             ?api-version=6.0&recursive=true",
        );
    }

    #[test]
    fn omits_version_descriptor_without_a_ref() {
        let url = root_item_url(&base(), &identity(), None).unwrap();
        assert_endpoint(
            &url,
            "https://dev.azure.com/organisation/project/_apis/git/repositories/repository/items\
             ?scopePath=/&api-version=6.0",
        );
    }

    #[test]
    fn tags_use_the_tag_version_type() {
        let url = download_url(&base(), &identity(), Some("refs/tags/v1.0.0")).unwrap();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["versionDescriptor.version"], "v1.0.0");
        assert_eq!(query["versionDescriptor.versionType"], "tag");
    }

    #[test]
    fn bare_reference_names_pass_through_as_branches() {
        let url = root_item_url(&base(), &identity(), Some("main")).unwrap();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();
        assert_eq!(query["versionDescriptor.version"], "main");
        assert_eq!(query["versionDescriptor.versionType"], "branch");
    }

    #[test]
    fn path_segments_are_escaped() {
        let mut identity = identity();
        identity.project = "my project".to_string();
        let url = refs_url(&base(), &identity).unwrap();
        assert_eq!(
            url.path(),
            "/organisation/my%20project/_apis/git/repositories/repository/refs"
        );
    }
}
