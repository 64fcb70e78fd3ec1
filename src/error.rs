use reqwest::StatusCode;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Classified failure of a repository operation.
///
/// Every error returned by this crate is one of these four kinds, so callers
/// can branch on semantics (prompt for credentials, report a bad URL, retry)
/// instead of inspecting error text.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credentials are missing or were rejected by the remote.
    #[error("authentication failed, please ensure that the git credentials are correct")]
    AuthenticationFailure,
    /// The URL is malformed or does not resolve to a repository.
    #[error("git repository could not be found, please ensure that the URL is correct")]
    IncorrectRepositoryUrl,
    /// The remote could not be reached: connection failure, timeout or
    /// cancelled request.
    #[error("failed to reach the git server: {0}")]
    Transport(#[source] BoxError),
    /// Everything the other kinds do not cover, e.g. an unexpected response
    /// shape from the provider.
    #[error("unexpected git failure: {0}")]
    Other(#[source] BoxError),
}

impl FetchError {
    pub(crate) fn other(message: impl Into<String>) -> Self {
        FetchError::Other(message.into().into())
    }

    /// Maps a non-success HTTP status to its classification. `context` names
    /// the operation for the fallback kind.
    pub(crate) fn from_status(status: StatusCode, context: &str) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => FetchError::AuthenticationFailure,
            StatusCode::NOT_FOUND => FetchError::IncorrectRepositoryUrl,
            status => FetchError::other(format!("{context} failed with status {status}")),
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Other(Box::new(err))
        } else {
            FetchError::Transport(Box::new(err))
        }
    }
}

impl From<std::io::Error> for FetchError {
    fn from(err: std::io::Error) -> Self {
        FetchError::Other(Box::new(err))
    }
}

impl From<zip::result::ZipError> for FetchError {
    fn from(err: zip::result::ZipError) -> Self {
        FetchError::Other(Box::new(err))
    }
}

impl From<tokio::task::JoinError> for FetchError {
    fn from(err: tokio::task::JoinError) -> Self {
        FetchError::Other(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_classify_by_kind() {
        assert!(matches!(
            FetchError::from_status(StatusCode::UNAUTHORIZED, "list refs"),
            FetchError::AuthenticationFailure
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::FORBIDDEN, "list refs"),
            FetchError::AuthenticationFailure
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::NOT_FOUND, "list refs"),
            FetchError::IncorrectRepositoryUrl
        ));
        assert!(matches!(
            FetchError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "list refs"),
            FetchError::Other(_)
        ));
    }

    #[test]
    fn fallback_message_names_the_operation() {
        let err = FetchError::from_status(StatusCode::BAD_GATEWAY, "download archive");
        assert_eq!(
            err.to_string(),
            "unexpected git failure: download archive failed with status 502 Bad Gateway"
        );
    }
}
