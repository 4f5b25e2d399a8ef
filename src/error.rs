// Error types, one enum per phase of a run.
//
// Login and listing errors end the run; download errors are logged by the
// caller and the loop moves on to the next job.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure while logging in.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login endpoint answered with something other than 200.
    #[error("login rejected with HTTP status {0}")]
    Status(StatusCode),

    /// The login body could not be decoded.
    #[error("failed to decode login response: {0}")]
    Decode(#[from] serde_json::Error),

    /// DNS, TCP, TLS or body transfer failure.
    #[error("login request failed: {0}")]
    Network(#[from] reqwest::Error),
}

/// Failure while fetching the job list.
#[derive(Debug, Error)]
pub enum ListError {
    #[error("job list rejected with HTTP status {0}")]
    Status(StatusCode),

    #[error("failed to decode job list: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("job list request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The sessions API needs the facility id returned at login.
    #[error("session has no facility id")]
    MissingFacility,
}

/// Failure while downloading a single archive.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("archive download rejected with HTTP status {0}")]
    Status(StatusCode),

    /// Creating or writing the local file failed.
    #[error("failed to write archive: {0}")]
    Io(#[from] std::io::Error),

    /// The request itself failed.
    #[error("archive request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The connection broke off while the body was being read.
    #[error("archive transfer interrupted: {0}")]
    Stream(#[source] std::io::Error),

    #[error("session has no facility id")]
    MissingFacility,
}
