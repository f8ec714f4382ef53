use reqwest::{Method, StatusCode};
use thiserror::Error;

/// Result alias for CouchDB operations.
pub type CouchResult<T> = Result<T, CouchDaoError>;

/// Failures of the CouchDB game store.
#[derive(Debug, Error)]
pub enum CouchDaoError {
    /// A required variable is unset.
    #[error("missing CouchDB environment variable `{0}`")]
    MissingEnvVar(&'static str),
    /// The HTTP client could not be built.
    #[error("failed to build CouchDB client")]
    Client(#[source] reqwest::Error),
    /// The request never got an answer.
    #[error("CouchDB request {method} `{path}` failed")]
    Transport {
        method: Method,
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// CouchDB answered with an unexpected status.
    #[error("CouchDB answered {status} to {method} `{path}`")]
    Status {
        method: Method,
        path: String,
        status: StatusCode,
    },
    /// The body did not match the expected document.
    #[error("undecodable CouchDB document `{path}`")]
    Decode {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// Concurrent writers kept bumping the document revision.
    #[error("gave up writing `{path}` after {attempts} revision conflicts")]
    Conflict { path: String, attempts: u32 },
}
