use std::env;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_DATABASE: &str = "rankrat";

/// Basic-auth credentials.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Where the game documents live.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    /// Server root, e.g. `http://localhost:5984`.
    pub base_url: String,
    /// Database holding one document per game.
    pub database: String,
    /// Basic auth, when configured.
    pub credentials: Option<Credentials>,
}

impl CouchConfig {
    /// `COUCH_BASE_URL` is required; `COUCH_DB` defaults to `rankrat`.
    /// Credentials are used only when both `COUCH_USERNAME` and `COUCH_PASSWORD` are set.
    pub fn from_env() -> CouchResult<Self> {
        let base_url = non_empty_var("COUCH_BASE_URL")
            .ok_or(CouchDaoError::MissingEnvVar("COUCH_BASE_URL"))?;
        let database = non_empty_var("COUCH_DB").unwrap_or_else(|| DEFAULT_DATABASE.to_owned());
        let credentials = non_empty_var("COUCH_USERNAME")
            .zip(non_empty_var("COUCH_PASSWORD"))
            .map(|(username, password)| Credentials { username, password });

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            database,
            credentials,
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
