//! Dataset configuration.

use crate::error::{CoreError, CoreResult};
use crate::retry::RetryPolicy;
use std::fmt;

/// Service-account credentials handed to the connection factory.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Account e-mail.
    pub client_email: String,
    /// PEM private key.
    pub private_key: String,
}

impl Credentials {
    /// Creates credentials.
    pub fn new(client_email: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            client_email: client_email.into(),
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_email", &self.client_email)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Configuration for reaching a store.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Project the store belongs to.
    pub project_id: String,

    /// Namespace partition, `None` for the default namespace.
    ///
    /// Keys do not carry a namespace. The connection factory receives the
    /// whole config and scopes the backend it creates to this partition.
    pub namespace: Option<String>,

    /// Credentials, `None` for ambient credentials or an emulator.
    pub credentials: Option<Credentials>,

    /// Retry schedule applied to every store call.
    pub retry: RetryPolicy,
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project id.
    #[must_use]
    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = project_id.into();
        self
    }

    /// Sets the namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the credentials.
    #[must_use]
    pub fn credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Checks that the configuration can be used to open a connection.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] when the project id is empty.
    pub fn validate(&self) -> CoreResult<()> {
        if self.project_id.trim().is_empty() {
            return Err(CoreError::config("project id is required"));
        }
        Ok(())
    }

    /// Reads configuration from `ENTIMAP_*` environment variables.
    ///
    /// | Variable | Field |
    /// | --- | --- |
    /// | `ENTIMAP_PROJECT_ID` | `project_id` |
    /// | `ENTIMAP_NAMESPACE` | `namespace` |
    /// | `ENTIMAP_CLIENT_EMAIL` + `ENTIMAP_PRIVATE_KEY` | `credentials` |
    /// | `ENTIMAP_MAX_RETRIES` | `retry.max_retries` |
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Config`] for a missing project id, a
    /// non-numeric retry count, or only half of the credential pair.
    pub fn from_env() -> CoreResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Config::new();
        if let Some(project_id) = read("ENTIMAP_PROJECT_ID") {
            config = config.project_id(project_id);
        }
        if let Some(namespace) = read("ENTIMAP_NAMESPACE") {
            config = config.namespace(namespace);
        }

        match (read("ENTIMAP_CLIENT_EMAIL"), read("ENTIMAP_PRIVATE_KEY")) {
            (Some(email), Some(key)) => config = config.credentials(Credentials::new(email, key)),
            (None, None) => {}
            _ => {
                return Err(CoreError::config(
                    "ENTIMAP_CLIENT_EMAIL and ENTIMAP_PRIVATE_KEY must be set together",
                ))
            }
        }

        if let Some(raw) = read("ENTIMAP_MAX_RETRIES") {
            let max_retries: u32 = raw.trim().parse().map_err(|_| {
                CoreError::config(format!("ENTIMAP_MAX_RETRIES is not a number: {raw}"))
            })?;
            config.retry.max_retries = max_retries;
        }

        config.validate()?;
        Ok(config)
    }
}
