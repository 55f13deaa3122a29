//! Lazily created, resettable store handle.

use crate::config::Config;
use crate::error::CoreResult;
use entimap_store::DatastoreBackend;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Shared handle to a store.
pub type BackendHandle = Arc<dyn DatastoreBackend>;

type Factory = dyn Fn(&Config) -> CoreResult<BackendHandle> + Send + Sync;

/// Creates a store handle on first use and hands out the same handle until
/// [`reset`](Self::reset).
///
/// A process that forks or restarts its workers should call `reset()` in the
/// child so it does not share a handle with the parent.
///
/// # Example
///
/// ```rust
/// use entimap_core::{Config, ConnectionProvider};
/// use entimap_store::InMemoryDatastore;
/// use std::sync::Arc;
///
/// let provider = ConnectionProvider::new(Config::new().project_id("demo"), |_| {
///     Ok(Arc::new(InMemoryDatastore::new()))
/// });
/// assert!(!provider.is_connected());
/// let _handle = provider.handle().unwrap();
/// assert!(provider.is_connected());
/// ```
pub struct ConnectionProvider {
    config: Config,
    factory: Box<Factory>,
    current: RwLock<Option<(Uuid, BackendHandle)>>,
}

impl ConnectionProvider {
    /// Creates a provider that builds handles with `factory`.
    pub fn new<F>(config: Config, factory: F) -> Self
    where
        F: Fn(&Config) -> CoreResult<BackendHandle> + Send + Sync + 'static,
    {
        Self {
            config,
            factory: Box::new(factory),
            current: RwLock::new(None),
        }
    }

    /// Creates a provider that always hands out `backend`, including after
    /// a reset.
    pub fn with_backend(config: Config, backend: BackendHandle) -> Self {
        Self::new(config, move |_| Ok(Arc::clone(&backend)))
    }

    /// Returns the configuration handles are built from.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the current handle, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns whatever the factory returns when creation fails. A failed
    /// creation is not memoised.
    pub fn handle(&self) -> CoreResult<BackendHandle> {
        if let Some((_, handle)) = self.current.read().as_ref() {
            return Ok(Arc::clone(handle));
        }

        let mut current = self.current.write();
        if let Some((_, handle)) = current.as_ref() {
            return Ok(Arc::clone(handle));
        }

        let handle = (self.factory)(&self.config)?;
        let id = Uuid::new_v4();
        info!(
            connection_id = %id,
            project_id = %self.config.project_id,
            namespace = self.config.namespace.as_deref().unwrap_or(""),
            "store connection created"
        );
        *current = Some((id, Arc::clone(&handle)));
        Ok(handle)
    }

    /// Drops the memoised handle. The next [`handle`](Self::handle) call
    /// creates a new one.
    pub fn reset(&self) {
        if let Some((id, _)) = self.current.write().take() {
            info!(connection_id = %id, "store connection reset");
        }
    }

    /// Id of the current handle, if one exists.
    pub fn connection_id(&self) -> Option<Uuid> {
        self.current.read().as_ref().map(|(id, _)| *id)
    }

    /// Returns true if a handle is memoised.
    pub fn is_connected(&self) -> bool {
        self.current.read().is_some()
    }
}

impl fmt::Debug for ConnectionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("config", &self.config)
            .field("connection_id", &self.connection_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use entimap_store::InMemoryDatastore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_provider() -> (ConnectionProvider, Arc<AtomicUsize>) {
        let created = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&created);
        let provider = ConnectionProvider::new(Config::new().project_id("demo"), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(InMemoryDatastore::new()) as BackendHandle)
        });
        (provider, created)
    }

    #[test]
    fn handle_is_memoised() {
        let (provider, created) = counting_provider();

        let a = provider.handle().unwrap();
        let b = provider.handle().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn factory_receives_namespace() {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let sink = Arc::clone(&seen);
        let provider = ConnectionProvider::new(
            Config::new().project_id("demo").namespace("tenant-a"),
            move |config| {
                *sink.lock() = config.namespace.clone();
                Ok(Arc::new(InMemoryDatastore::new()) as BackendHandle)
            },
        );

        provider.handle().unwrap();
        assert_eq!(seen.lock().as_deref(), Some("tenant-a"));
    }

    #[test]
    fn reset_creates_new_handle() {
        let (provider, created) = counting_provider();

        provider.handle().unwrap();
        let first = provider.connection_id().unwrap();
        provider.reset();
        assert!(!provider.is_connected());
        assert!(provider.connection_id().is_none());

        provider.handle().unwrap();
        assert_ne!(provider.connection_id().unwrap(), first);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failed_creation_is_not_memoised() {
        let provider = ConnectionProvider::new(Config::new(), |config| {
            config.validate()?;
            Ok(Arc::new(InMemoryDatastore::new()) as BackendHandle)
        });

        assert!(matches!(provider.handle(), Err(CoreError::Config { .. })));
        assert!(!provider.is_connected());
    }

    #[test]
    fn with_backend_survives_reset() {
        let store: BackendHandle = Arc::new(InMemoryDatastore::new());
        let provider = ConnectionProvider::with_backend(Config::new(), Arc::clone(&store));

        let before = provider.handle().unwrap();
        provider.reset();
        let after = provider.handle().unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert!(Arc::ptr_eq(&after, &store));
    }
}
