//! Application state for the realty REST API.
//!
//! This module defines the shared application state that is available to all
//! request handlers: the storage backend, the provisioner, the tenant router
//! and the server configuration.

use std::sync::Arc;

use realty_persistence::catalog::EntityCatalog;
use realty_persistence::core::{Backend, EntityStorage, PartitionStore};
use realty_persistence::provision::Provisioner;

use crate::config::ServerConfig;
use crate::tenant::TenantRouter;

/// Storage the REST layer can run on.
///
/// Implemented for every type that provides the registry, the partition
/// store, entity storage and a health-checked backend.
pub trait AppStorage: PartitionStore + EntityStorage + Backend + 'static {}

impl<T> AppStorage for T where T: PartitionStore + EntityStorage + Backend + 'static {}

/// Shared application state for the REST API.
///
/// # Type Parameters
///
/// * `S` - The storage backend type (must implement [`AppStorage`])
///
/// # Example
///
/// ```rust,ignore
/// use realty_rest::{AppState, ServerConfig, realty_catalog};
/// use realty_persistence::backends::sqlite::SqliteBackend;
/// use std::sync::Arc;
///
/// let backend = SqliteBackend::in_memory()?;
/// backend.init_schema()?;
/// let state = AppState::new(Arc::new(backend), Arc::new(realty_catalog()?), ServerConfig::default());
/// ```
pub struct AppState<S> {
    storage: Arc<S>,
    provisioner: Arc<Provisioner<S>>,
    router: Arc<TenantRouter<S>>,
    config: Arc<ServerConfig>,
}

// Manually implement Clone since S is wrapped in Arc and doesn't need to be Clone
impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            provisioner: Arc::clone(&self.provisioner),
            router: Arc::clone(&self.router),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: AppStorage> AppState<S> {
    /// Creates the state, building the provisioner and tenant router over
    /// `storage`.
    pub fn new(storage: Arc<S>, catalog: Arc<EntityCatalog>, config: ServerConfig) -> Self {
        let provisioner = Provisioner::new(Arc::clone(&storage), catalog, config.provisioning());
        let router = TenantRouter::new(Arc::clone(&storage), config.trust_forwarded_host);

        Self {
            storage,
            provisioner: Arc::new(provisioner),
            router: Arc::new(router),
            config: Arc::new(config),
        }
    }

    /// Returns a reference to the storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Returns the provisioner.
    pub fn provisioner(&self) -> &Provisioner<S> {
        &self.provisioner
    }

    /// Returns the tenant router.
    pub fn router(&self) -> &TenantRouter<S> {
        &self.router
    }

    /// Returns the entity catalog.
    pub fn catalog(&self) -> &EntityCatalog {
        self.provisioner.catalog()
    }

    /// Returns a reference to the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the default page size for entity lists.
    pub fn default_page_size(&self) -> u32 {
        self.config.default_page_size
    }

    /// Returns the maximum page size for entity lists.
    pub fn max_page_size(&self) -> u32 {
        self.config.max_page_size
    }
}
