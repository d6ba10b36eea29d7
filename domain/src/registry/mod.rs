//! Typed access to the connection registry.
//!
//! The registry is the only place routing state lives. Every event handler
//! acquires a fresh [`Registry`] handle from the configured [`RegistryBackend`],
//! uses it for the duration of that one event and drops it afterwards.
use crate::error::{Error, RegistryErrorKind};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use entity_api::{connection, connection_class::ConnectionClass, connections};
use log::*;
use sea_orm::DatabaseConnection;
use service::{
    config::{Config, RegistryBackend as BackendKind},
    AppState,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

#[cfg(test)]
use mockall::automock;

mod memory;

pub use memory::MemoryRegistry;

/// A registry row.
pub type Entry = connections::Model;

/// Access contract for the connection registry.
///
/// `upsert` and `delete` are atomic for a single id and idempotent. `get` treats
/// an absent id as a normal outcome. `list_by_class` returns every entry of the
/// class, in no particular order.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Registry: Send + Sync {
    async fn upsert(&self, id: &str, class: ConnectionClass) -> Result<Entry, Error>;

    async fn delete(&self, id: &str) -> Result<(), Error>;

    async fn get(&self, id: &str) -> Result<Option<Entry>, Error>;

    async fn list_by_class(&self, class: ConnectionClass) -> Result<Vec<Entry>, Error>;

    /// Extends the entry's expiry by the registry's TTL, leaving its class alone.
    /// Absent ids and registries without a TTL are a no-op.
    async fn refresh(&self, id: &str) -> Result<(), Error>;

    /// Removes entries whose `expires_at` lies before `now`.
    async fn evict_expired(&self, now: DateTime<Utc>) -> Result<u64, Error>;
}

#[async_trait]
impl<R: Registry + ?Sized> Registry for Arc<R> {
    async fn upsert(&self, id: &str, class: ConnectionClass) -> Result<Entry, Error> {
        (**self).upsert(id, class).await
    }

    async fn delete(&self, id: &str) -> Result<(), Error> {
        (**self).delete(id).await
    }

    async fn get(&self, id: &str) -> Result<Option<Entry>, Error> {
        (**self).get(id).await
    }

    async fn list_by_class(&self, class: ConnectionClass) -> Result<Vec<Entry>, Error> {
        (**self).list_by_class(class).await
    }

    async fn refresh(&self, id: &str) -> Result<(), Error> {
        (**self).refresh(id).await
    }

    async fn evict_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        (**self).evict_expired(now).await
    }
}

/// Tunables shared by every registry backend.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryOptions {
    /// Lifetime given to an entry on each upsert; `None` means entries never expire.
    pub ttl: Option<Duration>,
    /// Rows fetched per page by `list_by_class`.
    pub page_size: u64,
}

impl From<&Config> for RegistryOptions {
    fn from(config: &Config) -> Self {
        let ttl = i64::try_from(config.registry_ttl_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::seconds);

        Self {
            ttl,
            page_size: config.registry_page_size,
        }
    }
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            ttl: Some(Duration::hours(2)),
            page_size: 100,
        }
    }
}

/// Registry handle over the Postgres `connections` table.
pub struct DatabaseRegistry {
    db: Arc<DatabaseConnection>,
    options: RegistryOptions,
}

impl DatabaseRegistry {
    pub fn new(db: Arc<DatabaseConnection>, options: RegistryOptions) -> Self {
        Self { db, options }
    }
}

#[async_trait]
impl Registry for DatabaseRegistry {
    async fn upsert(&self, id: &str, class: ConnectionClass) -> Result<Entry, Error> {
        connection::upsert(&self.db, id, class, self.options.ttl)
            .await
            .map_err(|err| Error::registry(RegistryErrorKind::Write, err))
    }

    async fn delete(&self, id: &str) -> Result<(), Error> {
        connection::delete_by_id(&self.db, id)
            .await
            .map_err(|err| Error::registry(RegistryErrorKind::Write, err))
    }

    async fn get(&self, id: &str) -> Result<Option<Entry>, Error> {
        connection::find_by_id(&self.db, id)
            .await
            .map_err(|err| Error::registry(RegistryErrorKind::Read, err))
    }

    async fn list_by_class(&self, class: ConnectionClass) -> Result<Vec<Entry>, Error> {
        connection::find_by_class(&self.db, class, self.options.page_size)
            .await
            .map_err(|err| Error::registry(RegistryErrorKind::Read, err))
    }

    async fn refresh(&self, id: &str) -> Result<(), Error> {
        let Some(ttl) = self.options.ttl else {
            return Ok(());
        };

        connection::refresh_expiry(&self.db, id, ttl)
            .await
            .map(|_| ())
            .map_err(|err| Error::registry(RegistryErrorKind::Write, err))
    }

    async fn evict_expired(&self, now: DateTime<Utc>) -> Result<u64, Error> {
        connection::delete_expired(&self.db, now)
            .await
            .map_err(|err| Error::registry(RegistryErrorKind::Write, err))
    }
}

/// Where registry handles come from. Cheap to clone; shared by every handler.
#[derive(Clone)]
pub enum RegistryBackend {
    Database {
        db: Arc<DatabaseConnection>,
        options: RegistryOptions,
    },
    Memory(Arc<MemoryRegistry>),
}

impl RegistryBackend {
    /// Selects the backend named by the configuration. The Postgres backend
    /// requires the application state to carry a database connection.
    pub fn from_app_state(app_state: &AppState) -> Result<Self, Error> {
        let options = RegistryOptions::from(&app_state.config);

        match app_state.config.registry_backend {
            BackendKind::Postgres => {
                let db = app_state.database_connection.clone().ok_or_else(|| {
                    Error::config("postgres registry backend requires a database connection")
                })?;
                Ok(Self::Database { db, options })
            }
            BackendKind::Memory => Ok(Self::Memory(Arc::new(MemoryRegistry::new(options.ttl)))),
        }
    }

    /// Returns a handle scoped to one event.
    pub fn acquire(&self) -> Box<dyn Registry> {
        match self {
            Self::Database { db, options } => {
                Box::new(DatabaseRegistry::new(Arc::clone(db), options.clone()))
            }
            Self::Memory(registry) => Box::new(Arc::clone(registry)),
        }
    }
}

/// Periodically deletes registry entries whose advisory expiry has passed.
pub fn spawn_eviction(backend: RegistryBackend, interval: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let registry = backend.acquire();
            match registry.evict_expired(Utc::now()).await {
                Ok(0) => trace!("Eviction sweep found no expired connections"),
                Ok(removed) => info!("Evicted {removed} expired connection(s) from the registry"),
                Err(err) => warn!("Eviction sweep failed: {err}"),
            }
        }
    })
}
