//! Single owner of the registry. Every mutation runs against a working copy
//! under one lock: on failure the copy is thrown away, on success the
//! touched records are written through and the copy becomes current.

use std::sync::Arc;

use log::{debug, error, warn};
use tokio::sync::Mutex;

use crate::db::MongoDB;
use crate::error::{MembershipError, ServiceError};
use crate::registry::Registry;

pub struct MatchStore {
    registry: Mutex<Registry>,
    db: Option<Arc<MongoDB>>,
}

impl MatchStore {
    /// Store with no durable backing. State lives as long as the process.
    pub fn in_memory() -> Self {
        warn!("No MongoDB configured; team state will not survive a restart");
        Self::with_registry(Registry::new(), None)
    }

    pub async fn load(db: Arc<MongoDB>) -> Result<Self, ServiceError> {
        let registry = db.load_registry().await?;
        Ok(Self::with_registry(registry, Some(db)))
    }

    pub fn with_registry(registry: Registry, db: Option<Arc<MongoDB>>) -> Self {
        MatchStore {
            registry: Mutex::new(registry),
            db,
        }
    }

    /// Runs a read-only query against the current snapshot.
    pub async fn read<R>(&self, query: impl FnOnce(&Registry) -> R) -> R {
        let registry = self.registry.lock().await;
        query(&registry)
    }

    /// Applies `operation` as one transaction. Concurrent callers are
    /// serialized, so a capacity check and the append that follows it can
    /// never interleave with another writer.
    pub async fn transact<R>(
        &self,
        operation: impl FnOnce(&mut Registry) -> Result<R, MembershipError>,
    ) -> Result<R, ServiceError> {
        let mut current = self.registry.lock().await;
        let mut working = current.clone();
        let outcome = operation(&mut working)?;

        let changes = working.take_changes();
        if let Some(db) = &self.db {
            if !changes.is_empty() {
                if let Err(err) = db.persist(&working, &changes).await {
                    error!("Failed to persist changes, discarding transaction: {}", err);
                    return Err(ServiceError::InternalServerError);
                }
            }
        }
        debug!(
            "Committed transaction touching {} users, {} teams, {} notifications",
            changes.users.len(),
            changes.teams.len() + changes.removed_teams.len(),
            changes.notifications.len() + changes.removed_notifications.len()
        );

        *current = working;
        Ok(outcome)
    }
}
