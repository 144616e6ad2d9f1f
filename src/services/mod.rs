//! Service layer for evidence-registry
//!
//! Services sit between the HTTP handlers and the sled store:
//! - Input validation
//! - Event emission after commit
//! - Sentinel vs `Option` read semantics
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (validation, events)
//!     ↓
//! RegistryDb (db/*.rs, sled transactions)
//! ```

pub mod events;
pub mod evidence_service;
pub mod extra_info_service;
pub mod response;

pub use events::{EventBus, EventListener, RegistryEvent};
pub use evidence_service::EvidenceService;
pub use extra_info_service::ExtraInfoService;

use std::sync::Arc;

use crate::config::Config;
use crate::db::{DbStats, RegistryDb};
use crate::error::RegistryError;

/// Service container shared by the HTTP server
pub struct Services {
    pub evidence: Arc<EvidenceService>,
    pub extra_info: Arc<ExtraInfoService>,
    pub events: Arc<EventBus>,
    db: Arc<RegistryDb>,
}

impl Services {
    /// Create all services over a shared database
    pub fn new(db: Arc<RegistryDb>, config: &Config) -> Self {
        let events = Arc::new(EventBus::with_capacity(config.event_capacity));

        Self {
            evidence: Arc::new(EvidenceService::new(
                db.clone(),
                events.clone(),
                config.domain_id.as_bytes(),
            )),
            extra_info: Arc::new(ExtraInfoService::new(db.clone(), events.clone())),
            events,
            db,
        }
    }

    /// Store statistics
    pub fn stats(&self) -> Result<DbStats, RegistryError> {
        self.db.stats()
    }

    /// Flush the store to disk
    pub fn flush(&self) -> Result<(), RegistryError> {
        self.db.flush()
    }
}
