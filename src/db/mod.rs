//! sled-backed storage for evidence, extra info and counters
//!
//! ## Trees
//!
//! - `evidence` - evidence records keyed by raw 32-byte identifier
//! - `extra_info` - extra-info records keyed by raw 32-byte identifier
//! - `counters` - per-parent attachment counters keyed by parent identifier
//! - `meta` - the global submission counter
//!
//! Every write is a multi-tree sled transaction: the counter advance, the
//! identifier derivation and the record insert commit together or not at all.
//! Values are MessagePack (`rmp-serde`).

pub mod counters;
pub mod evidence;
pub mod extra_info;

use std::path::Path;

use serde::Serialize;
use sled::transaction::ConflictableTransactionError;
use tracing::{debug, info};

use crate::error::RegistryError;

/// Default sled page cache size
pub const DEFAULT_CACHE_CAPACITY: u64 = 64 * 1024 * 1024;

/// Evidence registry database
pub struct RegistryDb {
    db: sled::Db,
    evidence: sled::Tree,
    extra_info: sled::Tree,
    counters: sled::Tree,
    meta: sled::Tree,
}

impl RegistryDb {
    /// Open or create the registry database at `path`
    pub fn open<P: AsRef<Path>>(path: P, cache_capacity: u64) -> Result<Self, RegistryError> {
        let db = sled::Config::new()
            .path(path.as_ref())
            .cache_capacity(cache_capacity)
            .open()?;
        info!(path = %path.as_ref().display(), "Opened registry database");
        Self::from_db(db)
    }

    /// Open a throwaway database that is removed on drop (for tests)
    pub fn open_temporary() -> Result<Self, RegistryError> {
        debug!("Opening temporary registry database");
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> Result<Self, RegistryError> {
        let evidence = db.open_tree("evidence")?;
        let extra_info = db.open_tree("extra_info")?;
        let counters = db.open_tree("counters")?;
        let meta = db.open_tree("meta")?;
        Ok(Self {
            db,
            evidence,
            extra_info,
            counters,
            meta,
        })
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, RegistryError> {
        Ok(DbStats {
            evidence_count: self.evidence.len() as u64,
            extra_info_count: self.extra_info.len() as u64,
            global_counter: self.global_counter()?,
        })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<(), RegistryError> {
        let bytes = self.db.flush()?;
        debug!(bytes, "Flushed registry database");
        Ok(())
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub evidence_count: u64,
    pub extra_info_count: u64,
    pub global_counter: u64,
}

/// Encode a record inside a transaction, aborting on failure
fn encode_tx<T: Serialize>(value: &T) -> Result<Vec<u8>, ConflictableTransactionError<RegistryError>> {
    rmp_serde::to_vec(value).map_err(|e| ConflictableTransactionError::Abort(e.into()))
}
