//! Evidence Registry - append-only, provenance-tracked evidence log
//!
//! Records assertions about externally produced content (a content hash, the
//! submitting account, an opaque signature and free-form payload) under a
//! deterministically derived identifier. Follow-on records attach to a parent
//! and form traceable chains.
//!
//! ## Architecture
//!
//! - **identifier**: SHA-256 derivation of main and sub identifiers
//! - **db**: sled trees for evidence, extra info and counters; every write is
//!   one transaction (counter advance + derivation + insert)
//! - **authorization**: only a record's provider may change its locator
//! - **services**: validation, sentinel/`Option` reads, event emission
//! - **http** / **event_stream**: daemon API and WebSocket notifications
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/evidence-registry/
//! ├── registry.sled/   # evidence, extra_info, counters, meta trees
//! └── config.toml      # Configuration
//! ```
//!
//! Signatures are stored, never verified. Parent and prior references are
//! stored, never checked for existence. Nothing is ever deleted.

pub mod authorization;
pub mod config;
pub mod db;
pub mod error;
pub mod event_stream;
pub mod http;
pub mod identifier;
pub mod services;
pub mod types;
pub mod version;

// Re-exports
pub use config::Config;
pub use db::{DbStats, RegistryDb};
pub use error::RegistryError;
pub use http::HttpServer;
pub use identifier::{content_digest, derive_main, derive_sub, ContentHash, Identifier};
pub use services::{EventBus, EvidenceService, ExtraInfoService, RegistryEvent, Services};
pub use types::{
    AgentId, AttachExtraInfoInput, Evidence, ExtraInfo, Signature, SubmitEvidenceInput,
    UpdateResourcesInput,
};
pub use version::{version, PROTOCOL_VERSION};
