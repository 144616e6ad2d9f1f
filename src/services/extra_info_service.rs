//! Extra-info service - side-channel records attached to evidence

use std::sync::Arc;

use tracing::info;

use crate::db::RegistryDb;
use crate::error::RegistryError;
use crate::identifier::Identifier;
use crate::types::{AgentId, AttachExtraInfoInput, ExtraInfo};

use super::events::{EventBus, RegistryEvent};

/// Extra-info service
pub struct ExtraInfoService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
}

impl ExtraInfoService {
    pub fn new(db: Arc<RegistryDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Attach a record under `parent`, which need not exist
    pub fn attach(
        &self,
        parent: &Identifier,
        input: AttachExtraInfoInput,
        caller: &AgentId,
    ) -> Result<Identifier, RegistryError> {
        if caller.is_empty() {
            return Err(RegistryError::InvalidInput("caller identity is required".into()));
        }

        self.events.commit_and_emit(|| {
            let (id, count) = self.db.insert_extra_info(parent, &input, caller)?;

            info!(id = %id, parent = %parent, extra_count = count, provider = %caller, "Extra info attached");

            let event = RegistryEvent::ExtraInfoAttached {
                id,
                parent: *parent,
                hash: input.hash,
                account: input.account.clone(),
                signature: input.signature.clone(),
                provider: caller.clone(),
            };
            Ok((id, event))
        })
    }

    /// Fetch extra info, returning the zero-valued sentinel for unknown ids
    pub fn fetch(&self, id: &Identifier) -> Result<ExtraInfo, RegistryError> {
        Ok(self.get(id)?.unwrap_or_default())
    }

    /// Get extra info by identifier
    pub fn get(&self, id: &Identifier) -> Result<Option<ExtraInfo>, RegistryError> {
        self.db.get_extra_info(id)
    }
}
