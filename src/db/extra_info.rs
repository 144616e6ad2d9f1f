//! Extra-info records attached to a parent evidence
//!
//! Attachment shares the parent's counter with linked evidence, so sub
//! identifiers under one parent never collide across the two record kinds.
//! The parent is not required to exist.

use sled::transaction::abort;
use sled::Transactional;
use tracing::debug;

use super::counters;
use super::{encode_tx, RegistryDb};
use crate::error::RegistryError;
use crate::identifier::{derive_sub, Identifier};
use crate::types::{AgentId, AttachExtraInfoInput, ExtraInfo};

impl RegistryDb {
    /// Store a new extra-info record under `parent`
    ///
    /// Returns the new identifier and the parent's post-increment count.
    pub fn insert_extra_info(
        &self,
        parent: &Identifier,
        input: &AttachExtraInfoInput,
        caller: &AgentId,
    ) -> Result<(Identifier, u64), RegistryError> {
        let (id, count) = (&self.extra_info, &self.counters).transaction(|(extra_info, counters)| {
            let n = counters::advance(counters, parent.as_bytes())?;
            let id = derive_sub(parent, n);

            if extra_info.get(id.as_bytes())?.is_some() {
                return abort(RegistryError::Internal(format!(
                    "identifier {} already assigned",
                    id
                )));
            }

            let record = ExtraInfo {
                id,
                parent: *parent,
                account: input.account.clone(),
                signature: input.signature.clone(),
                hash: input.hash,
                payload: input.payload.clone(),
                provider: caller.clone(),
            };
            extra_info.insert(id.as_bytes().as_slice(), encode_tx(&record)?)?;
            Ok((id, n))
        })?;

        debug!(id = %id, parent = %parent, count, "Inserted extra info");
        Ok((id, count))
    }

    /// Get an extra-info record
    pub fn get_extra_info(&self, id: &Identifier) -> Result<Option<ExtraInfo>, RegistryError> {
        match self.extra_info.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(rmp_serde::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of stored extra-info records
    pub fn extra_info_count(&self) -> usize {
        self.extra_info.len()
    }
}
