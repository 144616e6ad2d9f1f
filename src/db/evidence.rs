//! Evidence records
//!
//! Main records derive their identifier from the global counter; attached
//! records (with a `link`) derive theirs from the parent's attachment counter.

use serde::{Deserialize, Serialize};
use sled::transaction::{abort, ConflictableTransactionError};
use sled::Transactional;
use tracing::debug;

use super::counters::{self, GLOBAL_COUNTER_KEY};
use super::{encode_tx, RegistryDb};
use crate::authorization::ensure_provider;
use crate::error::RegistryError;
use crate::identifier::{derive_main, derive_sub, ContentHash, Identifier};
use crate::types::{AgentId, Evidence, Signature, SubmitEvidenceInput};

/// Stored form of an evidence record
///
/// The attachment counter lives in the `counters` tree, so it can exist for
/// parents that were never submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EvidenceEntry {
    id: Identifier,
    header: String,
    link: Option<Identifier>,
    prior_refs: Vec<Identifier>,
    content_hash: ContentHash,
    account: AgentId,
    signature: Signature,
    payload: String,
    resources: String,
    provider: AgentId,
}

impl EvidenceEntry {
    fn into_evidence(self, extra_count: u64) -> Evidence {
        Evidence {
            id: self.id,
            header: self.header,
            link: self.link,
            prior_refs: self.prior_refs,
            content_hash: self.content_hash,
            account: self.account,
            signature: self.signature,
            payload: self.payload,
            resources: self.resources,
            provider: self.provider,
            extra_count,
        }
    }
}

impl RegistryDb {
    /// Store a new evidence record and return its identifier
    ///
    /// Callers validate the input first; this only refuses a zero content
    /// hash as a last line before the write.
    pub fn insert_evidence(
        &self,
        domain_id: &[u8],
        input: &SubmitEvidenceInput,
        caller: &AgentId,
    ) -> Result<Identifier, RegistryError> {
        if input.content_hash.is_zero() {
            return Err(RegistryError::Validation("content hash must not be zero".into()));
        }
        let parent = input.parent();

        let id = (&self.evidence, &self.counters, &self.meta).transaction(
            |(evidence, counters, meta)| {
                let id = match parent {
                    Some(parent) => {
                        let n = counters::advance(counters, parent.as_bytes())?;
                        derive_sub(&parent, n)
                    }
                    None => {
                        let n = counters::advance(meta, GLOBAL_COUNTER_KEY)?;
                        derive_main(domain_id, &input.content_hash, &input.account, n)
                    }
                };

                if evidence.get(id.as_bytes())?.is_some() {
                    return abort(RegistryError::Internal(format!(
                        "identifier {} already assigned",
                        id
                    )));
                }

                let entry = EvidenceEntry {
                    id,
                    header: input.header.clone(),
                    link: parent,
                    prior_refs: input.prior_refs.clone(),
                    content_hash: input.content_hash,
                    account: input.account.clone(),
                    signature: input.signature.clone(),
                    payload: input.payload.clone(),
                    resources: String::new(),
                    provider: caller.clone(),
                };
                evidence.insert(id.as_bytes().as_slice(), encode_tx(&entry)?)?;
                Ok(id)
            },
        )?;

        debug!(id = %id, attached = parent.is_some(), "Inserted evidence");
        Ok(id)
    }

    /// Get an evidence record with its current attachment count
    pub fn get_evidence(&self, id: &Identifier) -> Result<Option<Evidence>, RegistryError> {
        match self.evidence.get(id.as_bytes())? {
            Some(bytes) => {
                let entry: EvidenceEntry = rmp_serde::from_slice(&bytes)?;
                let extra_count = self.extra_count(id)?;
                Ok(Some(entry.into_evidence(extra_count)))
            }
            None => Ok(None),
        }
    }

    /// Replace the resource locator of `id` if `caller` is its provider
    ///
    /// The provider check runs inside the transaction, so a rejected update
    /// never writes.
    pub fn set_resources(
        &self,
        id: &Identifier,
        resources: &str,
        caller: &AgentId,
    ) -> Result<Evidence, RegistryError> {
        let entry = self.evidence.transaction(|evidence| {
            let stored: Option<EvidenceEntry> = evidence
                .get(id.as_bytes())?
                .map(|bytes| rmp_serde::from_slice(&bytes))
                .transpose()
                .map_err(|e| ConflictableTransactionError::Abort(RegistryError::from(e)))?;

            let gate = ensure_provider(id, stored.as_ref().map(|entry| &entry.provider), caller);
            match (stored, gate) {
                (Some(mut entry), Ok(())) => {
                    entry.resources = resources.to_string();
                    evidence.insert(id.as_bytes().as_slice(), encode_tx(&entry)?)?;
                    Ok(entry)
                }
                (_, Err(e)) => abort(e),
                (None, Ok(())) => abort(RegistryError::Internal(format!(
                    "evidence {} authorized without a record",
                    id
                ))),
            }
        })?;

        let extra_count = self.extra_count(id)?;
        Ok(entry.into_evidence(extra_count))
    }

    /// Number of stored evidence records
    pub fn evidence_count(&self) -> usize {
        self.evidence.len()
    }
}
