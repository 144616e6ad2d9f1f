//! Evidence service - submission, queries and locator updates
//!
//! Validation runs before the store transaction, events are emitted only
//! after it commits.

use std::sync::Arc;

use tracing::{info, warn};

use crate::db::RegistryDb;
use crate::error::RegistryError;
use crate::identifier::Identifier;
use crate::types::{AgentId, Evidence, SubmitEvidenceInput, UpdateResourcesInput};

use super::events::{EventBus, RegistryEvent};

/// Evidence service for business logic
pub struct EvidenceService {
    db: Arc<RegistryDb>,
    events: Arc<EventBus>,
    domain_id: Vec<u8>,
}

impl EvidenceService {
    /// Create a new evidence service deriving main identifiers under `domain_id`
    pub fn new(db: Arc<RegistryDb>, events: Arc<EventBus>, domain_id: impl Into<Vec<u8>>) -> Self {
        Self {
            db,
            events,
            domain_id: domain_id.into(),
        }
    }

    // =========================================================================
    // Read Operations
    // =========================================================================

    /// Fetch evidence, returning the zero-valued sentinel for unknown ids
    ///
    /// Check [`Evidence::is_empty`] to tell a miss apart; use [`Self::get`]
    /// for an explicit `Option`.
    pub fn fetch(&self, id: &Identifier) -> Result<Evidence, RegistryError> {
        Ok(self.get(id)?.unwrap_or_default())
    }

    /// Get evidence by identifier
    pub fn get(&self, id: &Identifier) -> Result<Option<Evidence>, RegistryError> {
        self.db.get_evidence(id)
    }

    /// Identifiers attached under `id` so far, oldest first
    pub fn attachments(&self, id: &Identifier) -> Result<Vec<Identifier>, RegistryError> {
        self.db.attachment_ids(id)
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Submit a new evidence record on behalf of `caller`
    ///
    /// Identical submissions always produce distinct identifiers.
    pub fn submit(
        &self,
        input: SubmitEvidenceInput,
        caller: &AgentId,
    ) -> Result<Identifier, RegistryError> {
        self.validate_submission(&input, caller)?;

        self.events.commit_and_emit(|| {
            let id = self.db.insert_evidence(&self.domain_id, &input, caller)?;

            info!(
                id = %id,
                content_hash = %input.content_hash,
                account = %input.account,
                provider = %caller,
                attached = input.parent().is_some(),
                "Evidence submitted"
            );

            let event = RegistryEvent::EvidenceSubmitted {
                id,
                link: input.parent(),
                content_hash: input.content_hash,
                account: input.account.clone(),
                signature: input.signature.clone(),
                provider: caller.clone(),
            };
            Ok((id, event))
        })
    }

    /// Replace the resource locator; only the record's provider may do this
    pub fn update_resources(
        &self,
        id: &Identifier,
        input: UpdateResourcesInput,
        caller: &AgentId,
    ) -> Result<Evidence, RegistryError> {
        self.events.commit_and_emit(|| {
            let evidence = match self.db.set_resources(id, &input.resources, caller) {
                Ok(evidence) => evidence,
                Err(e) => {
                    if matches!(e, RegistryError::Unauthorized(_)) {
                        warn!(id = %id, caller = %caller, "Rejected resources update");
                    }
                    return Err(e);
                }
            };

            info!(id = %id, resources = %evidence.resources, "Resources updated");

            let event = RegistryEvent::ResourcesUpdated {
                id: *id,
                content_hash: evidence.content_hash,
                resources: evidence.resources.clone(),
                account: input.account.clone(),
                signature: input.signature.clone(),
                provider: evidence.provider.clone(),
            };
            Ok((evidence, event))
        })
    }

    // =========================================================================
    // Validation
    // =========================================================================

    fn validate_submission(
        &self,
        input: &SubmitEvidenceInput,
        caller: &AgentId,
    ) -> Result<(), RegistryError> {
        if caller.is_empty() {
            return Err(RegistryError::InvalidInput("caller identity is required".into()));
        }
        if input.content_hash.is_zero() {
            return Err(RegistryError::Validation("content hash is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::{content_digest, derive_main, derive_sub, ContentHash};
    use crate::types::Signature;

    fn service() -> (EvidenceService, Arc<EventBus>) {
        let db = Arc::new(RegistryDb::open_temporary().unwrap());
        let events = Arc::new(EventBus::new());
        (EvidenceService::new(db, events.clone(), "test-domain"), events)
    }

    fn submission() -> SubmitEvidenceInput {
        SubmitEvidenceInput {
            header: "{\"schema\":\"scan\"}".into(),
            content_hash: content_digest(b"file-contents"),
            account: AgentId::new("0xAAA"),
            signature: Signature(vec![0xaa, 0xbb]),
            payload: "{\"size\":13}".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_submissions_get_consecutive_counters() {
        let (service, _) = service();
        let caller = AgentId::new("caller");
        let hash = content_digest(b"file-contents");
        let account = AgentId::new("0xAAA");

        let first = service.submit(submission(), &caller).unwrap();
        let second = service.submit(submission(), &caller).unwrap();

        assert_eq!(first, derive_main(b"test-domain", &hash, &account, 1));
        assert_eq!(second, derive_main(b"test-domain", &hash, &account, 2));
        assert_ne!(first, second);
    }

    #[test]
    fn test_zero_hash_rejected() {
        let (service, events) = service();
        let mut rx = events.subscribe();
        let mut input = submission();
        input.content_hash = ContentHash::ZERO;

        let err = service.submit(input, &AgentId::new("caller")).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_fetch_unknown_returns_sentinel() {
        let (service, _) = service();
        let id = Identifier([4u8; 32]);
        let evidence = service.fetch(&id).unwrap();
        assert!(evidence.is_empty());
        assert_eq!(evidence, Evidence::default());
        assert!(service.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_submit_emits_event() {
        let (service, events) = service();
        let mut rx = events.subscribe();
        let caller = AgentId::new("caller");

        let id = service.submit(submission(), &caller).unwrap();

        match rx.try_recv().unwrap() {
            RegistryEvent::EvidenceSubmitted { id: event_id, link, provider, .. } => {
                assert_eq!(event_id, id);
                assert_eq!(link, None);
                assert_eq!(provider, caller);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_update_resources_only_by_provider() {
        let (service, events) = service();
        let owner = AgentId::new("owner");
        let id = service.submit(submission(), &owner).unwrap();
        let mut rx = events.subscribe();

        let update = UpdateResourcesInput {
            resources: "https://mirror.example/file".into(),
            account: AgentId::new("0xAAA"),
            signature: Signature(vec![1]),
        };

        let err = service
            .update_resources(&id, update.clone(), &AgentId::new("intruder"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));
        assert_eq!(service.fetch(&id).unwrap().resources, "");
        assert!(rx.try_recv().is_err());

        let updated = service.update_resources(&id, update, &owner).unwrap();
        assert_eq!(updated.resources, "https://mirror.example/file");
        assert_eq!(updated.content_hash, content_digest(b"file-contents"));
        match rx.try_recv().unwrap() {
            RegistryEvent::ResourcesUpdated { content_hash, resources, provider, .. } => {
                assert_eq!(content_hash, content_digest(b"file-contents"));
                assert_eq!(resources, "https://mirror.example/file");
                assert_eq!(provider, owner);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_empty_caller_rejected_before_write() {
        let (service, events) = service();
        let mut rx = events.subscribe();

        let err = service.submit(submission(), &AgentId::default()).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));
        assert!(rx.try_recv().is_err());

        // The counter was not consumed
        let id = service.submit(submission(), &AgentId::new("caller")).unwrap();
        let expected = derive_main(
            b"test-domain",
            &content_digest(b"file-contents"),
            &AgentId::new("0xAAA"),
            1,
        );
        assert_eq!(id, expected);
    }

    #[test]
    fn test_provider_can_always_update_own_record() {
        let (service, _) = service();
        let owner = AgentId::new("owner");
        let id = service.submit(submission(), &owner).unwrap();

        let update = UpdateResourcesInput {
            resources: "first".into(),
            ..Default::default()
        };
        service.update_resources(&id, update, &owner).unwrap();
        let update = UpdateResourcesInput {
            resources: "second".into(),
            ..Default::default()
        };
        let updated = service.update_resources(&id, update, &owner).unwrap();
        assert_eq!(updated.resources, "second");
        assert_eq!(updated.provider, owner);
    }

    #[test]
    fn test_chained_submission_and_attachments() {
        let (service, events) = service();
        let caller = AgentId::new("caller");
        let parent = service.submit(submission(), &caller).unwrap();

        let mut child = submission();
        child.link = Some(parent);
        child.prior_refs = vec![Identifier([0xee; 32])];
        let mut rx = events.subscribe();
        let child_id = service.submit(child, &caller).unwrap();

        assert_eq!(child_id, derive_sub(&parent, 1));
        match rx.try_recv().unwrap() {
            RegistryEvent::EvidenceSubmitted { id, link, .. } => {
                assert_eq!(id, child_id);
                assert_eq!(link, Some(parent));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(service.attachments(&parent).unwrap(), vec![child_id]);

        let stored = service.fetch(&child_id).unwrap();
        assert!(stored.is_attached());
        assert_eq!(stored.prior_refs, vec![Identifier([0xee; 32])]);
        assert_eq!(service.fetch(&parent).unwrap().extra_count, 1);
    }
}
