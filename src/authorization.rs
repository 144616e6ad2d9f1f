//! Authorization gate for the mutable resource locator
//!
//! Evidence is immutable except for `resources`, and only the identity that
//! created the record (its provider) may change that field.

use crate::error::RegistryError;
use crate::identifier::Identifier;
use crate::types::AgentId;

/// Check that `caller` may mutate the record `id` whose stored provider is
/// `provider`. A missing record has no provider and never authorizes anyone.
pub fn ensure_provider(
    id: &Identifier,
    provider: Option<&AgentId>,
    caller: &AgentId,
) -> Result<(), RegistryError> {
    match provider {
        Some(provider) if !provider.is_empty() && provider == caller => Ok(()),
        Some(provider) => Err(RegistryError::Unauthorized(format!(
            "{} is not the provider of evidence {} (provider: {})",
            caller, id, provider
        ))),
        None => Err(RegistryError::Unauthorized(format!(
            "evidence {} has no provider; {} may not update it",
            id, caller
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_is_authorized() {
        let id = Identifier([1u8; 32]);
        let alice = AgentId::new("alice");
        assert!(ensure_provider(&id, Some(&alice), &alice).is_ok());
    }

    #[test]
    fn test_other_caller_is_rejected() {
        let id = Identifier([1u8; 32]);
        let err = ensure_provider(&id, Some(&AgentId::new("alice")), &AgentId::new("mallory"))
            .unwrap_err();
        assert!(matches!(err, RegistryError::Unauthorized(_)));
    }

    #[test]
    fn test_missing_record_is_rejected() {
        let id = Identifier([1u8; 32]);
        assert!(matches!(
            ensure_provider(&id, None, &AgentId::new("alice")),
            Err(RegistryError::Unauthorized(_))
        ));
        assert!(matches!(
            ensure_provider(&id, None, &AgentId::default()),
            Err(RegistryError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_empty_provider_authorizes_nobody() {
        let id = Identifier([1u8; 32]);
        let empty = AgentId::default();
        assert!(ensure_provider(&id, Some(&empty), &empty).is_err());
    }
}
