//! Record types stored in the registry

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::identifier::{ContentHash, Identifier};

/// Opaque identity of an account or a calling agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Opaque signature bytes, never verified here. Hex on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signature(pub Vec<u8>);

impl Signature {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&[u8]> for Signature {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(&self.0))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let trimmed = s.strip_prefix("0x").unwrap_or(&s);
        hex::decode(trimmed)
            .map(Signature)
            .map_err(serde::de::Error::custom)
    }
}

/// An evidence record
///
/// `Evidence::default()` is the zero-valued sentinel returned for unknown
/// identifiers by [`crate::services::EvidenceService::fetch`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Evidence {
    pub id: Identifier,
    pub header: String,
    /// Main/parent evidence this record is attached to (None = main record)
    pub link: Option<Identifier>,
    /// Earlier evidence this record follows from (advisory, never checked)
    pub prior_refs: Vec<Identifier>,
    pub content_hash: ContentHash,
    pub account: AgentId,
    pub signature: Signature,
    pub payload: String,
    /// Mutable resource locator, only the provider may change it
    pub resources: String,
    /// Caller that created the record
    pub provider: AgentId,
    /// Number of records attached under this evidence so far
    pub extra_count: u64,
}

impl Evidence {
    /// True for the not-found sentinel
    pub fn is_empty(&self) -> bool {
        self.content_hash.is_zero()
    }

    /// True when this record was derived under a parent
    pub fn is_attached(&self) -> bool {
        self.link.is_some()
    }
}

/// Side-channel operation record attached to a parent evidence
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExtraInfo {
    pub id: Identifier,
    pub parent: Identifier,
    pub account: AgentId,
    pub signature: Signature,
    /// Hash of the operation being recorded
    pub hash: ContentHash,
    pub payload: String,
    pub provider: AgentId,
}

impl ExtraInfo {
    /// True for the not-found sentinel
    pub fn is_empty(&self) -> bool {
        self.id.is_zero()
    }
}

/// Input for submitting evidence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmitEvidenceInput {
    #[serde(default)]
    pub header: String,
    /// Parent reference; absent or zero submits a main record
    #[serde(default)]
    pub link: Option<Identifier>,
    #[serde(default)]
    pub prior_refs: Vec<Identifier>,
    #[serde(default)]
    pub content_hash: ContentHash,
    pub account: AgentId,
    #[serde(default)]
    pub signature: Signature,
    #[serde(default)]
    pub payload: String,
}

impl SubmitEvidenceInput {
    /// The parent reference with the zero identifier folded into `None`
    pub fn parent(&self) -> Option<Identifier> {
        self.link.filter(|id| !id.is_zero())
    }
}

/// Input for replacing an evidence's resource locator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateResourcesInput {
    pub resources: String,
    #[serde(default)]
    pub account: AgentId,
    #[serde(default)]
    pub signature: Signature,
}

/// Input for attaching extra info to a parent evidence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachExtraInfoInput {
    pub account: AgentId,
    #[serde(default)]
    pub signature: Signature,
    #[serde(default)]
    pub hash: ContentHash,
    #[serde(default)]
    pub payload: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_empty() {
        assert!(Evidence::default().is_empty());
        assert!(ExtraInfo::default().is_empty());
    }

    #[test]
    fn test_zero_link_means_main_record() {
        let input = SubmitEvidenceInput {
            link: Some(Identifier::ZERO),
            ..Default::default()
        };
        assert_eq!(input.parent(), None);

        let parent = Identifier([7u8; 32]);
        let input = SubmitEvidenceInput {
            link: Some(parent),
            ..Default::default()
        };
        assert_eq!(input.parent(), Some(parent));
    }

    #[test]
    fn test_submit_input_from_json() {
        let json = r#"{
            "header": "{\"kind\":\"scan\"}",
            "content_hash": "0x0101010101010101010101010101010101010101010101010101010101010101",
            "account": "0xAAA",
            "signature": "deadbeef",
            "payload": "data"
        }"#;
        let input: SubmitEvidenceInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.content_hash, ContentHash([1u8; 32]));
        assert_eq!(input.account.as_str(), "0xAAA");
        assert_eq!(input.signature.as_bytes(), &[0xde, 0xad, 0xbe, 0xef]);
        assert!(input.link.is_none());
        assert!(input.prior_refs.is_empty());
    }

    #[test]
    fn test_missing_content_hash_defaults_to_zero() {
        let input: SubmitEvidenceInput = serde_json::from_str(r#"{"account": "a"}"#).unwrap();
        assert!(input.content_hash.is_zero());
    }
}
