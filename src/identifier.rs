//! Deterministic identifier derivation
//!
//! Every record in the registry is keyed by a 32-byte SHA-256 identifier.
//! Two derivation modes exist:
//!
//! | Mode | Preimage |
//! |------|----------|
//! | main | `domain_id ‖ content_hash ‖ account ‖ word(global_counter)` |
//! | sub  | `parent_id ‖ word(parent_counter)` |
//!
//! `word(n)` is the counter as a 32-byte big-endian word. Counters are always
//! taken *after* increment, so the first derivation in any scope uses 1.
//!
//! The functions here are pure. Uniqueness comes from the caller advancing the
//! counter in the same transaction that derives and writes the record
//! (see [`crate::db::counters`]).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::RegistryError;
use crate::types::AgentId;

/// Width of identifiers, content hashes and counter words
pub const DIGEST_LEN: usize = 32;

macro_rules! digest_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; DIGEST_LEN]);

        impl $name {
            /// The all-zero value ("empty")
            pub const ZERO: Self = Self([0u8; DIGEST_LEN]);

            pub fn is_zero(&self) -> bool {
                self.0 == [0u8; DIGEST_LEN]
            }

            pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Parse from hex, with or without a `0x` prefix.
            ///
            /// An empty string parses as [`Self::ZERO`].
            pub fn from_hex(s: &str) -> Result<Self, RegistryError> {
                let trimmed = s.strip_prefix("0x").unwrap_or(s);
                if trimmed.is_empty() {
                    return Ok(Self::ZERO);
                }
                let bytes = hex::decode(trimmed).map_err(|e| {
                    RegistryError::Parse(format!("invalid {} hex: {}", stringify!($name), e))
                })?;
                let arr: [u8; DIGEST_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
                    RegistryError::Parse(format!(
                        "{} must be {} bytes, got {}",
                        stringify!($name),
                        DIGEST_LEN,
                        b.len()
                    ))
                })?;
                Ok(Self(arr))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = RegistryError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

digest_newtype!(
    /// Permanent 32-byte record identifier
    Identifier
);

digest_newtype!(
    /// Fixed-size digest of externally produced content
    ContentHash
);

/// Encode a counter as a 32-byte big-endian word
pub fn counter_word(counter: u64) -> [u8; DIGEST_LEN] {
    let mut word = [0u8; DIGEST_LEN];
    word[DIGEST_LEN - 8..].copy_from_slice(&counter.to_be_bytes());
    word
}

/// Derive the identifier of an independent (main) evidence record
pub fn derive_main(
    domain_id: &[u8],
    content_hash: &ContentHash,
    account: &AgentId,
    counter: u64,
) -> Identifier {
    let mut hasher = Sha256::new();
    hasher.update(domain_id);
    hasher.update(content_hash.as_bytes());
    hasher.update(account.as_str().as_bytes());
    hasher.update(counter_word(counter));
    Identifier(hasher.finalize().into())
}

/// Derive the identifier of a record attached to `parent`
pub fn derive_sub(parent: &Identifier, parent_counter: u64) -> Identifier {
    let mut hasher = Sha256::new();
    hasher.update(parent.as_bytes());
    hasher.update(counter_word(parent_counter));
    Identifier(hasher.finalize().into())
}

/// SHA-256 of arbitrary content, for clients hashing what they submit
pub fn content_digest(data: &[u8]) -> ContentHash {
    ContentHash(Sha256::digest(data).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counter_word_is_big_endian() {
        let word = counter_word(0x0102);
        assert_eq!(&word[..30], &[0u8; 30]);
        assert_eq!(word[30], 0x01);
        assert_eq!(word[31], 0x02);
    }

    #[test]
    fn test_derive_main_matches_manual_preimage() {
        let hash = content_digest(b"file-contents");
        let account = AgentId::new("0xAAA");

        let mut preimage = Vec::new();
        preimage.extend_from_slice(b"domain");
        preimage.extend_from_slice(hash.as_bytes());
        preimage.extend_from_slice(b"0xAAA");
        preimage.extend_from_slice(&counter_word(1));
        let expected = Identifier(Sha256::digest(&preimage).into());

        assert_eq!(derive_main(b"domain", &hash, &account, 1), expected);
    }

    #[test]
    fn test_counter_changes_identifier() {
        let hash = content_digest(b"x");
        let account = AgentId::new("alice");
        let first = derive_main(b"d", &hash, &account, 1);
        let second = derive_main(b"d", &hash, &account, 2);
        assert_ne!(first, second);
        assert_eq!(first, derive_main(b"d", &hash, &account, 1));
    }

    #[test]
    fn test_domain_separates_identifiers() {
        let hash = content_digest(b"x");
        let account = AgentId::new("alice");
        assert_ne!(
            derive_main(b"registry-a", &hash, &account, 1),
            derive_main(b"registry-b", &hash, &account, 1)
        );
    }

    #[test]
    fn test_derive_sub_depends_on_parent_and_counter() {
        let parent_a = Identifier([1u8; 32]);
        let parent_b = Identifier([2u8; 32]);
        assert_ne!(derive_sub(&parent_a, 1), derive_sub(&parent_a, 2));
        assert_ne!(derive_sub(&parent_a, 1), derive_sub(&parent_b, 1));
    }

    #[test]
    fn test_hex_parsing() {
        let id = Identifier([0xab; 32]);
        assert_eq!(Identifier::from_hex(&id.to_hex()).unwrap(), id);
        assert_eq!(Identifier::from_hex(&format!("0x{}", id.to_hex())).unwrap(), id);
        assert_eq!(Identifier::from_hex("").unwrap(), Identifier::ZERO);
        assert!(Identifier::from_hex("abcd").is_err());
        assert!(Identifier::from_hex("zz").is_err());
    }

    #[test]
    fn test_serde_as_hex_string() {
        let hash = content_digest(b"hello");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
