//! Global and per-parent counters
//!
//! A counter is only ever advanced by [`advance`] inside the transaction that
//! also derives and stores the record consuming the new value. Two records can
//! therefore never observe the same counter value.

use sled::transaction::{ConflictableTransactionError, ConflictableTransactionResult, TransactionalTree};
use sled::IVec;

use super::RegistryDb;
use crate::error::RegistryError;
use crate::identifier::{derive_sub, Identifier};

/// Key of the global submission counter in the `meta` tree
pub const GLOBAL_COUNTER_KEY: &[u8] = b"global_counter";

/// Read-increment-write `key` in `tree`, returning the post-increment value
pub fn advance(
    tree: &TransactionalTree,
    key: &[u8],
) -> ConflictableTransactionResult<u64, RegistryError> {
    let current = decode(tree.get(key)?).map_err(ConflictableTransactionError::Abort)?;
    let next = current.checked_add(1).ok_or_else(|| {
        ConflictableTransactionError::Abort(RegistryError::Internal(format!(
            "counter {} overflowed",
            hex::encode(key)
        )))
    })?;
    tree.insert(key, next.to_be_bytes().to_vec())?;
    Ok(next)
}

/// Decode a stored counter, treating a missing entry as 0
pub fn decode(bytes: Option<IVec>) -> Result<u64, RegistryError> {
    match bytes {
        None => Ok(0),
        Some(bytes) => {
            let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                RegistryError::Serialization(format!("corrupt counter of {} bytes", bytes.len()))
            })?;
            Ok(u64::from_be_bytes(arr))
        }
    }
}

impl RegistryDb {
    /// Number of main submissions made so far
    pub fn global_counter(&self) -> Result<u64, RegistryError> {
        decode(self.meta.get(GLOBAL_COUNTER_KEY)?)
    }

    /// Number of records attached under `parent` so far
    pub fn extra_count(&self, parent: &Identifier) -> Result<u64, RegistryError> {
        decode(self.counters.get(parent.as_bytes())?)
    }

    /// Identifiers derived under `parent`, in attachment order
    ///
    /// Recomputed from the counter rather than stored, since sub identifiers
    /// depend only on the parent and the counter value.
    pub fn attachment_ids(&self, parent: &Identifier) -> Result<Vec<Identifier>, RegistryError> {
        let count = self.extra_count(parent)?;
        Ok((1..=count).map(|n| derive_sub(parent, n)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_missing_is_zero() {
        assert_eq!(decode(None).unwrap(), 0);
    }

    #[test]
    fn test_decode_round_trip() {
        let bytes = IVec::from(&42u64.to_be_bytes()[..]);
        assert_eq!(decode(Some(bytes)).unwrap(), 42);
    }

    #[test]
    fn test_decode_rejects_corrupt_value() {
        let bytes = IVec::from(&[1u8, 2, 3][..]);
        assert!(matches!(decode(Some(bytes)), Err(RegistryError::Serialization(_))));
    }

    #[test]
    fn test_advance_in_transaction() {
        let db = RegistryDb::open_temporary().unwrap();
        let parent = Identifier([9u8; 32]);

        for expected in 1..=3u64 {
            let value: u64 = db
                .counters
                .transaction(|tx| advance(tx, parent.as_bytes()))
                .map_err(RegistryError::from)
                .unwrap();
            assert_eq!(value, expected);
        }

        assert_eq!(db.extra_count(&parent).unwrap(), 3);
        assert_eq!(db.attachment_ids(&parent).unwrap().len(), 3);
        assert_eq!(db.attachment_ids(&parent).unwrap()[0], derive_sub(&parent, 1));
    }
}
