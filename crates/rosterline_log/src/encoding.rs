//! Canonical encoding for byte-stable digests and comparisons.
//!
//! Uses postcard for byte-stable encoding.

use rosterline_core::{CoreError, CoreResult, Digest};
use serde::Serialize;

/// Trait for canonical serialization
pub trait CanonicalEncode: Serialize {
    /// Encode to canonical bytes
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be encoded
    fn encode(&self) -> CoreResult<Vec<u8>> {
        postcard::to_allocvec(self).map_err(CoreError::from)
    }

    /// Digest of the canonical bytes
    ///
    /// # Errors
    ///
    /// Returns error if the value cannot be encoded
    fn digest(&self) -> CoreResult<Digest> {
        self.encode().map(|bytes| Digest::compute(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct TestStruct {
        a: u64,
        b: String,
        c: Vec<u32>,
    }

    impl CanonicalEncode for TestStruct {}

    #[test]
    fn test_encode_is_postcard() {
        let value = TestStruct {
            a: 42,
            b: "hello".to_string(),
            c: vec![1, 2, 3],
        };

        let encoded = value.encode().unwrap();
        let decoded: TestStruct = postcard::from_bytes(&encoded).unwrap();
        assert_eq!(value, decoded);
        assert_eq!(value.digest().unwrap(), Digest::compute(&encoded));
    }

    #[test]
    fn test_digest_tracks_content() {
        let a = TestStruct { a: 1, b: "x".to_string(), c: vec![] };
        let b = TestStruct { a: 2, b: "x".to_string(), c: vec![] };
        assert_eq!(a.digest().unwrap(), a.clone().digest().unwrap());
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
    }

    proptest::proptest! {
        #[test]
        fn prop_encode_deterministic(a: u64, b: String, c: Vec<u32>) {
            let value = TestStruct { a, b, c };
            prop_assert_eq!(value.encode().unwrap(), value.encode().unwrap());
        }
    }
}
