//! Property tests for the hashing multiplexer and literal safety.

use std::io::{Cursor, Read};

use proptest::prelude::*;

use descry::hash::{digest_bytes, HashAlgorithmId, HashStream};
use descry::rdf::is_safe_string;

const ALGOS: [HashAlgorithmId; 3] = [
    HashAlgorithmId::Md5,
    HashAlgorithmId::Sha256,
    HashAlgorithmId::Blake3,
];

proptest! {
    /// Digests equal a direct computation no matter how much of the stream
    /// the consumer reads, and the stream is read once.
    #[test]
    fn digests_match_direct_compute(
        data in proptest::collection::vec(any::<u8>(), 0..8192),
        head_cap in 1usize..4096,
        consume in 0usize..8192,
    ) {
        let mut hs = HashStream::open(Cursor::new(data.clone()), &ALGOS, head_cap);
        let _ = hs.read_head(head_cap).unwrap();

        let mut sink = vec![0u8; consume.min(data.len())];
        if !sink.is_empty() {
            hs.read_exact(&mut sink).unwrap();
            prop_assert_eq!(&sink[..], &data[..sink.len()]);
        }

        let digests = hs.finalize().unwrap();
        prop_assert_eq!(digests.total(), data.len() as u64);
        for algo in ALGOS {
            let expected = digest_bytes(algo, &data);
            prop_assert_eq!(
                digests.get(algo).unwrap(),
                expected.as_ref()
            );
        }
    }

    /// Rewinding inside the head window never perturbs the digests.
    #[test]
    fn rewind_does_not_double_feed(
        data in proptest::collection::vec(any::<u8>(), 1..4096),
        rewinds in 1usize..5,
    ) {
        let head_cap = data.len().min(1024);
        let mut hs = HashStream::open(Cursor::new(data.clone()), &ALGOS, head_cap);
        for _ in 0..rewinds {
            let take = head_cap.min(data.len());
            let mut buf = vec![0u8; take];
            hs.read_exact(&mut buf).unwrap();
            hs.rewind().unwrap();
        }
        let digests = hs.finalize().unwrap();
        for algo in ALGOS {
            let expected = digest_bytes(algo, &data);
            prop_assert_eq!(
                digests.get(algo).unwrap(),
                expected.as_ref()
            );
        }
    }

    /// Content-addressed URIs are pure functions of the bytes.
    #[test]
    fn content_uris_are_deterministic(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
        for algo in ALGOS {
            let a = algo.uri_for(&digest_bytes(algo, &data));
            let b = algo.uri_for(&digest_bytes(algo, &data));
            prop_assert_eq!(&a, &b);
            prop_assert!(a.is_ascii());
            prop_assert!(!a.contains(' '));
        }
    }

    /// Every string is either safe to emit directly or wrapped losslessly.
    #[test]
    fn literal_safety_is_total(s in ".*") {
        if is_safe_string(&s) {
            // Safe strings contain no raw controls besides whitespace.
            prop_assert!(!s.chars().any(|c| (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r')));
        } else {
            let wrapped = serde_json::json!({ "@value": s }).to_string();
            let back: serde_json::Value = serde_json::from_str(&wrapped).unwrap();
            prop_assert_eq!(back["@value"].as_str().unwrap(), s.as_str());
        }
    }
}
