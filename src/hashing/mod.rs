//! Content-addressed ids and client fingerprints.
//!
//! Record ids and fingerprints are BLAKE3-based. Truncation to 64 bits is
//! used only where the consumer tolerates rare collisions (vector point
//! ids); durable identifiers keep the full hex digest.

use blake3::Hasher;

/// Computes the full hex digest of a knowledge record's identity:
/// `provider_tag ∥ url ∥ ordinal`. A `|` separator prevents ambiguity
/// between adjacent fields.
pub fn record_id(provider_tag: &str, url: &str, ordinal: u32) -> String {
    let mut hasher = Hasher::new();
    hasher.update(provider_tag.as_bytes());
    hasher.update(b"|");
    hasher.update(url.as_bytes());
    hasher.update(b"|");
    hasher.update(&ordinal.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Record id for items without a URL: the body stands in for the URL in
/// the identity tuple.
pub fn record_id_from_body(provider_tag: &str, body: &str, ordinal: u32) -> String {
    let mut hasher = Hasher::new();
    hasher.update(provider_tag.as_bytes());
    hasher.update(b"|");
    hasher.update(body.as_bytes());
    hasher.update(b"|");
    hasher.update(&ordinal.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Truncates arbitrary bytes to a 64-bit id. Used for vector-store point
/// ids, where a collision degrades to a replaced point rather than data
/// corruption.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let bytes: [u8; 8] = hash.as_bytes()[0..8]
        .try_into()
        .expect("BLAKE3 always produces at least 8 bytes");
    u64::from_le_bytes(bytes)
}

/// Derives the vector-store point id for a record id string.
#[inline]
pub fn point_id(record_id: &str) -> u64 {
    hash_to_u64(record_id.as_bytes())
}

/// Anonymous client fingerprint: first 16 hex chars of the hash of the
/// peer address (or an authenticated user id when one is supplied).
pub fn client_fingerprint(peer: &str) -> String {
    let hex = blake3::hash(peer.as_bytes()).to_hex().to_string();
    hex[..16].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn record_ids_are_deterministic() {
        let a = record_id("newsapi", "https://example.com/a", 0);
        let b = record_id("newsapi", "https://example.com/a", 0);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn record_ids_distinguish_fields() {
        let ids = [
            record_id("newsapi", "https://example.com/a", 0),
            record_id("newsapi", "https://example.com/a", 1),
            record_id("rss", "https://example.com/a", 0),
            record_id("newsapi", "https://example.com/b", 0),
        ];
        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn separator_prevents_field_ambiguity() {
        let a = record_id("ab", "c", 0);
        let b = record_id("a", "bc", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn url_less_id_depends_on_body_and_ordinal() {
        let a = record_id_from_body("social", "post one", 0);
        let b = record_id_from_body("social", "post two", 0);
        assert_ne!(a, b);
        assert_ne!(a, record_id_from_body("social", "post one", 1));
        assert_eq!(a, record_id_from_body("social", "post one", 0));
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let fp = client_fingerprint("203.0.113.9");
        assert_eq!(fp.len(), 16);
        assert_eq!(fp, client_fingerprint("203.0.113.9"));
        assert_ne!(fp, client_fingerprint("203.0.113.10"));
    }
}
