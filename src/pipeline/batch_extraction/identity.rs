//! Content-derived identities.
//!
//! Both ids are the first 20 hex characters of a SHA-256 digest, so they are
//! stable across processes, platforms and re-runs.

use sha2::{Digest, Sha256};

use crate::models::FeatureType;

/// Width of every derived id, in hex characters.
pub const ID_HEX_LEN: usize = 20;

/// Unit separator between hashed fields; cannot occur in normalized names.
const FIELD_SEPARATOR: char = '\u{1f}';

/// Identity of one feature fact.
pub fn feature_id(
    document_id: &str,
    feature_type: FeatureType,
    feature_name: &str,
    feature_value: &str,
) -> String {
    let mut hasher = Sha256::new();
    let fields = [document_id, feature_type.as_str(), feature_name, feature_value];
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            let mut buf = [0u8; 4];
            hasher.update(FIELD_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(field.as_bytes());
    }
    truncate(&hasher.finalize())
}

/// Identity of a raw note, derived from where it is stored.
pub fn document_id_for_location(location: &str) -> String {
    truncate(&Sha256::digest(location.as_bytes()))
}

fn truncate(digest: &[u8]) -> String {
    let mut id = hex::encode(digest);
    id.truncate(ID_HEX_LEN);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_id_known_vector() {
        assert_eq!(
            feature_id("D1", FeatureType::Risk, "risk_score", "0.3"),
            "e1bad003cb4c6bf32688"
        );
    }

    #[test]
    fn document_id_known_vector() {
        assert_eq!(
            document_id_for_location("/notes/CUST_1_note_20210614.json"),
            "9e4ba276ba70fbf50f87"
        );
    }

    #[test]
    fn feature_id_is_deterministic() {
        let a = feature_id("doc", FeatureType::Symptom, "fever", "0.8");
        let b = feature_id("doc", FeatureType::Symptom, "fever", "0.8");
        assert_eq!(a, b);
        assert_eq!(a.len(), ID_HEX_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn every_field_participates() {
        let base = feature_id("doc", FeatureType::Symptom, "fever", "0.8");
        assert_ne!(base, feature_id("doc2", FeatureType::Symptom, "fever", "0.8"));
        assert_ne!(base, feature_id("doc", FeatureType::Risk, "fever", "0.8"));
        assert_ne!(base, feature_id("doc", FeatureType::Symptom, "cough", "0.8"));
        assert_ne!(base, feature_id("doc", FeatureType::Symptom, "fever", "0.9"));
    }

    #[test]
    fn separator_prevents_field_shifting() {
        assert_ne!(
            feature_id("ab", FeatureType::Diagnosis, "c", "d"),
            feature_id("a", FeatureType::Diagnosis, "bc", "d")
        );
    }
}
