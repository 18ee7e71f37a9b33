//! Identifier normalization
//!
//! Documents may carry their identity either as a canonical `ObjectId` or as the
//! 24-character lowercase hex text of one. Every identifier that reaches a store
//! operation goes through [`normalize_id`] first, so both forms compare equal.
//!
//! Only lowercase hex is recognized. Anything else (custom string ids, integers,
//! uppercase hex) is a legitimate caller-chosen id and passes through untouched.

use bson::{oid::ObjectId, Bson, Document as BsonDocument};
use once_cell::sync::Lazy;
use regex::Regex;

/// Field holding a document's identity
pub const ID_FIELD: &str = "_id";

static OBJECT_ID_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{24}$").unwrap());

/// Checks if a string is the textual form of an ObjectId (24 lowercase hex characters)
pub fn is_object_id_hex(value: &str) -> bool {
    OBJECT_ID_HEX.is_match(value)
}

/// Converts a textual ObjectId into its canonical form.
///
/// Total and pure: values that are not a 24-lowercase-hex string are returned as-is,
/// including values that are already `Bson::ObjectId`.
pub fn normalize_id(value: Bson) -> Bson {
    match value {
        Bson::String(text) if is_object_id_hex(&text) => match ObjectId::parse_str(&text) {
            Ok(oid) => Bson::ObjectId(oid),
            Err(_) => Bson::String(text),
        },
        other => other,
    }
}

/// Returns a copy of `document` with its `_id` normalized.
///
/// The input is never mutated. A document without `_id` is copied unchanged.
pub fn normalize_document_id(document: &BsonDocument) -> BsonDocument {
    let mut normalized = document.clone();
    if let Some(id) = normalized.get_mut(ID_FIELD) {
        *id = normalize_id(std::mem::replace(id, Bson::Null));
    }
    normalized
}

/// Reads the normalized `_id` of a document, `Bson::Null` when absent.
pub fn document_id(document: &BsonDocument) -> Bson {
    document
        .get(ID_FIELD)
        .cloned()
        .map(normalize_id)
        .unwrap_or(Bson::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    const HEX: &str = "5f1d7f3e9c1b2a3d4e5f6a7b";

    #[test]
    fn test_hex_string_becomes_object_id() {
        let normalized = normalize_id(Bson::String(HEX.to_string()));
        assert_eq!(normalized, Bson::ObjectId(ObjectId::parse_str(HEX).unwrap()));
    }

    #[test]
    fn test_textual_and_canonical_forms_agree() {
        let oid = ObjectId::parse_str(HEX).unwrap();
        assert_eq!(
            normalize_id(Bson::String(oid.to_hex())),
            normalize_id(Bson::ObjectId(oid))
        );
    }

    #[test]
    fn test_every_generated_object_id_round_trips() {
        let generated = (0..1000).map(|_| ObjectId::new());
        let spread = (0..=255u8).map(|byte| {
            let mut bytes = [byte; 12];
            bytes[0] = byte.wrapping_mul(31);
            bytes[11] = 255 - byte;
            ObjectId::from_bytes(bytes)
        });

        for oid in generated.chain(spread) {
            let hex = oid.to_hex();
            assert!(is_object_id_hex(&hex), "{} should be recognized", hex);
            assert_eq!(normalize_id(Bson::String(hex)), Bson::ObjectId(oid));
            assert_eq!(normalize_id(Bson::ObjectId(oid)), Bson::ObjectId(oid));
        }
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_id(Bson::String(HEX.to_string()));
        let twice = normalize_id(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_object_id_passes_through() {
        let oid = ObjectId::new();
        assert_eq!(normalize_id(Bson::ObjectId(oid)), Bson::ObjectId(oid));
    }

    #[test]
    fn test_non_matching_values_pass_through() {
        let cases = vec![
            Bson::String("user-42".to_string()),
            Bson::String(HEX.to_uppercase()),
            Bson::String(format!("{}0", HEX)),
            Bson::String(HEX[..23].to_string()),
            Bson::String(format!(" {}", &HEX[1..])),
            Bson::String(String::new()),
            Bson::Int32(7),
            Bson::Int64(7),
            Bson::Null,
        ];

        for case in cases {
            assert_eq!(normalize_id(case.clone()), case);
        }
    }

    #[test]
    fn test_is_object_id_hex() {
        assert!(is_object_id_hex(HEX));
        assert!(is_object_id_hex("000000000000000000000000"));
        assert!(!is_object_id_hex("5F1D7F3E9C1B2A3D4E5F6A7B"));
        assert!(!is_object_id_hex("5f1d7f3e9c1b2a3d4e5f6a7g"));
        assert!(!is_object_id_hex(""));
    }

    #[test]
    fn test_normalize_document_id_copies() {
        let original = doc! { "_id": HEX, "name": "Ada" };
        let normalized = normalize_document_id(&original);

        assert_eq!(original.get_str("_id").unwrap(), HEX);
        assert_eq!(
            normalized.get_object_id("_id").unwrap(),
            ObjectId::parse_str(HEX).unwrap()
        );
        assert_eq!(normalized.get_str("name").unwrap(), "Ada");
    }

    #[test]
    fn test_normalize_document_without_id() {
        let original = doc! { "name": "Ada" };
        assert_eq!(normalize_document_id(&original), original);
        assert_eq!(document_id(&original), Bson::Null);
    }
}
