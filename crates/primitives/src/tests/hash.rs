use serde_json::json;

use super::*;

const ZERO_HEX: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[test]
fn test_hex_roundtrip_is_lowercase() {
    let mut bytes = [0_u8; BYTES_LEN];
    bytes[0] = 0xAB;
    bytes[31] = 0x0F;
    let hash = Hash::from(bytes);

    let encoded = hash.to_string();
    assert_eq!(encoded.len(), 64, "hex encoding must be 64 characters");
    assert!(encoded.starts_with("ab"), "hex must be lowercase: {encoded}");
    assert!(encoded.ends_with("0f"), "hex must keep leading zeros: {encoded}");

    let decoded: Hash = encoded.parse().unwrap();
    assert_eq!(decoded, hash);
}

#[test]
fn test_parse_accepts_uppercase() {
    let upper = "AB".repeat(BYTES_LEN);
    let hash: Hash = upper.parse().unwrap();
    assert_eq!(hash.as_bytes(), &[0xAB; BYTES_LEN]);
    assert_eq!(hash.to_hex(), "ab".repeat(BYTES_LEN));
}

#[test]
fn test_parse_rejects_wrong_length() {
    assert_eq!("abcd".parse::<Hash>(), Err(Error::InvalidLength(4)));
    assert_eq!("".parse::<Hash>(), Err(Error::InvalidLength(0)));
}

#[test]
fn test_parse_rejects_non_hex() {
    let bad = "zz".repeat(BYTES_LEN);
    assert_eq!(
        bad.parse::<Hash>(),
        Err(Error::DecodeError(hex::FromHexError::InvalidHexCharacter {
            c: 'z',
            index: 0
        }))
    );
}

#[test]
fn test_default_is_zero() {
    assert_eq!(Hash::default().to_hex(), ZERO_HEX);
}

#[test]
fn test_serde_as_hex_string() {
    let hash = Hash::from([7; BYTES_LEN]);
    let value = serde_json::to_value(hash).unwrap();
    assert_eq!(value, json!("07".repeat(BYTES_LEN)));

    let back: Hash = serde_json::from_value(value).unwrap();
    assert_eq!(back, hash);
}

#[test]
fn test_deserialize_invalid_length() {
    let err = serde_json::from_value::<Hash>(json!("abc")).unwrap_err();
    assert!(
        err.to_string().contains("invalid length"),
        "unexpected error: {err}"
    );
}
