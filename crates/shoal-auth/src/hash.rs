//! Digest primitives used by signing and content-integrity headers.
//!
//! All three helpers are pure and standards-conformant byte for byte; a
//! digest mismatch here silently breaks request authentication at the
//! server, so the empty-input cases are pinned by tests against the
//! published constants.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use digest::Digest;
use digest::KeyInit;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex SHA-256 of the empty byte string, the default payload hash for
/// bodiless requests.
pub const EMPTY_PAYLOAD_SHA256: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Base64-encoded MD5 digest, the `Content-MD5` header value.
#[must_use]
pub fn md5_base64(data: &[u8]) -> String {
    STANDARD.encode(Md5::digest(data))
}

/// Hex-encoded SHA-256 digest, the `x-amz-content-sha256` header value.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Raw HMAC-SHA256 of `data` under `key`.
#[must_use]
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can accept keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_hash_empty_payload_to_known_constant() {
        assert_eq!(sha256_hex(b""), EMPTY_PAYLOAD_SHA256);
    }

    #[test]
    fn test_should_hash_nonempty_payload() {
        // SHA-256("abc"), FIPS 180-2 appendix B.1.
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_should_encode_md5_as_base64() {
        // MD5("") = d41d8cd98f00b204e9800998ecf8427e.
        assert_eq!(md5_base64(b""), "1B2M2Y8AsgTpgAmY7PhCfg==");
        // Matches the Content-MD5 the service expects for this body.
        assert_eq!(md5_base64(b"<part 1>"), "JvkO/RDWFPEAJS/1bYja2A==");
    }

    #[test]
    fn test_should_compute_hmac_sha256() {
        // RFC 4231 test case 2.
        let tag = hmac_sha256(b"Jefe", b"what do ya want for nothing?");
        assert_eq!(
            hex::encode(tag),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_should_produce_32_byte_macs() {
        assert_eq!(hmac_sha256(b"", b"").len(), 32);
    }
}
