//! Utility functions and helpers
//!
//! Hashing, RSA-PSS signing, base64/hex encoding, timestamps and the
//! canonical JSON layout shared by every hashed or signed structure.

pub mod crypto;
pub mod serialization;

pub use crypto::{
    base64_decode, base64_encode, current_timestamp, decode_private_key, decode_public_key,
    encode_private_key, encode_public_key, new_private_key, parse_timestamp, rsa_pss_sign,
    rsa_pss_verify, sha256_digest, sha256_hex, DEFAULT_RSA_BITS,
};

pub use serialization::{from_json, to_canonical_json, CanonicalFormatter};
