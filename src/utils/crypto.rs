use data_encoding::{BASE64, HEXLOWER};
use ring::digest::{Context, SHA256, SHA256_OUTPUT_LEN};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::{LedgerError, Result};

/// Key size used by the reference clients
pub const DEFAULT_RSA_BITS: usize = 1024;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Local time with millisecond precision and no offset, e.g. `2021-01-01T00:00:00.000`
pub fn current_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(timestamp: &str) -> Result<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S%.f")
        .map_err(|e| LedgerError::Serialization(format!("Invalid timestamp {timestamp}: {e}")))
}

pub fn sha256_digest(data: &[u8]) -> Vec<u8> {
    let mut context = Context::new(&SHA256);
    context.update(data);
    let digest = context.finish();
    digest.as_ref().to_vec()
}

pub fn sha256_hex(data: &str) -> String {
    HEXLOWER.encode(&sha256_digest(data.as_bytes()))
}

pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub fn base64_decode(data: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(data.as_bytes())
        .map_err(|e| LedgerError::Crypto(format!("Invalid base64 encoding: {e}")))
}

pub fn new_private_key(bits: usize) -> Result<RsaPrivateKey> {
    let mut rng = rand::thread_rng();
    RsaPrivateKey::new(&mut rng, bits)
        .map_err(|e| LedgerError::Crypto(format!("Failed to generate RSA key: {e}")))
}

/// Base64 of the SubjectPublicKeyInfo PEM document
pub fn encode_public_key(public_key: &RsaPublicKey) -> Result<String> {
    let pem = public_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| LedgerError::Crypto(format!("Failed to encode public key: {e}")))?;
    Ok(base64_encode(pem.as_bytes()))
}

pub fn decode_public_key(public_key_base64: &str) -> Result<RsaPublicKey> {
    let pem_bytes = base64_decode(public_key_base64)?;
    let pem = String::from_utf8(pem_bytes)
        .map_err(|e| LedgerError::Crypto(format!("Public key is not UTF-8 PEM: {e}")))?;
    RsaPublicKey::from_public_key_pem(&pem)
        .map_err(|e| LedgerError::Crypto(format!("Failed to decode public key: {e}")))
}

pub fn encode_private_key(private_key: &RsaPrivateKey) -> Result<String> {
    let pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| LedgerError::Crypto(format!("Failed to encode private key: {e}")))?;
    Ok(pem.to_string())
}

pub fn decode_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .map_err(|e| LedgerError::Crypto(format!("Failed to decode private key: {e}")))
}

// PSS "maximum" salt: emLen - hLen - 2
fn max_pss_salt_len<K: PublicKeyParts>(key: &K) -> usize {
    let em_bits = key.n().bits().saturating_sub(1);
    let em_len = (em_bits + 7) / 8;
    em_len.saturating_sub(SHA256_OUTPUT_LEN + 2)
}

/// RSA-PSS (SHA-256, MGF1-SHA-256, maximum salt) signature, base64 encoded
pub fn rsa_pss_sign(private_key: &RsaPrivateKey, message: &[u8]) -> Result<String> {
    let hashed = Sha256::digest(message);
    let padding = Pss::new_with_salt::<Sha256>(max_pss_salt_len(private_key));
    let mut rng = rand::thread_rng();
    let signature = private_key
        .sign_with_rng(&mut rng, padding, &hashed)
        .map_err(|e| LedgerError::Signing(format!("Failed to sign message: {e}")))?;
    Ok(base64_encode(&signature))
}

pub fn rsa_pss_verify(public_key: &RsaPublicKey, message: &[u8], signature_base64: &str) -> bool {
    let signature = match base64_decode(signature_base64) {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    let hashed = Sha256::digest(message);
    let padding = Pss::new_with_salt::<Sha256>(max_pss_salt_len(public_key));
    public_key.verify(padding, &hashed, &signature).is_ok()
}
