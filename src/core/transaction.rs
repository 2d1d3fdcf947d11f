use crate::error::Result;
use crate::utils::{from_json, rsa_pss_sign, rsa_pss_verify, to_canonical_json};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Payload is the base64 PEM public key being registered
    Register,
    /// Payload is opaque user data
    Data,
    /// Payload is the base64 PEM public key being retired
    Revoke,
}

/// Field names are part of the wire format (`T`, `payload`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Data {
    #[serde(rename = "T")]
    data_type: DataType,
    payload: String,
}

impl Data {
    pub fn new(data_type: DataType, payload: impl Into<String>) -> Data {
        Data {
            data_type,
            payload: payload.into(),
        }
    }

    pub fn get_type(&self) -> DataType {
        self.data_type
    }

    pub fn get_payload(&self) -> &str {
        self.payload.as_str()
    }

    pub fn to_json(&self) -> Result<String> {
        to_canonical_json(self)
    }

    pub fn from_json(json: &str) -> Result<Data> {
        from_json(json)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    user_guid: String,
    fingerprint: String,
    data: Data,
}

impl Transaction {
    /// Unsigned transaction, `fingerprint` is empty until [`Transaction::sign`]
    pub fn new(user_guid: impl Into<String>, data: Data) -> Transaction {
        Transaction {
            user_guid: user_guid.into(),
            fingerprint: String::new(),
            data,
        }
    }

    pub fn with_fingerprint(
        user_guid: impl Into<String>,
        fingerprint: impl Into<String>,
        data: Data,
    ) -> Transaction {
        Transaction {
            user_guid: user_guid.into(),
            fingerprint: fingerprint.into(),
            data,
        }
    }

    pub fn get_user_guid(&self) -> &str {
        self.user_guid.as_str()
    }

    pub fn get_fingerprint(&self) -> &str {
        self.fingerprint.as_str()
    }

    pub fn get_data(&self) -> &Data {
        &self.data
    }

    pub fn is_signed(&self) -> bool {
        !self.fingerprint.is_empty()
    }

    pub fn to_json(&self) -> Result<String> {
        to_canonical_json(self)
    }

    pub fn from_json(json: &str) -> Result<Transaction> {
        from_json(json)
    }

    // The fingerprint never signs itself
    fn signing_payload(&self) -> Result<String> {
        let unsigned = Transaction {
            fingerprint: String::new(),
            ..self.clone()
        };
        unsigned.to_json()
    }

    pub fn sign(&mut self, private_key: &RsaPrivateKey) -> Result<()> {
        let payload = self.signing_payload()?;
        self.fingerprint = rsa_pss_sign(private_key, payload.as_bytes())?;
        Ok(())
    }

    /// `false` on any mismatch or malformed fingerprint
    pub fn verify(&self, public_key: &RsaPublicKey) -> bool {
        match self.signing_payload() {
            Ok(payload) => rsa_pss_verify(public_key, payload.as_bytes(), &self.fingerprint),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{new_private_key, DEFAULT_RSA_BITS};

    const SERIALIZED_DATA: &str = r#"{"T": "data", "payload": "test_payload"}"#;

    fn test_transaction() -> Transaction {
        Transaction::with_fingerprint(
            "test_user_guid",
            "test_fingerprint",
            Data::new(DataType::Data, "test_payload"),
        )
    }

    #[test]
    fn test_data_to_json() {
        let data = Data::new(DataType::Data, "test_payload");
        assert_eq!(data.to_json().unwrap(), SERIALIZED_DATA);
    }

    #[test]
    fn test_data_from_json() {
        let data = Data::from_json(SERIALIZED_DATA).unwrap();
        assert_eq!(data, Data::new(DataType::Data, "test_payload"));
    }

    #[test]
    fn test_data_type_names() {
        let register = Data::new(DataType::Register, "key");
        let revoke = Data::new(DataType::Revoke, "key");
        assert_eq!(register.to_json().unwrap(), r#"{"T": "register", "payload": "key"}"#);
        assert_eq!(revoke.to_json().unwrap(), r#"{"T": "revoke", "payload": "key"}"#);
        assert!(Data::from_json(r#"{"T": "transfer", "payload": "x"}"#).is_err());
    }

    #[test]
    fn test_transaction_to_json() {
        assert_eq!(
            test_transaction().to_json().unwrap(),
            r#"{"user_guid": "test_user_guid", "fingerprint": "test_fingerprint", "data": {"T": "data", "payload": "test_payload"}}"#
        );
    }

    #[test]
    fn test_transaction_from_pretty_json() {
        let pretty = r#"{
    "user_guid": "test_user_guid",
    "fingerprint": "test_fingerprint",
    "data": {
        "T": "data",
        "payload": "test_payload"
    }
}"#;
        assert_eq!(Transaction::from_json(pretty).unwrap(), test_transaction());
    }

    #[test]
    fn test_sign_and_verify_success() {
        let private_key = new_private_key(DEFAULT_RSA_BITS).unwrap();
        let mut tx = Transaction::new("test_user_guid", Data::new(DataType::Data, "hello"));
        assert!(!tx.is_signed());

        tx.sign(&private_key).unwrap();

        assert!(tx.is_signed());
        assert!(tx.verify(&private_key.to_public_key()));
    }

    #[test]
    fn test_sign_and_verify_failure_with_other_key() {
        let first_key = new_private_key(DEFAULT_RSA_BITS).unwrap();
        let second_key = new_private_key(DEFAULT_RSA_BITS).unwrap();
        let mut tx = Transaction::new("test_user_guid", Data::new(DataType::Data, "hello"));

        tx.sign(&first_key).unwrap();

        assert!(!tx.verify(&second_key.to_public_key()));
    }

    #[test]
    fn test_tampered_transaction_fails_verification() {
        let private_key = new_private_key(DEFAULT_RSA_BITS).unwrap();
        let mut tx = Transaction::new("test_user_guid", Data::new(DataType::Data, "hello"));
        tx.sign(&private_key).unwrap();

        let tampered = Transaction::with_fingerprint(
            "test_user_guid",
            tx.get_fingerprint(),
            Data::new(DataType::Data, "goodbye"),
        );
        assert!(!tampered.verify(&private_key.to_public_key()));

        let garbled = Transaction::with_fingerprint(
            "test_user_guid",
            "not-a-signature",
            Data::new(DataType::Data, "hello"),
        );
        assert!(!garbled.verify(&private_key.to_public_key()));
    }
}
