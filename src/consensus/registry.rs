use crate::core::{Block, DataType, Transaction};
use crate::utils::decode_public_key;
use log::debug;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Why a transaction was turned away. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    AlreadyRegistered,
    UnknownUser,
    MalformedKey,
    BadSignature,
    BlockFrozen,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::AlreadyRegistered => write!(f, "user is already registered"),
            RejectReason::UnknownUser => write!(f, "user is not registered"),
            RejectReason::MalformedKey => write!(f, "payload is not a public key"),
            RejectReason::BadSignature => write!(f, "signature does not verify"),
            RejectReason::BlockFrozen => write!(f, "pending block is frozen for mining"),
        }
    }
}

/// Result of offering a transaction to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Admission {
    Accepted,
    /// Byte-identical to the previous delivery
    Duplicate,
    Rejected(RejectReason),
}

/// user_guid -> public key of every currently registered user
#[derive(Debug, Default)]
pub struct UserRegistry {
    users: HashMap<String, RsaPublicKey>,
}

impl UserRegistry {
    pub fn new() -> UserRegistry {
        UserRegistry::default()
    }

    /// Registry as it stands after `blocks`, with nothing pending
    pub fn from_blocks(blocks: &[Block]) -> UserRegistry {
        let mut registry = UserRegistry::new();
        for block in blocks {
            registry.apply_committed(block);
        }
        registry
    }

    pub fn is_registered(&self, user_guid: &str) -> bool {
        self.users.contains_key(user_guid)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    /// Verify `tx` and apply its effect on the registry.
    ///
    /// A registration must be signed by the key it registers; anything else
    /// must be signed by the key on file. A verified revoke retires the key.
    pub fn admit(&mut self, tx: &Transaction) -> Result<(), RejectReason> {
        let user_guid = tx.get_user_guid();
        match tx.get_data().get_type() {
            DataType::Register => {
                if self.is_registered(user_guid) {
                    return Err(RejectReason::AlreadyRegistered);
                }
                let key = decode_public_key(tx.get_data().get_payload())
                    .map_err(|_| RejectReason::MalformedKey)?;
                if !tx.verify(&key) {
                    return Err(RejectReason::BadSignature);
                }
                self.users.insert(user_guid.to_string(), key);
            }
            data_type => {
                let key = self
                    .users
                    .get(user_guid)
                    .ok_or(RejectReason::UnknownUser)?;
                if !tx.verify(key) {
                    return Err(RejectReason::BadSignature);
                }
                if data_type == DataType::Revoke {
                    self.users.remove(user_guid);
                }
            }
        }
        Ok(())
    }

    /// Replay the key changes of a committed block. Every transaction in it
    /// was verified by the node that admitted it, so replicas that never saw
    /// the transactions learn the same keys.
    pub fn apply_committed(&mut self, block: &Block) {
        for tx in block.get_transactions() {
            match tx.get_data().get_type() {
                DataType::Register => match decode_public_key(tx.get_data().get_payload()) {
                    Ok(key) => {
                        self.users.insert(tx.get_user_guid().to_string(), key);
                    }
                    Err(e) => debug!("Skipping committed registration: {e}"),
                },
                DataType::Revoke => {
                    self.users.remove(tx.get_user_guid());
                }
                DataType::Data => {}
            }
        }
    }
}
