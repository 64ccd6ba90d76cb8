//! Projections of the secret record used by the sync protocol and the UI.

use crate::secret::SecretType;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The (id, hash, timestamp) triple the reconciliation protocol compares
/// without transferring ciphertext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretSyncMeta {
    pub id: Uuid,
    pub hash: String,
    /// Last modification time, UTC milliseconds.
    pub timestamp: i64,
}

/// Decrypted listing row for a stored secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretItemInfo {
    pub name: String,
    pub description: String,
    pub secret_type: SecretType,
}
