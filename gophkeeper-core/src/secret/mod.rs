//! The secret item model: tagged variants, the encoded (ciphertext-carrying)
//! record, and hash-based change detection.

pub mod codec;

use crate::secret::codec::{CodecError, SecretCodec};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("failed to parse secret body: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0}")]
    InvalidFile(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Discriminant of a secret item.
///
/// The string forms double as the JSON type tag and the `type` column value
/// on both stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretType {
    Credentials,
    Text,
    Binary,
    Card,
}

impl SecretType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Credentials => "Credentials",
            Self::Text => "Text",
            Self::Binary => "Binary",
            Self::Card => "Card",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Credentials" => Some(Self::Credentials),
            "Text" => Some(Self::Text),
            "Binary" => Some(Self::Binary),
            "Card" => Some(Self::Card),
            _ => None,
        }
    }
}

impl std::fmt::Display for SecretType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored login/password pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialsSecret {
    pub name: String,
    pub description: String,
    pub login: String,
    pub password: String,
}

/// Free-form text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSecret {
    pub name: String,
    pub description: String,
    pub text: String,
}

/// A file kept as raw bytes plus its original name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySecret {
    pub name: String,
    pub description: String,
    pub filename: String,
    #[serde(with = "base64_bytes")]
    pub binary: Vec<u8>,
}

/// A payment card.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardSecret {
    pub name: String,
    pub description: String,
    #[serde(rename = "owner")]
    pub owner_name: String,
    pub number: String,
    pub cvv: String,
}

/// A secret in its decrypted, user-visible form.
///
/// The serialized body is the JSON of the variant with a `secretType` tag;
/// the content hash is SHA-256 over exactly these bytes, so the body must be
/// serialized once and reused for both hashing and encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "secretType")]
pub enum SecretItem {
    Credentials(CredentialsSecret),
    Text(TextSecret),
    Binary(BinarySecret),
    Card(CardSecret),
}

impl SecretItem {
    pub fn name(&self) -> &str {
        match self {
            Self::Credentials(s) => &s.name,
            Self::Text(s) => &s.name,
            Self::Binary(s) => &s.name,
            Self::Card(s) => &s.name,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Credentials(s) => &s.description,
            Self::Text(s) => &s.description,
            Self::Binary(s) => &s.description,
            Self::Card(s) => &s.description,
        }
    }

    pub fn secret_type(&self) -> SecretType {
        match self {
            Self::Credentials(_) => SecretType::Credentials,
            Self::Text(_) => SecretType::Text,
            Self::Binary(_) => SecretType::Binary,
            Self::Card(_) => SecretType::Card,
        }
    }

    /// Text rendering of the payload for display. Binary items render as
    /// their stored filename; the actual bytes are written out separately
    /// via [`BinarySecret::save_to`].
    pub fn payload_text(&self) -> String {
        match self {
            Self::Credentials(s) => format!("[LOGIN]: {}\n[PASSWORD]: {}", s.login, s.password),
            Self::Text(s) => format!("[TEXT]: {}", s.text),
            Self::Binary(s) => format!("[FILE]: {}", s.filename),
            Self::Card(s) => format!(
                "[OWNER]: {}\n[NUMBER]: {}\n[CVV]: {}",
                s.owner_name, s.number, s.cvv
            ),
        }
    }

    /// Serialize, hash and seal this item into its stored form.
    ///
    /// The id is assigned here and never changes afterwards; the owner is the
    /// session user and is never rewritten.
    pub fn encode(
        &self,
        codec: &dyn SecretCodec,
        owner: i64,
    ) -> Result<EncodedSecret, SecretError> {
        let body = serde_json::to_vec(self)?;
        let encoded_content = codec.encode(&body)?;
        let hash = STANDARD.encode(Sha256::digest(&body));

        Ok(EncodedSecret {
            id: Uuid::new_v4(),
            name: self.name().to_string(),
            owner,
            description: self.description().to_string(),
            secret_type: self.secret_type(),
            encoded_content,
            hash,
            timestamp: Utc::now().timestamp_millis(),
        })
    }
}

impl BinarySecret {
    /// Read the file at `path` entirely into memory. The path's basename
    /// becomes the stored filename.
    pub fn from_file(
        name: String,
        description: String,
        path: &Path,
    ) -> Result<Self, SecretError> {
        let meta = std::fs::metadata(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SecretError::InvalidFile("file specified by path does not exist".to_string())
            } else {
                SecretError::Io(e)
            }
        })?;
        if meta.is_dir() {
            return Err(SecretError::InvalidFile(
                "the specified path is a directory, it must point to a file".to_string(),
            ));
        }

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| SecretError::InvalidFile("path has no file name".to_string()))?;
        let binary = std::fs::read(path)?;

        Ok(Self {
            name,
            description,
            filename,
            binary,
        })
    }

    /// Write the stored bytes as `filename` into `output_dir`, or into the
    /// home directory when no directory is given. Returns the written path.
    pub fn save_to(&self, output_dir: Option<&Path>) -> Result<PathBuf, SecretError> {
        let dir = match output_dir {
            Some(dir) => {
                let meta = std::fs::metadata(dir).map_err(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        SecretError::InvalidFile(
                            "directory specified by path does not exist".to_string(),
                        )
                    } else {
                        SecretError::Io(e)
                    }
                })?;
                if !meta.is_dir() {
                    return Err(SecretError::InvalidFile(
                        "the specified path does not lead to a directory".to_string(),
                    ));
                }
                dir.to_path_buf()
            }
            None => dirs::home_dir().ok_or_else(|| {
                SecretError::InvalidFile("could not determine the home directory".to_string())
            })?,
        };

        let target = dir.join(&self.filename);
        std::fs::write(&target, &self.binary)?;
        Ok(target)
    }
}

/// The on-disk and on-wire form of a secret: AEAD ciphertext of the
/// serialized body plus the metadata the sync protocol compares.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedSecret {
    pub id: Uuid,
    pub name: String,
    pub owner: i64,
    pub description: String,
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    #[serde(with = "base64_bytes")]
    pub encoded_content: Vec<u8>,
    /// base64 of SHA-256 over the plaintext body that produced
    /// `encoded_content`.
    pub hash: String,
    /// Last modification time, UTC milliseconds.
    pub timestamp: i64,
}

impl EncodedSecret {
    /// Open the sealed body and parse it back into a [`SecretItem`].
    pub fn decode(&self, codec: &dyn SecretCodec) -> Result<SecretItem, SecretError> {
        let body = codec.decode(&self.encoded_content)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// The sync-metadata projection of this record.
    pub fn sync_meta(&self) -> crate::dto::SecretSyncMeta {
        crate::dto::SecretSyncMeta {
            id: self.id,
            hash: self.hash.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// base64 (de)serialization for byte fields, matching how the stored body
/// encodes binary payloads.
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        STANDARD.decode(&s).map_err(serde::de::Error::custom)
    }
}
