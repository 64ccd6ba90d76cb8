//! Gophkeeper core library.
//!
//! Shared between the server and the client: the secret item model and its
//! authenticated-encryption codec, the user record, the sync-metadata
//! projection, and the wire types exchanged over the sync API.

pub mod api;
pub mod dto;
pub mod secret;
pub mod user;

pub use dto::{SecretItemInfo, SecretSyncMeta};
pub use secret::codec::{AesGcmCodec, CodecError, SecretCodec};
pub use secret::{
    BinarySecret, CardSecret, CredentialsSecret, EncodedSecret, SecretError, SecretItem,
    SecretType, TextSecret,
};
pub use user::User;
