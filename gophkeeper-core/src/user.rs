use serde::{Deserialize, Serialize};

/// A registered user.
///
/// `password_hash` is the server-side bcrypt hash. It travels in auth
/// responses for local replication only and is never used to authenticate a
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub login: String,
    pub password_hash: String,
    /// Last modification time, UTC milliseconds.
    pub timestamp: i64,
}
