//! Server configuration.
//!
//! Every option is a flag with an environment fallback: a flag set on the
//! command line wins, otherwise the environment variable applies, otherwise
//! the default.

use clap::Parser;

pub const SQLITE_STORAGE_TYPE: &str = "sqlite";

#[derive(Parser, Debug, Clone)]
#[command(name = "gophkeeper-server", about = "Gophkeeper synchronization server")]
pub struct ServerConfig {
    /// Database location (sqlite file path)
    #[arg(short = 'd', long, env = "DATABASE_DSN", default_value = "gophkeeper.db")]
    pub database_dsn: String,

    /// Listen address
    #[arg(short = 'a', long, env = "SERVER_ADDRESS", default_value = "127.0.0.1:3333")]
    pub server_address: String,

    /// Storage engine (sqlite)
    #[arg(long, env = "STORAGE", default_value = SQLITE_STORAGE_TYPE)]
    pub storage: String,

    /// Log level
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Secret key for the token manager
    #[arg(short = 's', long, env = "TOKEN_SECRET_KEY", default_value = "secret")]
    pub token_secret_key: String,
}
