use clap::{Parser, ValueEnum};
use pinhole_gateway::identity::{DEFAULT_COOKIE_NAME, DEFAULT_COOKIE_SECRET};
use pinhole_storage::StorageSettings;
use std::fmt::{Display, Formatter};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const SERVER_ADDRESS_ENV: &str = "SERVER_ADDRESS";
pub const BASE_URL_ENV: &str = "BASE_URL";
pub const FILE_STORAGE_PATH_ENV: &str = "FILE_STORAGE_PATH";
pub const DATABASE_DSN_ENV: &str = "DATABASE_DSN";
pub const CONNECTION_TIMEOUT_ENV: &str = "CONNECTION_TIMEOUT";
pub const USER_COOKIE_SECRET_ENV: &str = "USER_COOKIE_SECRET";
pub const USER_COOKIE_NAME_ENV: &str = "USER_COOKIE_NAME";
pub const DELETE_WORKERS_ENV: &str = "DELETE_WORKERS";
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 5;
pub const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[value(name = "text")]
    Text,
    #[value(name = "json")]
    Json,
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "pinhole", about = "URL shortener HTTP server")]
pub struct CLI {
    #[arg(short = 'a', long, env = SERVER_ADDRESS_ENV, default_value = DEFAULT_SERVER_ADDRESS)]
    pub server_address: SocketAddr,

    /// Base URL short links are rendered under. Defaults to `http://<Host>`.
    #[arg(short = 'b', long, env = BASE_URL_ENV)]
    pub base_url: Option<String>,

    /// Append-only record log. Ignored when a database DSN is set.
    #[arg(short = 'f', long, env = FILE_STORAGE_PATH_ENV)]
    pub file_storage_path: Option<PathBuf>,

    #[arg(short = 'd', long, env = DATABASE_DSN_ENV)]
    pub database_dsn: Option<String>,

    /// Bound for every database operation, in seconds.
    #[arg(long, env = CONNECTION_TIMEOUT_ENV, default_value_t = DEFAULT_CONNECTION_TIMEOUT_SECS)]
    pub connection_timeout: u64,

    #[arg(long, env = USER_COOKIE_SECRET_ENV, default_value = DEFAULT_COOKIE_SECRET)]
    pub user_cookie_secret: String,

    #[arg(long, env = USER_COOKIE_NAME_ENV, default_value = DEFAULT_COOKIE_NAME)]
    pub user_cookie_name: String,

    /// Number of deletion workers. Defaults to the available parallelism.
    #[arg(long, env = DELETE_WORKERS_ENV)]
    pub delete_workers: Option<usize>,

    #[arg(long, env = LOG_LEVEL_ENV, default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,

    #[arg(long, env = LOG_FORMAT_ENV, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl CLI {
    pub fn storage_settings(&self) -> StorageSettings {
        StorageSettings {
            database_dsn: self.database_dsn.clone(),
            file_storage_path: self.file_storage_path.clone(),
            connection_timeout: Duration::from_secs(self.connection_timeout),
        }
    }

    pub fn delete_workers(&self) -> usize {
        self.delete_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(usize::from)
                .unwrap_or(1)
        })
    }
}
