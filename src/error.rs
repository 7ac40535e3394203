//! Crate-wide error type.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to the command layer. Every variant is fatal to the
/// report being generated; nothing is retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reading configuration file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing configuration file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("stream '{0}' is not defined in the configuration file")]
    StreamNotFound(String),

    #[error("cluster '{0}' is not defined in the configuration file")]
    ClusterNotFound(String),

    #[error("logical server '{server}' is not defined in cluster '{cluster}'")]
    ServerNotFound { server: String, cluster: String },

    #[error("stream '{0}' is not assigned to any logical server")]
    StreamNotAssigned(String),

    #[error("logical server '{server}' has no username or password, and cluster '{cluster}' defines no defaults")]
    MissingCredentials { server: String, cluster: String },

    #[error("connecting to logical server '{server}' (host {host}, port {port}, database {database}): {source}")]
    Connection {
        server: String,
        host: String,
        port: u16,
        database: String,
        source: sqlx::Error,
    },

    #[error("query against logical server '{server}' failed: {source}")]
    Query {
        server: String,
        source: sqlx::Error,
    },

    #[error("query against logical server '{server}' exceeded the {timeout_secs}s deadline")]
    QueryTimeout { server: String, timeout_secs: u64 },

    #[error("output format '{0}' is not supported")]
    UnsupportedFormat(String),

    #[error("the {0} report is not implemented")]
    UnsupportedReport(&'static str),

    #[error("invalid command options: {0}")]
    InvalidOptions(String),

    #[error("invalid {which} '{value}', expected YYYYMMDDHHMMSS")]
    InvalidTime { which: &'static str, value: String },

    #[error("writing report file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },
}
