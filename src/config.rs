//! Configuration model and entity resolver.
//!
//! Loads the operator-authored YAML file describing clusters of logical
//! servers and the streams assigned to them, and answers name lookups for
//! the command layer. Lookups are linear scans over the loaded lists; the
//! first exact (case-sensitive) match wins.

use std::path::Path;

use serde::Deserialize;

use crate::db::ConnectionSpec;
use crate::error::Error;

/// Parsed contents of the EMM configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub streams: Vec<Stream>,
}

/// A named group of logical servers sharing default credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct Cluster {
    pub name: String,
    #[serde(default, rename = "default-username")]
    pub default_username: Option<String>,
    #[serde(default, rename = "default-password")]
    pub default_password: Option<String>,
    #[serde(default, rename = "logical-servers")]
    pub logical_servers: Vec<LogicalServer>,
}

/// One mediation-platform node instance, backed by its own database.
#[derive(Debug, Clone, Deserialize)]
pub struct LogicalServer {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub database: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// A business-logic pipeline identified by its collector (input) and
/// distributor (output) node names and/or IDs.
#[derive(Debug, Clone, Deserialize)]
pub struct Stream {
    pub name: String,
    #[serde(default)]
    pub collectors: Vec<String>,
    #[serde(default, rename = "collector-ids")]
    pub collector_ids: Vec<String>,
    #[serde(default)]
    pub distributors: Vec<String>,
    #[serde(default, rename = "distributor-ids")]
    pub distributor_ids: Vec<String>,
    #[serde(default, rename = "assigned-logical-server")]
    pub assigned: Option<AssignedLogicalServer>,
}

/// Reference from a stream to the logical server it runs on.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignedLogicalServer {
    pub name: String,
    pub cluster: String,
}

impl Config {
    /// Load and parse the configuration file, logging validation warnings.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Config = serde_yaml::from_str(&raw).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })?;

        config.warn_on_gaps();
        Ok(config)
    }

    /// Find a stream by name.
    pub fn find_stream(&self, name: &str) -> Option<&Stream> {
        self.streams.iter().find(|s| s.name == name)
    }

    /// Find a cluster by name.
    pub fn find_cluster(&self, name: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.name == name)
    }

    /// Find a logical server by name within a named cluster.
    pub fn find_logical_server(
        &self,
        server: &str,
        cluster: &str,
    ) -> Option<(&Cluster, &LogicalServer)> {
        let cluster = self.find_cluster(cluster)?;
        let server = cluster.logical_servers.iter().find(|ls| ls.name == server)?;
        Some((cluster, server))
    }

    /// Build the connection descriptor for a logical server, applying the
    /// cluster default credentials when the server omits its own.
    pub fn connection_spec(
        &self,
        cluster: &Cluster,
        server: &LogicalServer,
    ) -> Result<ConnectionSpec, Error> {
        let username = server
            .username
            .clone()
            .or_else(|| cluster.default_username.clone());
        let password = server
            .password
            .clone()
            .or_else(|| cluster.default_password.clone());

        match (username, password) {
            (Some(username), Some(password)) => Ok(ConnectionSpec {
                name: server.name.clone(),
                host: server.host.clone(),
                port: server.port,
                database: server.database.clone(),
                username,
                password,
            }),
            _ => Err(Error::MissingCredentials {
                server: server.name.clone(),
                cluster: cluster.name.clone(),
            }),
        }
    }

    fn warn_on_gaps(&self) {
        if self.clusters.is_empty() {
            tracing::warn!("no clusters defined in configuration file");
        }
        if self.streams.is_empty() {
            tracing::warn!("no streams defined in configuration file");
        }

        for cluster in &self.clusters {
            for server in &cluster.logical_servers {
                if server.username.is_none() {
                    if cluster.default_username.is_some() {
                        tracing::debug!(
                            cluster = %cluster.name,
                            logical_server = %server.name,
                            "missing 'username', will use cluster default"
                        );
                    } else {
                        tracing::warn!(
                            cluster = %cluster.name,
                            logical_server = %server.name,
                            "missing 'username', and cluster defines no default"
                        );
                    }
                }
                if server.password.is_none() && cluster.default_password.is_none() {
                    tracing::warn!(
                        cluster = %cluster.name,
                        logical_server = %server.name,
                        "missing 'password', and cluster defines no default"
                    );
                }
            }
        }

        for stream in &self.streams {
            if stream.collectors.is_empty()
                && stream.collector_ids.is_empty()
                && stream.distributors.is_empty()
                && stream.distributor_ids.is_empty()
            {
                tracing::warn!(
                    stream = %stream.name,
                    "stream defines no collectors or distributors; its reports will be empty"
                );
            }
        }
    }
}
