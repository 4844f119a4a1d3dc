//! Static etcd configuration: URL schemes, ports, TLS material paths, and
//! the artifact path. Supplied through the environment and never derived
//! during a pass.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// Immutable settings shared by the membership client, the reconciler, and
/// the renderer.
///
/// Ports are kept as strings: they are only ever spliced into URLs and
/// rendered back out verbatim. Certificate paths may be empty, meaning the
/// corresponding scheme runs without TLS material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EtcdConfig {
    /// Where the rendered `ETCD_*` environment file is written.
    pub env_file: PathBuf,
    pub client_scheme: String,
    pub client_port: String,
    pub client_ca_file: String,
    pub client_cert_file: String,
    pub client_key_file: String,
    pub peer_scheme: String,
    pub peer_port: String,
    pub peer_ca_file: String,
    pub peer_cert_file: String,
    pub peer_key_file: String,
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

impl EtcdConfig {
    /// Load the configuration from `ETCD_*` environment variables, falling
    /// back to the conventional on-host defaults.
    pub fn from_env() -> Self {
        Self {
            env_file: env_or("ETCD_ENV_FILE", "/etc/etcd/config").into(),
            client_scheme: env_or("ETCD_CLIENT_SCHEME", "https"),
            client_port: env_or("ETCD_CLIENT_PORT", "2379"),
            client_ca_file: env_or("ETCD_CLIENT_CA_FILE", "/etc/etcd/certs/ca.pem"),
            client_cert_file: env_or("ETCD_CLIENT_CERT_FILE", "/etc/etcd/certs/etcd.pem"),
            client_key_file: env_or("ETCD_CLIENT_KEY_FILE", "/etc/etcd/certs/etcd-key.pem"),
            peer_scheme: env_or("ETCD_PEER_SCHEME", "https"),
            peer_port: env_or("ETCD_PEER_PORT", "2380"),
            peer_ca_file: env_or("ETCD_PEER_CA_FILE", "/etc/etcd/certs/peer-ca.pem"),
            peer_cert_file: env_or("ETCD_PEER_CERT_FILE", "/etc/etcd/certs/peer-etcd.pem"),
            peer_key_file: env_or("ETCD_PEER_KEY_FILE", "/etc/etcd/certs/peer-etcd-key.pem"),
        }
    }

    /// Client-facing API endpoint of a node.
    pub fn client_url(&self, host: &str) -> String {
        format!("{}://{}:{}", self.client_scheme, host, self.client_port)
    }

    /// Inter-node peer endpoint of a node.
    pub fn peer_url(&self, host: &str) -> String {
        format!("{}://{}:{}", self.peer_scheme, host, self.peer_port)
    }

    /// `id=peerURL` entries for every member, lexicographically sorted by
    /// id. The sort comes for free from the `BTreeMap` key order.
    pub fn peer_entries(&self, members: &BTreeMap<String, String>) -> Vec<String> {
        members
            .iter()
            .map(|(id, host)| format!("{}={}", id, self.peer_url(host)))
            .collect()
    }

    /// Whether client-facing traffic requires mutual TLS.
    pub fn client_secure(&self) -> bool {
        self.client_scheme == "https"
    }

    /// Whether peer traffic requires mutual TLS.
    pub fn peer_secure(&self) -> bool {
        self.peer_scheme == "https"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_config() -> EtcdConfig {
        EtcdConfig {
            env_file: "/tmp/etcd-config".into(),
            client_scheme: "http".into(),
            client_port: "2379".into(),
            client_ca_file: String::new(),
            client_cert_file: String::new(),
            client_key_file: String::new(),
            peer_scheme: "http".into(),
            peer_port: "2380".into(),
            peer_ca_file: String::new(),
            peer_cert_file: String::new(),
            peer_key_file: String::new(),
        }
    }

    #[test]
    fn url_builders_combine_scheme_host_port() {
        let config = plain_config();
        assert_eq!(config.client_url("10.0.0.7"), "http://10.0.0.7:2379");
        assert_eq!(config.peer_url("10.0.0.7"), "http://10.0.0.7:2380");
        assert_eq!(config.client_url("0.0.0.0"), "http://0.0.0.0:2379");
    }

    #[test]
    fn peer_entries_sorted_by_id() {
        let config = plain_config();
        let mut members = BTreeMap::new();
        members.insert("i-zulu".to_string(), "10.0.0.3".to_string());
        members.insert("i-alpha".to_string(), "10.0.0.1".to_string());
        members.insert("i-mike".to_string(), "10.0.0.2".to_string());

        assert_eq!(
            config.peer_entries(&members),
            vec![
                "i-alpha=http://10.0.0.1:2380",
                "i-mike=http://10.0.0.2:2380",
                "i-zulu=http://10.0.0.3:2380",
            ]
        );
    }

    #[test]
    fn secure_flags_follow_schemes() {
        let mut config = plain_config();
        assert!(!config.client_secure());
        assert!(!config.peer_secure());

        config.client_scheme = "https".into();
        assert!(config.client_secure());
        assert!(!config.peer_secure());
    }
}
