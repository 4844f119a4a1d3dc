//! Wire-level client for the etcd v2 members API.
//!
//! Talks to one cluster node at a time over its client-facing endpoint:
//! list members, add a member, remove a member, probe availability. Knows
//! nothing about the fleet or reconciliation policy. Every call carries a
//! hard per-request timeout; only the availability probe retries.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::EtcdConfig;
use crate::error::{MutationError, ProtocolError};

/// Hard timeout applied to every members API request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Availability probe budget: attempts and inter-attempt delay.
const PROBE_ATTEMPTS: u32 = 10;
const PROBE_DELAY: Duration = Duration::from_secs(1);

/// Membership operations against a single cluster node.
#[async_trait]
pub trait MembershipClient: Send + Sync {
    /// Whether the node's client endpoint currently answers a member
    /// listing. Retries within a bounded budget and reports `false` once
    /// it is exhausted — an unreachable node is not yet part of the
    /// converged view, not an error.
    async fn is_available(&self, host: &str) -> bool;

    /// Name → address of every member the node reports. The address is the
    /// hostname of the member's first registered client URL; members with
    /// no client URL are skipped.
    async fn members(&self, host: &str) -> Result<BTreeMap<String, String>, ProtocolError>;

    /// Propose `candidate_host`'s peer URL as a new member, via the node at
    /// `client_host`.
    async fn add(&self, client_host: &str, candidate_host: &str) -> Result<(), MutationError>;

    /// Remove the member named `name`, resolving its internal id through a
    /// listing at `client_host` first.
    async fn remove(&self, client_host: &str, name: &str) -> Result<(), MutationError>;
}

#[derive(Debug, Deserialize)]
struct MemberList {
    #[serde(default)]
    members: Vec<Member>,
}

#[derive(Debug, Deserialize)]
struct Member {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "clientURLs")]
    client_urls: Vec<String>,
}

#[derive(Debug, Serialize)]
struct AddRequest {
    #[serde(rename = "peerURLs")]
    peer_urls: Vec<String>,
}

/// [`MembershipClient`] over HTTP(S), mutually authenticated when the
/// client scheme is secure.
pub struct EtcdMembershipClient {
    http: reqwest::Client,
    config: EtcdConfig,
    probe_attempts: u32,
    probe_delay: Duration,
}

impl EtcdMembershipClient {
    /// Build the client from static configuration. When the client scheme
    /// is `https`, the configured certificate/key pair becomes the TLS
    /// identity and the CA bundle the trust root.
    pub fn from_config(config: EtcdConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
        if config.client_secure() {
            let mut identity = std::fs::read(&config.client_cert_file).with_context(|| {
                format!("reading client certificate {}", config.client_cert_file)
            })?;
            let key = std::fs::read(&config.client_key_file)
                .with_context(|| format!("reading client key {}", config.client_key_file))?;
            identity.extend_from_slice(&key);
            let ca = std::fs::read(&config.client_ca_file)
                .with_context(|| format!("reading CA bundle {}", config.client_ca_file))?;
            builder = builder
                .use_rustls_tls()
                .identity(
                    reqwest::Identity::from_pem(&identity).context("loading client identity")?,
                )
                .add_root_certificate(
                    reqwest::Certificate::from_pem(&ca).context("loading CA bundle")?,
                );
        }
        let http = builder.build().context("building HTTP client")?;
        Ok(Self {
            http,
            config,
            probe_attempts: PROBE_ATTEMPTS,
            probe_delay: PROBE_DELAY,
        })
    }

    /// Override the probe budget. Production keeps the 10 × 1 s default;
    /// tests shrink it.
    pub fn with_probe_policy(mut self, attempts: u32, delay: Duration) -> Self {
        self.probe_attempts = attempts;
        self.probe_delay = delay;
        self
    }

    fn members_url(&self, host: &str) -> String {
        format!("{}/v2/members", self.config.client_url(host))
    }

    async fn list(&self, host: &str) -> Result<MemberList, ProtocolError> {
        let url = self.members_url(host);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|err| wire_error(&url, err))?;
        if !resp.status().is_success() {
            return Err(ProtocolError::Malformed {
                url,
                reason: format!("status {}", resp.status()),
            });
        }
        resp.json::<MemberList>()
            .await
            .map_err(|err| ProtocolError::Malformed {
                url,
                reason: err.to_string(),
            })
    }
}

fn wire_error(url: &str, err: reqwest::Error) -> ProtocolError {
    if err.is_timeout() {
        ProtocolError::Timeout {
            url: url.to_string(),
        }
    } else {
        ProtocolError::Transport {
            url: url.to_string(),
            source: err,
        }
    }
}

#[async_trait]
impl MembershipClient for EtcdMembershipClient {
    async fn is_available(&self, host: &str) -> bool {
        for attempt in 1..=self.probe_attempts {
            match self.list(host).await {
                Ok(_) => return true,
                Err(err) => {
                    debug!(host, attempt, %err, "availability probe failed");
                    if attempt < self.probe_attempts {
                        tokio::time::sleep(self.probe_delay).await;
                    }
                }
            }
        }
        false
    }

    async fn members(&self, host: &str) -> Result<BTreeMap<String, String>, ProtocolError> {
        let url = self.members_url(host);
        let list = self.list(host).await?;
        let mut members = BTreeMap::new();
        for member in list.members {
            let Some(client_url) = member.client_urls.first() else {
                continue;
            };
            let parsed =
                reqwest::Url::parse(client_url).map_err(|err| ProtocolError::Malformed {
                    url: url.clone(),
                    reason: format!("client URL {client_url:?}: {err}"),
                })?;
            let Some(member_host) = parsed.host_str() else {
                return Err(ProtocolError::Malformed {
                    url: url.clone(),
                    reason: format!("client URL {client_url:?} has no host"),
                });
            };
            members.insert(member.name, member_host.to_string());
        }
        Ok(members)
    }

    async fn add(&self, client_host: &str, candidate_host: &str) -> Result<(), MutationError> {
        let url = self.members_url(client_host);
        let body = AddRequest {
            peer_urls: vec![self.config.peer_url(candidate_host)],
        };
        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| MutationError::from(wire_error(&url, err)))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(MutationError::Rejected {
                operation: "member add",
                url,
                status: resp.status().as_u16(),
            })
        }
    }

    async fn remove(&self, client_host: &str, name: &str) -> Result<(), MutationError> {
        let list = self.list(client_host).await?;
        let Some(member) = list.members.iter().find(|m| m.name == name) else {
            return Err(MutationError::UnknownMember {
                name: name.to_string(),
                url: self.members_url(client_host),
            });
        };
        let url = format!("{}/{}", self.members_url(client_host), member.id);
        let resp = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|err| MutationError::from(wire_error(&url, err)))?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(MutationError::Rejected {
                operation: "member remove",
                url,
                status: resp.status().as_u16(),
            })
        }
    }
}
