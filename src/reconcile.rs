//! The reconciliation engine: one complete convergence pass.
//!
//! A pass observes the fleet and the live cluster, decides bootstrap-vs-
//! join, converges membership (remove terminated instances, add self), and
//! writes the configuration artifact. All state is pass-scoped; the only
//! durable outputs are the artifact file and the cluster's own membership.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::EtcdConfig;
use crate::error::PassError;
use crate::etcd::MembershipClient;
use crate::fleet::FleetProvider;
use crate::render;

/// Pass-level bootstrap decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterState {
    /// No fleet instance answered a probe: form a brand-new cluster.
    New,
    /// At least one instance is available: join the existing cluster.
    Existing,
}

impl fmt::Display for ClusterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "new"),
            Self::Existing => write!(f, "existing"),
        }
    }
}

/// Everything learned about the fleet and the live cluster in one pass.
#[derive(Debug, Clone, Serialize)]
pub struct FleetView {
    pub instance_id: String,
    pub instance_host: String,
    /// Fleet inventory, instance id → address.
    pub instances: BTreeMap<String, String>,
    /// Probe outcome per fleet instance.
    pub available: BTreeMap<String, bool>,
    /// Members reported by reachable nodes, aggregated last-write-wins by
    /// id in sorted instance order.
    pub active: BTreeMap<String, String>,
}

impl FleetView {
    pub fn any_available(&self) -> bool {
        self.available.values().any(|up| *up)
    }

    /// Address of the first available instance in id order. Every mutation
    /// of the pass goes through this one endpoint.
    pub fn first_available_host(&self) -> Option<&str> {
        self.available
            .iter()
            .find(|(_, up)| **up)
            .and_then(|(id, _)| self.instances.get(id))
            .map(String::as_str)
    }

    /// Active members with no backing fleet instance, in id order.
    pub fn removal_candidates(&self) -> Vec<String> {
        self.active
            .keys()
            .filter(|id| !self.instances.contains_key(*id))
            .cloned()
            .collect()
    }

    fn self_available(&self) -> bool {
        self.available
            .get(&self.instance_id)
            .copied()
            .unwrap_or(false)
    }
}

/// The fully resolved, pass-specific configuration ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealizedConfig {
    pub etcd: EtcdConfig,
    pub cluster_state: ClusterState,
    /// `id=peerURL` entries, lexicographically sorted by id.
    pub initial_cluster: Vec<String>,
    pub name: String,
    pub listen_client_url: String,
    pub listen_peer_url: String,
    pub advertise_client_url: String,
    pub advertise_peer_url: String,
}

/// Drives one convergence pass against injected fleet and membership
/// collaborators.
pub struct Reconciler<F, M> {
    fleet: F,
    etcd: M,
    config: EtcdConfig,
}

impl<F: FleetProvider, M: MembershipClient> Reconciler<F, M> {
    pub fn new(fleet: F, etcd: M, config: EtcdConfig) -> Self {
        Self {
            fleet,
            etcd,
            config,
        }
    }

    /// Gather fleet inventory, per-instance availability, and the
    /// aggregated live member view.
    async fn observe(&self) -> Result<FleetView, PassError> {
        let instances = self.fleet.list_instances().await?;
        let mut available = BTreeMap::new();
        let mut active = BTreeMap::new();
        for (id, host) in &instances {
            let up = self.etcd.is_available(host).await;
            available.insert(id.clone(), up);
            if up {
                match self.etcd.members(host).await {
                    Ok(members) => active.extend(members),
                    // An unreadable node contributes nothing; the pass goes on.
                    Err(err) => warn!(instance = %id, %err, "member listing failed"),
                }
            }
        }
        Ok(FleetView {
            instance_id: self.fleet.instance_id().to_string(),
            instance_host: self.fleet.instance_host().to_string(),
            instances,
            available,
            active,
        })
    }

    /// Realize the pass configuration from the observed view.
    fn realize(&self, view: &FleetView) -> RealizedConfig {
        let cluster_state = if view.any_available() {
            ClusterState::Existing
        } else {
            ClusterState::New
        };
        let initial_cluster = match cluster_state {
            ClusterState::New => self.config.peer_entries(&view.instances),
            ClusterState::Existing => {
                let mut members = view.active.clone();
                members.insert(view.instance_id.clone(), view.instance_host.clone());
                self.config.peer_entries(&members)
            }
        };
        RealizedConfig {
            etcd: self.config.clone(),
            cluster_state,
            initial_cluster,
            name: view.instance_id.clone(),
            listen_client_url: self.config.client_url("0.0.0.0"),
            listen_peer_url: self.config.peer_url("0.0.0.0"),
            advertise_client_url: self.config.client_url(&view.instance_host),
            advertise_peer_url: self.config.peer_url(&view.instance_host),
        }
    }

    /// One complete convergence pass.
    ///
    /// Inventory and mutation failures abort the pass before the artifact
    /// is written; removals already applied stay applied. The caller (or
    /// the scheduler) retries from scratch on the next invocation.
    pub async fn run(&self) -> Result<(), PassError> {
        let mut view = self.observe().await?;
        debug!(
            view = %serde_json::to_string(&view).unwrap_or_default(),
            "observed fleet state"
        );
        info!(
            instances = view.instances.len(),
            reachable = view.available.values().filter(|up| **up).count(),
            active_members = view.active.len(),
            "observed fleet"
        );

        let endpoint = view.first_available_host().map(str::to_string);

        if let Some(ref endpoint) = endpoint {
            for id in view.removal_candidates() {
                info!(member = %id, endpoint = %endpoint, "removing member without a fleet instance");
                self.etcd.remove(endpoint, &id).await?;
                view.active.remove(&id);
            }
        }

        let realized = self.realize(&view);

        if !view.self_available() && !view.active.contains_key(&view.instance_id) {
            if let Some(ref endpoint) = endpoint {
                info!(host = %view.instance_host, endpoint = %endpoint, "adding self to cluster");
                self.etcd.add(endpoint, &view.instance_host).await?;
            }
        }

        let artifact = render::render(&realized)?;
        render::write_atomic(&self.config.env_file, &artifact).map_err(|source| {
            PassError::Write {
                path: self.config.env_file.clone(),
                source,
            }
        })?;
        info!(
            path = %self.config.env_file.display(),
            state = %realized.cluster_state,
            members = realized.initial_cluster.len(),
            "wrote configuration artifact"
        );
        Ok(())
    }
}
