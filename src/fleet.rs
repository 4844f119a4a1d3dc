//! Fleet inventory seam.
//!
//! The reconciler only needs three things from whatever tracks the fleet:
//! this node's identity, its network address, and the current id → address
//! map of instances that should constitute the cluster. Cloud-specific
//! discovery (autoscaling groups, instance metadata, ...) lives behind this
//! trait as an external collaborator.

use std::collections::BTreeMap;

use anyhow::{bail, Context};
use async_trait::async_trait;

use crate::error::InventoryError;

#[async_trait]
pub trait FleetProvider: Send + Sync {
    /// Unique id of the instance this process runs on.
    fn instance_id(&self) -> &str;

    /// Network address other nodes reach this instance at.
    fn instance_host(&self) -> &str;

    /// Current fleet inventory, instance id → address. Ids are unique
    /// within a pass.
    async fn list_instances(&self) -> Result<BTreeMap<String, String>, InventoryError>;
}

/// Environment-backed inventory for fixed fleets and local runs.
///
/// Reads `FLEET_SELF_ID`, `FLEET_SELF_HOST`, and a comma-separated
/// `FLEET_INSTANCES="id=host,id=host"` list. Dynamic discovery against a
/// cloud API implements [`FleetProvider`] instead.
#[derive(Debug, Clone)]
pub struct EnvFleet {
    instance_id: String,
    instance_host: String,
    instances: BTreeMap<String, String>,
}

impl EnvFleet {
    pub fn from_env() -> anyhow::Result<Self> {
        let instance_id = std::env::var("FLEET_SELF_ID").context("FLEET_SELF_ID is not set")?;
        let instance_host =
            std::env::var("FLEET_SELF_HOST").context("FLEET_SELF_HOST is not set")?;
        let raw = std::env::var("FLEET_INSTANCES").context("FLEET_INSTANCES is not set")?;
        Ok(Self {
            instance_id,
            instance_host,
            instances: parse_instances(&raw)?,
        })
    }

    pub fn new(
        instance_id: impl Into<String>,
        instance_host: impl Into<String>,
        instances: BTreeMap<String, String>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            instance_host: instance_host.into(),
            instances,
        }
    }
}

#[async_trait]
impl FleetProvider for EnvFleet {
    fn instance_id(&self) -> &str {
        &self.instance_id
    }

    fn instance_host(&self) -> &str {
        &self.instance_host
    }

    async fn list_instances(&self) -> Result<BTreeMap<String, String>, InventoryError> {
        Ok(self.instances.clone())
    }
}

fn parse_instances(raw: &str) -> anyhow::Result<BTreeMap<String, String>> {
    let mut instances = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((id, host)) = entry.split_once('=') else {
            bail!("malformed fleet entry {entry:?}, expected id=host");
        };
        if id.is_empty() || host.is_empty() {
            bail!("malformed fleet entry {entry:?}, expected id=host");
        }
        instances.insert(id.to_string(), host.to_string());
    }
    Ok(instances)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn env_fleet_reports_identity_and_inventory() {
        let mut instances = BTreeMap::new();
        instances.insert("i-1".to_string(), "10.0.0.1".to_string());
        instances.insert("i-2".to_string(), "10.0.0.2".to_string());
        let fleet = EnvFleet::new("i-1", "10.0.0.1", instances.clone());

        assert_eq!(fleet.instance_id(), "i-1");
        assert_eq!(fleet.instance_host(), "10.0.0.1");
        assert_eq!(fleet.list_instances().await.unwrap(), instances);
    }

    #[test]
    fn parse_instances_accepts_id_host_pairs() {
        let parsed = parse_instances("i-2=10.0.0.2, i-1=10.0.0.1").unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["i-1"], "10.0.0.1");
        assert_eq!(parsed["i-2"], "10.0.0.2");
    }

    #[test]
    fn parse_instances_rejects_entries_without_separator() {
        assert!(parse_instances("i-1").is_err());
        assert!(parse_instances("=10.0.0.1").is_err());
        assert!(parse_instances("i-1=").is_err());
    }

    #[test]
    fn parse_instances_ignores_empty_entries() {
        let parsed = parse_instances("i-1=10.0.0.1,,").unwrap();
        assert_eq!(parsed.len(), 1);
    }
}
