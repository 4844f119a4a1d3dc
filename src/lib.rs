//! Fleet-driven etcd cluster membership reconciler.
//!
//! Each reconciliation pass discovers live cluster state across a compute
//! fleet, decides whether this node bootstraps a new cluster or joins the
//! existing one, converges the member list (add/remove) against fleet
//! inventory, and writes the `ETCD_*` environment file the etcd process
//! reads at startup.

pub mod config;
pub mod error;
pub mod etcd;
pub mod fleet;
pub mod reconcile;
pub mod render;
pub mod scheduler;

pub use config::EtcdConfig;
pub use error::{InventoryError, MutationError, PassError, ProtocolError};
pub use etcd::{EtcdMembershipClient, MembershipClient};
pub use fleet::{EnvFleet, FleetProvider};
pub use reconcile::{ClusterState, RealizedConfig, Reconciler};
