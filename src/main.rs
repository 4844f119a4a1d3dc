use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use etcd_fleet::config::EtcdConfig;
use etcd_fleet::etcd::EtcdMembershipClient;
use etcd_fleet::fleet::{EnvFleet, FleetProvider};
use etcd_fleet::reconcile::Reconciler;
use etcd_fleet::scheduler;

/// Reconcile etcd cluster membership against the compute fleet and write
/// the etcd environment file.
#[derive(Parser)]
#[command(name = "etcd-fleet", version)]
struct Args {
    /// Keep polling the fleet and continuously rewrite the configured file.
    #[arg(long)]
    watch: bool,

    /// Seconds between reconciliation passes in watch mode.
    #[arg(long, default_value_t = 300)]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let config = EtcdConfig::from_env();
    let fleet = EnvFleet::from_env().context("loading fleet identity from the environment")?;
    let client = EtcdMembershipClient::from_config(config.clone())
        .context("building etcd membership client")?;

    info!(
        self_id = %fleet.instance_id(),
        self_host = %fleet.instance_host(),
        artifact = %config.env_file.display(),
        watch = args.watch,
        "etcd-fleet starting"
    );

    let reconciler = Reconciler::new(fleet, client, config);

    if args.watch {
        scheduler::watch(&reconciler, Duration::from_secs(args.interval_secs)).await;
        Ok(())
    } else {
        reconciler.run().await?;
        Ok(())
    }
}
