//! Counter demo: a console client against an in-process cluster.
//!
//! Starts `--hosts` hosts sharing one membership view, placement directory
//! and state store, then drives a single counter key from a menu.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin counter-demo
//! cargo run --bin counter-demo -- --hosts 3 --data-dir ./counter-data --key visits
//! ```
//!
//! "Kill owning host" crashes the host currently running the counter and
//! reports it dead; the next call re-activates the counter on another host
//! from its last saved value.

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tidepool::actors::{
    ActivationConfig, ActorHost, ClusterClient, ClusterConfig, FileStateStore, HostConfig,
    HostStatus, InMemoryStateStore, MembershipProvider, SharedMembership, StateStore,
};
use tidepool::counter::{Counter, CounterRef};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "counter-demo")]
#[command(about = "Virtual counter actor on an in-process cluster", long_about = None)]
struct Args {
    /// Number of hosts in the cluster
    #[arg(long, default_value = "3")]
    hosts: u16,

    /// Port of the first host; hosts use sequential ports
    #[arg(long, default_value = "11111")]
    base_port: u16,

    /// Persist counters as files under this directory (in memory if unset)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Seconds of inactivity before a counter is deactivated
    #[arg(long, default_value = "600")]
    idle_secs: u64,

    /// Counter key to operate on
    #[arg(long, default_value = "counter")]
    key: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tidepool=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    if args.hosts == 0 {
        return Err("at least one host is required".into());
    }

    let store: Arc<dyn StateStore> = match &args.data_dir {
        Some(dir) => Arc::new(FileStateStore::open(dir).await?),
        None => Arc::new(InMemoryStateStore::new()),
    };
    let cluster = ClusterConfig::builder()
        .name("counter-demo")
        .membership(Arc::new(SharedMembership::new()))
        .state_store(store)
        .build()?;

    let activation =
        ActivationConfig::default().with_idle_timeout(Duration::from_secs(args.idle_secs));
    let mut hosts = Vec::with_capacity(usize::from(args.hosts));
    for offset in 0..args.hosts {
        let address = format!("127.0.0.1:{}", args.base_port.saturating_add(offset));
        let config = HostConfig::builder(address)
            .activation(activation.clone())
            .build();
        let host = ActorHost::new(cluster.clone(), config)
            .register::<Counter>()
            .start()
            .await?;
        hosts.push(host);
    }

    let client = ClusterClient::new(&cluster);
    let counter: CounterRef = client.actor_ref(args.key.clone());
    tracing::info!(key = %args.key, hosts = hosts.len(), "cluster ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        println!();
        println!("Counter '{}'", args.key);
        println!("  1) Increment");
        println!("  2) Get count");
        println!("  3) Reset");
        println!("  4) Host info");
        println!("  5) Kill owning host");
        println!("  6) Exit");

        let Some(choice) = lines.next_line().await? else {
            break;
        };
        match choice.trim() {
            "1" => {
                println!("Delta (default 1):");
                let delta = match lines.next_line().await? {
                    Some(line) => line.trim().parse().unwrap_or_else(|_| {
                        println!("Invalid input. Using default increment of 1.");
                        1
                    }),
                    None => 1,
                };
                match counter.increment(delta).await {
                    Ok(value) => println!("Count: {value}"),
                    Err(e) => println!("Increment failed: {e}"),
                }
            }
            "2" => match counter.get_count().await {
                Ok(value) => println!("Count: {value}"),
                Err(e) => println!("Get failed: {e}"),
            },
            "3" => match counter.reset().await {
                Ok(()) => println!("Counter reset"),
                Err(e) => println!("Reset failed: {e}"),
            },
            "4" => match counter.get_host_info().await {
                Ok(info) => println!("{info}"),
                Err(e) => println!("Host info failed: {e}"),
            },
            "5" => {
                let info = match counter.get_host_info().await {
                    Ok(info) => info,
                    Err(e) => {
                        println!("Cannot locate counter: {e}");
                        continue;
                    }
                };
                let owner = hosts.iter().position(|h| {
                    h.id().address == info.host_address
                        && h.id().generation == info.host_generation
                });
                let Some(index) = owner else {
                    println!("Owning host not found");
                    continue;
                };
                let host = hosts.swap_remove(index);
                let id = host.id().clone();
                host.crash();
                cluster
                    .membership()
                    .update_status(&id, HostStatus::Dead)
                    .await?;
                println!("Killed {id}; {} host(s) left", hosts.len());
            }
            "6" => break,
            other => println!("Unknown choice '{other}'"),
        }
    }

    for host in hosts {
        host.shutdown().await?;
    }
    Ok(())
}
