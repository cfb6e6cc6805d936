//! Netloom - Main entry point
//!
//! Runs one discovery operation or topology query against the inventory
//! file named in the configuration, then exits.

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use netloom_core::{Device, DeviceId, MemoryInventory, PersistencePort};
use netloom_discovery::{parse_address, CancelHandle, DiscoveryEngine, DiscoveryError};
use netloom_snmp::SnmpPort;
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "netloom")]
#[command(about = "Network device discovery and topology inventory")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "netloom.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Discover a single device
    Device { address: String },
    /// Scan every host of an IPv4 subnet
    Scan { cidr: String },
    /// Walk neighbor tables outward from one or more seeds
    Walk {
        #[arg(required = true)]
        seeds: Vec<String>,
    },
    /// List devices in the inventory
    Devices,
    /// Enumerate simple paths between two devices (id, address or name)
    Paths {
        from: String,
        to: String,
        /// Expand each path per parallel link
        #[arg(long)]
        links: bool,
    },
    /// List cycles in the topology
    Cycles,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Netloom v{}", env!("CARGO_PKG_VERSION"));

    let config = config::load_config(&args.config)?;
    info!(
        strategy = %config.discovery.strategy,
        inventory = %config.inventory.path.display(),
        "Configuration loaded"
    );

    let inventory = Arc::new(
        MemoryInventory::load_or_create(&config.inventory.path)
            .with_context(|| format!("loading {}", config.inventory.path.display()))?,
    );
    let port = Arc::new(SnmpPort::new(config.snmp.session.clone()));
    let engine = DiscoveryEngine::new(port, inventory.clone(), config.discovery.clone())?;
    let credentials = config.snmp.credentials();

    // Ctrl-C stops new work; whatever is in flight finishes and is saved
    let cancel = CancelHandle::new();
    let signal = cancel.signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing in-flight discoveries");
            cancel.cancel();
        }
    });

    let mut dirty = false;
    match args.command {
        Command::Device { address } => {
            let address = parse_address(&address)?;
            let device = engine.discover_device(address, &credentials).await?;
            dirty = true;
            print_device(&device);
        }
        Command::Scan { cidr } => {
            let report = engine.discover_subnet(&cidr, &credentials, &signal).await?;
            dirty = true;
            println!("Discovered {} devices in {}:", report.devices.len(), cidr);
            for device in &report.devices {
                print_device(device);
            }
            println!("{} hosts did not answer the pre-check", report.skipped.len());
            print_failures(&report.failures);
            if report.cancelled {
                println!("Scan was cancelled before every host was tried");
            }
        }
        Command::Walk { seeds } => {
            let seeds = seeds
                .iter()
                .map(|s| parse_address(s))
                .collect::<Result<Vec<IpAddr>, _>>()?;
            let report = engine.discover_topology(&seeds, &credentials, &signal).await?;
            dirty = true;
            println!(
                "Reached {} devices over {} connections:",
                report.devices.len(),
                report.connections.len()
            );
            for device in &report.devices {
                print_device(device);
            }
            print_failures(&report.failures);
            if report.truncated {
                println!("Walk stopped at the configured device or depth bound");
            }
            if report.cancelled {
                println!("Walk was cancelled");
            }
        }
        Command::Devices => {
            let devices = engine.list_devices().await?;
            println!("{} devices in inventory:", devices.len());
            for device in &devices {
                print_device(device);
            }
        }
        Command::Paths { from, to, links } => {
            let source = engine.resolve_device(&from).await?;
            let target = engine.resolve_device(&to).await?;
            let names = device_names(&*inventory).await?;
            if links {
                let paths = engine.find_link_paths(source.id, target.id).await?;
                println!("{} link-level paths from {} to {}:", paths.len(), source.name, target.name);
                for path in &paths {
                    println!("  {}", render(&path.devices, &names));
                }
            } else {
                let paths = engine.find_paths(source.id, target.id).await?;
                println!("{} paths from {} to {}:", paths.len(), source.name, target.name);
                for path in &paths {
                    println!("  {}", render(path, &names));
                }
            }
        }
        Command::Cycles => {
            let names = device_names(&*inventory).await?;
            let cycles = engine.find_cycles().await?;
            println!("{} cycles:", cycles.len());
            for cycle in &cycles {
                println!("  {}", render(cycle, &names));
            }
        }
    }

    if dirty {
        inventory
            .save(&config.inventory.path)
            .await
            .with_context(|| format!("saving {}", config.inventory.path.display()))?;
        info!(path = %config.inventory.path.display(), "Inventory saved");
    }

    Ok(())
}

fn print_device(device: &Device) {
    println!(
        "  - {} ({}) at {} [{}, {:?}]",
        device.name, device.id, device.management_address, device.device_type, device.status
    );
    if let Some(vendor) = &device.vendor {
        let model = device.model.as_deref().unwrap_or("unknown model");
        println!("    {} {}", vendor, model);
    }
    if let Some(version) = &device.os_version {
        println!("    Version: {}", version);
    }
    println!("    Interfaces: {}", device.interfaces.len());
}

fn print_failures(failures: &[(IpAddr, DiscoveryError)]) {
    if failures.is_empty() {
        return;
    }
    println!("{} addresses failed:", failures.len());
    for (address, error) in failures {
        println!("  - {}: {}", address, error);
    }
}

async fn device_names(store: &dyn PersistencePort) -> Result<HashMap<DeviceId, String>> {
    Ok(store
        .list_devices()
        .await?
        .into_iter()
        .map(|d| (d.id, d.name))
        .collect())
}

fn render(path: &[DeviceId], names: &HashMap<DeviceId, String>) -> String {
    path.iter()
        .map(|id| names.get(id).cloned().unwrap_or_else(|| id.to_string()))
        .collect::<Vec<_>>()
        .join(" -> ")
}
