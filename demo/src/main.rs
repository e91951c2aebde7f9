//! Headless two-role sample: an authoritative server and mirroring clients.

mod capture;
mod client;
mod command;
mod config;
mod game;
mod server;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;

use crate::capture::Capture;
use crate::config::DemoConfig;

#[derive(Parser)]
#[command(name = "mpnet-demo", version, about = "mpnet replication demo")]
struct Args {
    #[command(subcommand)]
    role: RoleArgs,

    /// JSON file with default settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Simulation ticks per second.
    #[arg(long, global = true)]
    tick_hz: Option<u32>,

    /// Record every outbound frame to this file.
    #[arg(long, global = true)]
    capture: Option<PathBuf>,

    /// Seed for enemy placement.
    #[arg(long, global = true)]
    seed: Option<u64>,
}

#[derive(Subcommand)]
enum RoleArgs {
    /// Run the authoritative server.
    Server {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Connect to a server and mirror its world.
    Client {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Args {
    fn resolve(&self) -> Result<DemoConfig> {
        let mut config = match &self.config {
            Some(path) => DemoConfig::load(path)?,
            None => DemoConfig::default(),
        };
        if let Some(tick_hz) = self.tick_hz {
            config.tick_hz = tick_hz;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        match &self.role {
            RoleArgs::Server { port } => {
                if let Some(port) = port {
                    config.port = *port;
                }
            }
            RoleArgs::Client { host, port } => {
                if let Some(host) = host {
                    config.host.clone_from(host);
                }
                if let Some(port) = port {
                    config.port = *port;
                }
            }
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.resolve()?;
    let capture = args
        .capture
        .as_deref()
        .map(|path| {
            Capture::create(path, config.limits())
                .with_context(|| format!("create capture {}", path.display()))
        })
        .transpose()?;
    if let Some(path) = &args.capture {
        info!("capturing outbound frames to {}", path.display());
    }

    let result = match args.role {
        RoleArgs::Server { .. } => server::run(&config, capture.as_ref()),
        RoleArgs::Client { .. } => client::run(&config, capture.as_ref()),
    };
    if let Some(capture) = &capture {
        capture.flush();
    }
    result
}
