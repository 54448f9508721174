//! Runtime configuration. Every option can come from the command line or the environment.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

pub const DEFAULT_DATABASE: &str = "ledgerline.db";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_FEATURES_REFRESH_SECS: u64 = 60;

/// Options for the HTTP server.
#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    /// Address to bind
    #[arg(long, env = "SERVER_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "SERVER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Remote-config JSON document holding feature flags
    #[arg(long = "features", env = "FEATURES_PATH")]
    pub features_path: Option<PathBuf>,

    /// How often to re-read the feature flag document, in seconds
    #[arg(long, env = "FEATURES_REFRESH_SECS", default_value_t = DEFAULT_FEATURES_REFRESH_SECS)]
    pub features_refresh_secs: u64,

    /// Insert the demo accounts before serving
    #[arg(long)]
    pub seed: bool,
}

impl ServeConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Refresh interval, never shorter than one second.
    pub fn features_refresh(&self) -> Duration {
        Duration::from_secs(self.features_refresh_secs.max(1))
    }
}
