use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::Parser;

use crate::error::ServerError;

/// Real-time shared canvas server
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Directory of static client assets to serve as the fallback route
    #[arg(long, env = "PUBLIC_DIR")]
    pub public_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error), overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    pub fn bind_addr(&self) -> Result<SocketAddr, ServerError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ServerError::Address(self.host.clone()))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
