use std::net::SocketAddr;

use clap::Parser;

/// A protocol-translating reverse proxy for the GLM chat upstream.
#[derive(Debug, Parser)]
#[command(name = "glm-relay", version, about)]
pub(crate) struct Args {
    /// Listen address override, e.g. 127.0.0.1:8080.
    #[arg(short, long)]
    pub listen_address: Option<SocketAddr>,

    /// Log filter directive, e.g. `info` or `llm=debug,server=debug`.
    #[arg(long, env = "GLM_RELAY_LOG", default_value = "info")]
    pub log: String,
}
