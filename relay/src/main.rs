use clap::Parser;
use tokio_util::sync::CancellationToken;

use args::Args;

mod args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = config::Config::from_env()?;

    // The debug flag widens the default filter; an explicit --log wins.
    let log_filter = if config.server.debug && args.log == "info" {
        "debug"
    } else {
        args.log.as_str()
    };

    server::init_logger(log_filter);

    if let Some(listen_address) = args.listen_address {
        config.server.listen_address = listen_address;
    }

    let shutdown_signal = CancellationToken::new();

    {
        let shutdown_signal = shutdown_signal.clone();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::info!("Received Ctrl-C");
                shutdown_signal.cancel();
            }
        });
    }

    server::serve(server::ServeConfig {
        config,
        shutdown_signal,
        version: env!("CARGO_PKG_VERSION").to_string(),
        bound_addr_sender: None,
    })
    .await
}
