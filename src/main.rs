use std::fs::File;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use lanpong::core::config::{ClientConfig, RelayConfig};
use lanpong::games::pong::{self, Relay};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: lanpong server [BIND_ADDR] | lanpong client [SERVER_ADDR]";
const DEFAULT_FILTER: &str = "lanpong=info";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let role = args.get(1).map(|s| s.as_str()).unwrap_or("client");
    let addr = args.get(2).cloned();

    match role {
        "server" | "--server" => {
            let mut config = RelayConfig::default().merge_env()?;
            if let Some(addr) = addr {
                config.bind_addr = addr;
            }
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .init();

            Relay::bind(config)?.run().await?;
        }
        "client" | "--client" => {
            let mut config = ClientConfig::default().merge_env()?;
            if let Some(addr) = addr {
                config.server_addr = addr;
            }
            config.validate()?;

            // The terminal belongs to the renderer, so logs go to a file.
            let log = File::create(&config.log_file)
                .with_context(|| format!("opening log file {}", config.log_file.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(Mutex::new(log))
                .with_ansi(false)
                .init();

            let terminal = ratatui::init();
            let result = pong::run_client(config, terminal).await;
            ratatui::restore();
            result?;
        }
        other => bail!("unknown role '{other}'\n{USAGE}"),
    }
    Ok(())
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
