use anyhow::Context;
use clap::Parser;
use std::io::{Read, Write};

/// Meshclaw: per-message LLM bridge for a Meshtastic relay.
///
/// The host relay runs this binary once per inbound mesh message with the
/// message payload as JSON on stdin. Exactly one JSON object is printed on
/// stdout ({"response": ...} or {"responses": [...]}); logs go to stderr.
#[derive(Parser)]
#[command(name = "meshclaw", version)]
struct Cli {
    /// Config file path (default: MESHCLAW_CONFIG_PATH or ~/.meshclaw/config.json)
    #[arg(long, short, value_name = "PATH")]
    config: Option<std::path::PathBuf>,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    // Bad config is fatal before any network call: nothing is emitted on
    // stdout and the relay sees a non-zero exit instead of a contract object.
    let config = match lib::config::load_config(cli.config) {
        Ok(config) => config,
        Err(e) => {
            log::error!("config: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        log::error!("bridge failed: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: lib::config::Config) -> anyhow::Result<()> {
    let mut raw = String::new();
    std::io::stdin()
        .read_to_string(&mut raw)
        .context("reading stdin")?;

    let chunks = match lib::relay::InboundMessage::from_stdin(&raw) {
        Some(msg) => {
            let provider = lib::llm::provider_for(&config.provider);
            let dispatcher = lib::dispatch::Dispatcher::new(&config, provider.as_ref());
            dispatcher.handle(&msg).await.chunks
        }
        None => {
            log::debug!("payload carried no message text, ignoring");
            Vec::new()
        }
    };

    let out = lib::relay::encode(&chunks);
    let mut stdout = std::io::stdout();
    stdout.write_all(out.as_bytes()).context("writing stdout")?;
    stdout.flush().context("flushing stdout")?;
    Ok(())
}
