use std::sync::Arc;

use anyhow::Context;
use tokio::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use felicia::channels::{CliChannel, HttpState, http};
use felicia::config::AssistantConfig;
use felicia::conversation::Assistant;
use felicia::llm::create_provider;
use felicia::store::{InMemoryStore, LibSqlStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AssistantConfig::from_env().context("Invalid configuration")?;

    // Initialize tracing; the guard flushes the log file on exit.
    let (file_layer, _log_guard) = match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, "felicia.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    eprintln!("FELICIA v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {} at {}", config.model, config.ollama_url);

    // ── Database ─────────────────────────────────────────────────────────
    let store: Arc<dyn SessionStore> = match LibSqlStore::new_local(&config.db_path).await {
        Ok(store) => {
            eprintln!("   Database: {}", config.db_path.display());
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!("Failed to open database at {}: {e}", config.db_path.display());
            eprintln!("   Database: unavailable, this session will not be saved");
            Arc::new(InMemoryStore::new())
        }
    };

    let llm = create_provider(&config);
    let http_port = config.http_port;
    let assistant = Arc::new(Mutex::new(Assistant::load(config, llm, store).await?));

    // ── HTTP API ─────────────────────────────────────────────────────────
    if let Some(port) = http_port {
        let state = HttpState {
            assistant: Arc::clone(&assistant),
        };
        eprintln!("   HTTP API: http://127.0.0.1:{port}/api/chat");
        tokio::spawn(async move {
            if let Err(e) = http::serve(state, &format!("127.0.0.1:{port}")).await {
                tracing::error!("HTTP API stopped: {e}");
            }
        });
    }

    eprintln!("   Type a message and press Enter. /help for commands, /quit to exit.\n");

    CliChannel::new(assistant)
        .run()
        .await
        .context("Terminal I/O failed")?;
    Ok(())
}
