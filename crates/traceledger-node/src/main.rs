use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use traceledger_core::{Ledger, LedgerConfig, SearchStrategy};
use traceledger_node::{serve, AppState};

#[derive(Parser, Debug)]
#[command(name = "traceledger-node", about = "Traceability ledger HTTP node")]
struct Args {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "TRACELEDGER_LISTEN", default_value = "127.0.0.1:8080")]
    listen: String,

    /// Leading zero hex digits required of a proof hash
    #[arg(long, env = "TRACELEDGER_DIFFICULTY", default_value_t = 4)]
    difficulty: usize,

    /// Spread the proof search over all cores
    #[arg(long, env = "TRACELEDGER_PARALLEL")]
    parallel: bool,
}

impl Args {
    fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            difficulty: self.difficulty,
            search: if self.parallel {
                SearchStrategy::Parallel
            } else {
                SearchStrategy::Sequential
            },
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = args.ledger_config();
    let ledger = Ledger::with_config(&config)?;
    info!(
        difficulty = config.difficulty,
        search = ?config.search,
        "ledger initialised with genesis block"
    );

    let state = AppState::new(ledger);
    let shutdown = state.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                shutdown.cancel();
            }
            Err(e) => warn!("failed to listen for ctrl-c: {e}"),
        }
    });

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    serve(listener, state).await?;
    Ok(())
}
