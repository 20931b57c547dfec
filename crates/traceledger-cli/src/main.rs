use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};
use traceledger_core::{validate_chain, Block, ProofOfWork};

#[derive(Parser, Debug)]
#[command(name = "traceledger-cli")]
#[command(about = "CLI client for the traceability ledger node")]
struct Cli {
    /// Node base URL (e.g. http://127.0.0.1:8080)
    #[arg(long, global = true, default_value = "http://127.0.0.1:8080")]
    node: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a transaction and wait for its block to be sealed
    Submit {
        /// Sender id
        #[arg(long)]
        from: String,
        /// Receiver id
        #[arg(long)]
        to: String,
        /// Quantity moved
        #[arg(long)]
        amount: f64,
        /// Product the transaction refers to
        #[arg(long)]
        product: String,
        /// Transaction type tag (transfer, sale, shipment, ...)
        #[arg(long = "type", default_value = "transfer")]
        kind: String,
    },
    /// Print the whole chain
    Chain,
    /// Print one block and its hash
    Block {
        /// 1-based block index
        index: u64,
    },
    /// Ask the node whether its chain is valid, then re-check it locally
    Verify {
        /// Difficulty the node was started with
        #[arg(long, default_value_t = 4)]
        difficulty: usize,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Tx {
    sender_id: String,
    receiver_id: String,
    amount: f64,
    product_id: String,
    transaction_type: String,
}

#[derive(Deserialize)]
struct ChainResponse {
    chain: Vec<Block>,
    length: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let node = cli.node.trim_end_matches('/');
    match cli.cmd {
        Command::Submit {
            from,
            to,
            amount,
            product,
            kind,
        } => {
            let tx = Tx {
                sender_id: from,
                receiver_id: to,
                amount,
                product_id: product,
                transaction_type: kind,
            };
            let res = client
                .post(format!("{node}/api/transactions"))
                .json(&tx)
                .send()
                .await?;
            let status = res.status();
            let body = res.text().await?;
            println!("status: {status}");
            println!("{body}");
        }
        Command::Chain => {
            let body: Value = get_json(&client, &format!("{node}/api/blockchain")).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Block { index } => {
            let body: Value =
                get_json(&client, &format!("{node}/api/blockchain/blocks/{index}")).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::Verify { difficulty } => {
            let remote: Value = get_json(&client, &format!("{node}/api/blockchain/valid")).await?;
            println!("node reports: {remote}");
            let chain: ChainResponse = get_json(&client, &format!("{node}/api/blockchain")).await?;
            debug!(length = chain.length, "fetched chain");
            match validate_chain(&chain.chain, &ProofOfWork::new(difficulty)) {
                Ok(()) => println!("local check: {} blocks, valid", chain.length),
                Err(violation) => println!("local check: INVALID ({violation})"),
            }
        }
    }
    Ok(())
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T> {
    client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("GET {url}"))?
        .json()
        .await
        .with_context(|| format!("decode {url}"))
}
