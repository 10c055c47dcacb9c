use clap::{Parser, Subcommand};
use eth_tx_watcher::config::AppConfig;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "watcher-cli")]
#[command(about = "Query and control a running transaction watcher")]
#[command(version)]
struct Cli {
    /// Base URL of the watcher's HTTP API
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the node's latest block as seen through the watcher
    CurrentBlock,
    /// Start indexing an address
    Subscribe { address: String },
    /// List the recorded transactions of an address
    Transactions { address: String },
    /// Show the cursor and the number of subscriptions
    Status,
    /// Print a configuration file with every default filled in
    SampleConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let base = cli.server.trim_end_matches('/').to_string();
    let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

    let envelope = match cli.command {
        Commands::SampleConfig => {
            print!("{}", AppConfig::generate_sample_config()?);
            return Ok(());
        }
        Commands::CurrentBlock => {
            client
                .get(format!("{}/v1/get_current_block", base))
                .send()
                .await?
                .json::<Value>()
                .await?
        }
        Commands::Subscribe { address } => {
            client
                .post(format!("{}/v1/subscribe", base))
                .json(&json!({ "address": address }))
                .send()
                .await?
                .json::<Value>()
                .await?
        }
        Commands::Transactions { address } => {
            client
                .get(format!("{}/v1/get_transactions", base))
                .query(&[("address", address.as_str())])
                .send()
                .await?
                .json::<Value>()
                .await?
        }
        Commands::Status => {
            client
                .get(format!("{}/v1/status", base))
                .send()
                .await?
                .json::<Value>()
                .await?
        }
    };

    if envelope["code"] != json!(0) {
        let message = envelope["msg"].as_str().unwrap_or("unknown error");
        eprintln!("Error: {}", message);
        std::process::exit(1);
    }

    match &envelope["data"] {
        Value::Null => println!("ok"),
        data => println!("{}", serde_json::to_string_pretty(data)?),
    }

    Ok(())
}
