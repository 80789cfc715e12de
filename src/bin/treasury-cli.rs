use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "treasury-cli")]
#[command(about = "Operator CLI for the treasury relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Treasury, ledger and scheduler status
    Status,
    /// Chain connectivity
    Health,
    /// Ledger counters
    Earnings,
    /// Credit earnings (USD)
    Credit { usd: f64 },
    /// Withdraw from the treasury to the payout wallet; omit the amount to sweep
    Withdraw {
        #[arg(long)]
        amount_eth: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/status", cli.url)).send().await?,
        Commands::Health => client.get(format!("{}/health", cli.url)).send().await?,
        Commands::Earnings => client.get(format!("{}/earnings", cli.url)).send().await?,
        Commands::Credit { usd } => {
            client
                .post(format!("{}/credit-earnings", cli.url))
                .json(&json!({ "amountUSD": usd }))
                .send()
                .await?
        }
        Commands::Withdraw { amount_eth } => {
            client
                .post(format!("{}/backend-to-payout", cli.url))
                .json(&json!({ "amountETH": amount_eth }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: treasury API returned status {}", status);
    }

    match res.json::<Value>().await {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(e) => eprintln!("Response was not JSON: {}", e),
    }
    Ok(())
}
