//! Deposit and withdraw from the command line.
//!
//! Signs locally with `WALLET_PRIVATE_KEY` and records deposits through the
//! aggregator's HTTP API.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use dotenvy::dotenv;
use rust_decimal::Decimal;
use secrecy::SecretString;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use solana_yield_aggregator::app::{
    OrchestratorConfig, PollConfig, TransactionOrchestrator, TransactionReceipt,
};
use solana_yield_aggregator::domain::{
    BlockchainClient, Cluster, DepositStore, TransactionKind, WalletSigner, explorer_url,
    lamports_to_sol,
};
use solana_yield_aggregator::infra::{
    CachedDepositStore, KeypairWallet, RestDepositStore, RpcBlockchainClient,
};

#[derive(Parser)]
#[command(name = "yield_cli")]
#[command(about = "Deposit into and withdraw from yield strategies", long_about = None)]
struct Cli {
    #[arg(long, env = "SOLANA_RPC_URL", default_value = "https://api.testnet.solana.com")]
    rpc_url: String,

    #[arg(long, env = "API_BASE_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Base58 secret key (32-byte seed or 64-byte keypair)
    #[arg(long, env = "WALLET_PRIVATE_KEY", hide_env_values = true)]
    private_key: String,

    /// Confirmation budget; 0 checks once after the settle delay
    #[arg(long, default_value_t = 30)]
    max_wait_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deposit SOL into a strategy pool
    Deposit {
        #[arg(long)]
        strategy_id: Option<i32>,
        /// Amount in SOL
        #[arg(long)]
        amount: Decimal,
        /// Pool address receiving the deposit
        #[arg(long)]
        pool: String,
    },
    /// Withdraw one of your active deposits
    Withdraw {
        #[arg(long)]
        deposit_id: i32,
    },
    /// List your active deposits
    Deposits,
    /// Show your wallet balance
    Balance,
}

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Print status titles as the attempt moves through its states.
fn spawn_status_printer(
    orchestrator: &TransactionOrchestrator,
    kind: TransactionKind,
    cluster: Cluster,
) -> tokio::task::JoinHandle<()> {
    let mut statuses = orchestrator.subscribe();
    tokio::spawn(async move {
        while statuses.changed().await.is_ok() {
            let message = statuses.borrow_and_update().message(kind, cluster);
            println!("• {}: {}", message.title, message.description);
        }
    })
}

fn print_receipt(receipt: &TransactionReceipt, cluster: Cluster) {
    println!("Signature: {}", receipt.signature);
    println!("Explorer:  {}", explorer_url(&receipt.signature, cluster));
    if let Some(warning) = &receipt.bookkeeping_warning {
        println!("⚠ Transfer confirmed but the deposit record was not updated: {}", warning);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    let cluster = Cluster::from_rpc_url(&cli.rpc_url);
    let blockchain: Arc<dyn BlockchainClient> = Arc::new(
        RpcBlockchainClient::with_defaults(&cli.rpc_url).context("Failed to create RPC client")?,
    );
    let wallet = Arc::new(
        KeypairWallet::from_base58(&SecretString::from(cli.private_key))
            .context("Failed to load WALLET_PRIVATE_KEY")?,
    );
    let wallet_address = wallet.public_key();
    let rest_store: Arc<dyn DepositStore> = Arc::new(
        RestDepositStore::new(&cli.api_url, Duration::from_secs(10))
            .context("Failed to create API client")?,
    );
    let store: Arc<dyn DepositStore> = Arc::new(CachedDepositStore::with_defaults(rest_store));

    let config = OrchestratorConfig {
        cluster,
        poll: PollConfig {
            max_wait: Duration::from_secs(cli.max_wait_secs),
            ..PollConfig::default()
        },
        ..OrchestratorConfig::default()
    };
    let orchestrator = TransactionOrchestrator::new(
        Arc::clone(&blockchain),
        wallet.clone() as Arc<dyn WalletSigner>,
        Arc::clone(&store),
        config,
    );

    match cli.command {
        Commands::Deposit {
            strategy_id,
            amount,
            pool,
        } => {
            let unsigned = orchestrator
                .builder()
                .build(&wallet_address, &pool, amount)
                .await?;
            let fee = orchestrator.builder().estimate_fee(&unsigned).await;
            println!(
                "Depositing {} SOL from {} to {} (network fee ≈ {} SOL)",
                amount,
                wallet_address,
                pool,
                lamports_to_sol(fee)
            );

            let printer = spawn_status_printer(&orchestrator, TransactionKind::Deposit, cluster);
            let result = orchestrator.deposit(amount, &pool, strategy_id).await;
            printer.abort();

            let receipt = result?;
            print_receipt(&receipt, cluster);
            if let Some(deposit) = &receipt.deposit {
                println!("Recorded deposit #{}", deposit.id);
            }
        }
        Commands::Withdraw { deposit_id } => {
            let deposit = store
                .list_active_deposits(&wallet_address)
                .await?
                .into_iter()
                .find(|d| d.id == deposit_id)
                .ok_or_else(|| anyhow!("No active deposit #{} for {}", deposit_id, wallet_address))?;
            println!("Withdrawing {} {} (deposit #{})", deposit.amount, deposit.token_symbol, deposit.id);

            let printer = spawn_status_printer(&orchestrator, TransactionKind::Withdraw, cluster);
            let result = orchestrator
                .withdraw(&deposit, |_| println!("Withdrawal complete"))
                .await;
            printer.abort();

            print_receipt(&result?, cluster);
        }
        Commands::Deposits => {
            let deposits = store.list_active_deposits(&wallet_address).await?;
            if deposits.is_empty() {
                println!("No active deposits for {}", wallet_address);
            }
            for deposit in deposits {
                println!(
                    "#{:<5} {:>14} {:<5} {:<10} strategy {:<6} {}",
                    deposit.id,
                    deposit.amount,
                    deposit.token_symbol,
                    deposit.status,
                    deposit
                        .strategy_id
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "-".to_string()),
                    deposit.timestamp.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
        Commands::Balance => {
            let lamports = blockchain.get_balance(&wallet_address).await?;
            println!("{}: {} SOL", wallet_address, lamports_to_sol(lamports));
        }
    }

    Ok(())
}
