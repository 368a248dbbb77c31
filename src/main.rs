//! txpipe - command line front end
//!
//! Builds, signs and submits transactions against a JSON-RPC ledger and
//! reports the terminal outcome.
//!
//! ## Commands
//!
//! - **transfer**: send lamports from the configured wallet, optionally
//!   anchored to a durable nonce account
//! - **status**: look up a signature's status
//! - **rent**: minimum rent-exempt balance for an account size
//! - **fee**: current fee schedule and the fee for a simple transfer

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use solana_sdk::{pubkey::Pubkey, signature::Signature};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use txpipe::config::Config;
use txpipe::endpoints;
use txpipe::nonce_manager::fetch_durable_anchor;
use txpipe::rpc_manager::RpcClient;
use txpipe::submission::{cancel_pair, Durability, SubmissionController, SubmissionOutcome};
use txpipe::tx_builder::{instructions, Anchor, ComputeBudget, TransactionDraft};
use txpipe::wallet::Wallet;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "txpipe.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Serve Prometheus metrics on this port while the command runs
    #[arg(long)]
    metrics_port: Option<u16>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Transfer lamports from the configured wallet
    Transfer {
        /// Recipient address
        #[arg(long)]
        to: Pubkey,

        #[arg(long)]
        lamports: u64,

        /// Anchor to this durable nonce account instead of a recent blockhash
        #[arg(long)]
        nonce_account: Option<Pubkey>,

        /// Override the configured durability (seen, confirmed, finalized)
        #[arg(long)]
        durability: Option<Durability>,
    },

    /// Show the status of a signature
    Status { signature: Signature },

    /// Minimum balance for a rent-exempt account of `data_len` bytes
    Rent { data_len: usize },

    /// Fee schedule for the latest blockhash
    Fee,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(args.verbose, config.monitoring.json_logs)?;
    config.validate().context("Invalid configuration")?;

    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("🌐 RPC endpoint: {}", config.rpc.url);

    let metrics_port = args.metrics_port.or(config
        .monitoring
        .enable_metrics
        .then_some(config.monitoring.metrics_port));
    if let Some(port) = metrics_port {
        info!("📊 Starting metrics server on port {}", port);
        tokio::spawn(async move {
            if let Err(e) = endpoints::endpoint_server(port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let client = Arc::new(RpcClient::from_config(&config.rpc).context("Failed to create RPC client")?);

    match args.command {
        Command::Transfer {
            to,
            lamports,
            nonce_account,
            durability,
        } => transfer(&config, client, to, lamports, nonce_account, durability).await,
        Command::Status { signature } => status(&client, &signature).await,
        Command::Rent { data_len } => {
            let lamports = client.get_minimum_balance_for_rent_exemption(data_len).await?;
            println!("{} lamports", lamports);
            Ok(())
        }
        Command::Fee => fee(&config, &client).await,
    }
}

/// Initialize logging subsystem
fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "txpipe=debug,info"
    } else {
        "txpipe=info,warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_target(true)))
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        // Logging is not up yet
        eprintln!("Config file '{}' not found, using defaults", path);
        dotenvy::dotenv().ok();
        let mut config = Config::default();
        config.apply_env_overrides();
        Ok(config)
    }
}

async fn transfer(
    config: &Config,
    client: Arc<RpcClient>,
    to: Pubkey,
    lamports: u64,
    nonce_account: Option<Pubkey>,
    durability: Option<Durability>,
) -> Result<()> {
    info!("🔑 Loading wallet from: {}", config.wallet.keypair_path);
    let wallet = Wallet::from_file(&config.wallet.keypair_path).context("Failed to load wallet")?;
    info!("💼 Wallet address: {}", wallet.pubkey());

    let anchor = match nonce_account {
        Some(account) => fetch_durable_anchor(&client, &account, &wallet.pubkey())
            .await
            .context("Failed to read nonce account")?,
        None => {
            let (blockhash, last_valid_block_height) = client.get_latest_blockhash().await?;
            Anchor::blockhash(blockhash, last_valid_block_height)
        }
    };

    let mut draft = TransactionDraft::new(wallet.pubkey());
    draft
        .add_instruction(instructions::transfer(&wallet.pubkey(), &to, lamports)?)
        .set_compute_budget(ComputeBudget::from(&config.compute_budget))
        .set_anchor(anchor);
    let mut tx = draft.into_transaction()?;
    tx.sign(&[wallet.keypair()]);

    let mut submission = config.submission.to_submission_config();
    if let Some(durability) = durability {
        submission.durability = durability;
    }
    let controller = SubmissionController::new(client, submission);

    let (handle, signal) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Interrupted, no longer waiting for confirmation");
            handle.cancel();
        }
    });

    let report = controller.send_and_confirm_with_cancel(&tx, signal).await?;
    println!("Signature: {}", report.signature);

    match report.outcome {
        SubmissionOutcome::Confirmed { slot, status, .. } => {
            println!("Confirmed in slot {} ({:?})", slot, status);
            Ok(())
        }
        SubmissionOutcome::Failed(reason) => anyhow::bail!("Transaction failed: {}", reason),
        SubmissionOutcome::Expired => {
            anyhow::bail!("Transaction expired before it was included; rebuild and resend")
        }
        SubmissionOutcome::TimedOut => anyhow::bail!(
            "No definitive answer within {}s; check later with `txpipe status {}`",
            config.submission.timeout_secs,
            report.signature
        ),
    }
}

async fn status(client: &RpcClient, signature: &Signature) -> Result<()> {
    match client.get_signature_status(signature).await? {
        Some(status) => {
            println!("Slot: {}", status.slot);
            println!("Confirmations: {:?}", status.confirmations);
            println!("Level: {:?}", status.confirmation_status);
            match status.err {
                Some(err) => println!("Error: {}", err),
                None => println!("Result: ok"),
            }
        }
        None => println!("Not found"),
    }
    Ok(())
}

async fn fee(config: &Config, client: &RpcClient) -> Result<()> {
    let (blockhash, last_valid_block_height) = client.get_latest_blockhash().await?;
    println!("Blockhash: {} (valid through height {})", blockhash, last_valid_block_height);

    if let Some(calculator) = client.get_fee_calculator_for_blockhash(&blockhash).await? {
        println!("Lamports per signature: {}", calculator.lamports_per_signature);
    }

    // Fee for a one-signer self transfer under the configured compute budget
    let payer = Pubkey::new_unique();
    let mut draft = TransactionDraft::new(payer);
    draft
        .add_instruction(instructions::transfer(&payer, &payer, 1)?)
        .set_compute_budget(ComputeBudget::from(&config.compute_budget))
        .set_anchor(Anchor::blockhash(blockhash, last_valid_block_height));
    let message = draft.compile()?.serialize()?;
    match client.get_fee_for_message(&message).await? {
        Some(fee) => println!("Transfer fee: {} lamports", fee),
        None => println!("Transfer fee: unavailable (blockhash expired)"),
    }
    Ok(())
}
