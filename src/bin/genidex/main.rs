//! Command line client of the GeniDex exchange.
//!
//! Reads order books and markets, places limit orders and tracks transactions
//! until they are confirmed.

mod config;
mod error;

use std::process::exit;

use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::client::RpcClient,
};
use clap::Parser;
use genidex_sdk::{
    GeniDex, NetworkRegistry, Signer,
    error::DexError,
    num::format_canonical,
    types::{Order, OrderSide},
};
use tracing::{error, info, warn};

use config::{CliConfig, Command, EnvConfig, OrderArgs};
use error::{Error, Result};

#[tokio::main]
async fn main() {
    // Load .env file
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("Warning: Failed to load .env file: {}", e);
    }

    // Parse environment configuration
    let env_config = match EnvConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to parse environment configuration: {}", e);
            exit(1);
        }
    };

    // Parse CLI arguments
    let cli_config = CliConfig::parse();

    // Set up logging
    if std::env::var("RUST_LOG").is_err() {
        unsafe {
            std::env::set_var("RUST_LOG", "info");
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = run(env_config, cli_config).await {
        error!(%e, "Command failed");
        exit(1);
    }
}

async fn run(env_config: EnvConfig, cli_config: CliConfig) -> Result<()> {
    let registry = NetworkRegistry::from_path(&env_config.genidex_networks_path)?;
    let network = registry.get_network(&env_config.genidex_network)?;

    let rpc_client = RpcClient::new_http(env_config.rpc_url()?);
    let key = env_config.signer()?;
    let trader = key.as_ref().map(|k| k.address());
    let provider = match key {
        Some(key) => DynProvider::new(
            ProviderBuilder::new()
                .wallet(EthereumWallet::new(key))
                .connect_client(rpc_client),
        ),
        None => DynProvider::new(ProviderBuilder::new().connect_client(rpc_client)),
    };

    let dex = GeniDex::connect(provider.clone(), network).await?;
    info!(network = network.name(), exchange = %dex.gateway().address(), "Connected");

    let signer = || {
        trader
            .map(|address| Signer::new(provider.clone(), address))
            .ok_or(Error::MissingPrivateKey)
    };

    match &cli_config.command {
        Command::Orders { market_id, side } => {
            let sides = match side {
                Some(side) => vec![OrderSide::from(*side)],
                None => vec![OrderSide::Buy, OrderSide::Sell],
            };
            for side in sides {
                let orders = dex.orders(*market_id, side).await?;
                println!("{side:?} orders of market {market_id}:");
                orders
                    .iter()
                    .filter(|o| !o.is_filled())
                    .for_each(print_order);
            }
        }
        Command::Market { market_id } => {
            let market = dex.market(*market_id).await?;
            println!("{} (#{})", market.symbol(), market.id());
            println!("  price:       {}", format_canonical(market.price()));
            println!("  base token:  {}", market.base());
            println!("  quote token: {}", market.quote());
            println!("  rewardable:  {}", market.is_rewardable());
        }
        Command::Wait { hash } => {
            let receipt = dex
                .gateway()
                .wait(*hash, cli_config.wait_options())
                .await?;
            println!(
                "Transaction {hash} confirmed in block {}",
                receipt.block_number.unwrap_or_default()
            );
            for log in dex.decode_logs(&receipt) {
                println!("  {}: {}", log.name, serde_json::Value::Object(log.args_object()));
            }
        }
        Command::FindTx { from, nonce } => {
            match dex.gateway().find_tx_by_nonce(*from, *nonce).await? {
                Some(tx) => println!("Transaction of {from} with nonce {nonce}: {}", tx.hash),
                None => println!("No recent transaction of {from} with nonce {nonce}"),
            }
        }
        Command::Buy(args) => place(&dex, &signer()?, OrderSide::Buy, args, &cli_config).await?,
        Command::Sell(args) => place(&dex, &signer()?, OrderSide::Sell, args, &cli_config).await?,
    }
    Ok(())
}

fn print_order(order: &Order) {
    println!(
        "  #{:<6} {} @ {}  ({})",
        order.id(),
        format_canonical(order.quantity()),
        format_canonical(order.price()),
        order.trader()
    );
}

async fn place(
    dex: &GeniDex<DynProvider>,
    signer: &Signer<DynProvider>,
    side: OrderSide,
    args: &OrderArgs,
    cli_config: &CliConfig,
) -> Result<()> {
    let order = args.to_place_order()?;
    let tx = match side {
        OrderSide::Buy => dex.place_buy_order(signer, order).await?,
        OrderSide::Sell => dex.place_sell_order(signer, order).await?,
    };
    info!(hash = %tx.hash(), "Order submitted");

    let receipt = match tx.wait_for_confirms(cli_config.wait_options()).await {
        Ok(receipt) => receipt,
        // The transaction was replaced, follow the replacement
        Err(DexError::Dropped(dropped)) => {
            let Some(replacement) = find_replacement(dex, tx.sender(), tx.nonce()).await? else {
                return Err(DexError::Dropped(dropped).into());
            };
            warn!(original = %dropped.hash, %replacement, "Order transaction was replaced");
            dex.gateway()
                .wait(replacement, cli_config.wait_options())
                .await?
        }
        Err(e) => return Err(e.into()),
    };

    println!(
        "Order confirmed in block {}",
        receipt.block_number.unwrap_or_default()
    );
    for log in dex.decode_logs(&receipt) {
        println!("  {}: {}", log.name, serde_json::Value::Object(log.args_object()));
    }
    Ok(())
}

async fn find_replacement<P: Provider + Clone>(
    dex: &GeniDex<P>,
    from: Address,
    nonce: u64,
) -> Result<Option<alloy::primitives::TxHash>> {
    Ok(dex
        .gateway()
        .find_tx_by_nonce(from, nonce)
        .await?
        .map(|tx| tx.hash))
}
