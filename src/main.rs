use clap::Parser;
use serde::Serialize;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use order_fulfillment::config::{Args, Command, Config, MetricsConfig};
use order_fulfillment::domain::order::{OrderAssembler, PlaceOrder};
use order_fulfillment::intake;
use order_fulfillment::metrics::{self, Metrics};
use order_fulfillment::models::UserId;
use order_fulfillment::persistence::{OrderReader, PgStore};

const DEFAULT_LOG_FILTER: &str = "info,order_fulfillment=debug";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = Config::load(&args)?;

    // Initialize structured logging with environment-based filtering
    // RUST_LOG wins over the configured filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(config.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
        }))
        .init();

    let metrics = Arc::new(Metrics::new()?);

    let store = Arc::new(PgStore::connect(&config.database).await?);
    let assembler = OrderAssembler::new(store.clone(), metrics.clone())
        .with_timeout(config.order.placement_timeout);

    match args.command {
        Command::PlaceOrder {
            user,
            lines,
            address,
            payment_method,
        } => {
            let command = PlaceOrder {
                user_id: UserId(user),
                lines,
                address,
                payment_method,
            };

            let order = assembler.place_order(command).await?;
            print_json(&order)?;
        }
        Command::TopUp { user, amount } => {
            let balance = assembler
                .wallet_ledger()
                .top_up(store.as_ref(), UserId(user), amount)
                .await?;
            print_json(&serde_json::json!({ "user_id": user, "balance": balance }))?;
        }
        Command::OpenWallet { user, currency } => {
            let wallet = assembler
                .wallet_ledger()
                .open_wallet(store.as_ref(), UserId(user), &currency)
                .await?;
            print_json(&wallet)?;
        }
        Command::Orders { user } => {
            let orders = store.orders_for_user(UserId(user)).await?;
            tracing::debug!(user_id = user, count = orders.len(), "Loaded orders");
            print_json(&orders)?;
        }
        Command::Serve => serve(&assembler, &metrics, &config.metrics).await?,
    }

    Ok(())
}

/// Place orders from stdin until it closes or the process is interrupted.
/// The metrics server shares the assembler's registry.
async fn serve(
    assembler: &OrderAssembler<PgStore>,
    metrics: &Metrics,
    metrics_config: &MetricsConfig,
) -> anyhow::Result<()> {
    if metrics_config.enabled {
        // Start metrics HTTP server in background thread
        let registry = Arc::new(metrics.registry().clone());
        let port = metrics_config.port;
        std::thread::spawn(move || match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(async {
                if let Err(e) = metrics::start_metrics_server(registry, port).await {
                    tracing::error!(error = %e, "Metrics server error");
                }
            }),
            Err(e) => tracing::error!(error = %e, "Failed to start metrics runtime"),
        });
    } else {
        tracing::info!("Metrics server disabled");
    }

    tracing::info!("🚀 Accepting orders on stdin, one JSON request per line");

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let interrupted = tokio::select! {
        summary = intake::serve_orders(assembler, stdin, tokio::io::stdout()) => {
            summary?;
            false
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            tracing::info!("Received Ctrl+C signal");
            true
        }
    };

    if metrics_config.enabled && !interrupted {
        tracing::info!("Input closed, serving metrics until interrupted");
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
