//! Configuration for the fulfillment engine.
//!
//! Values are merged from, in increasing priority:
//! 1. the YAML file given by `--config` (default `config.yaml`)
//! 2. `FULFILLMENT_`-prefixed environment variables, `__` separating nested keys
//!    (e.g. `FULFILLMENT_METRICS__PORT=9100`)
//! 3. a plain `DATABASE_URL`, which replaces `database.url`
//!
//! Every field has a default, so an absent file yields a usable local config.

use clap::{Parser, Subcommand};
use figment::{
    providers::{Env, Format, Yaml},
    Figment,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::order::OrderLineRequest;
use crate::domain::wallet::DEFAULT_CURRENCY;
use crate::models::ProductId;

#[derive(Parser, Debug, Clone)]
#[command(name = "order-fulfillment", version, about = "Order fulfillment engine")]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "FULFILLMENT_CONFIG", default_value = "config.yaml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Place an order and print it as JSON
    PlaceOrder {
        #[arg(long)]
        user: i64,
        /// Order line as <product_id>:<quantity>, repeatable
        #[arg(long = "line", value_parser = parse_line, required = true)]
        lines: Vec<OrderLineRequest>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        payment_method: Option<String>,
    },
    /// Credit a wallet
    TopUp {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        amount: Decimal,
    },
    /// Create the wallet of a newly registered user
    OpenWallet {
        #[arg(long)]
        user: i64,
        #[arg(long, default_value = DEFAULT_CURRENCY)]
        currency: String,
    },
    /// List a user's orders, newest first
    Orders {
        #[arg(long)]
        user: i64,
    },
    /// Place orders read as JSON lines from stdin, serving /metrics alongside
    Serve,
}

fn parse_line(value: &str) -> Result<OrderLineRequest, String> {
    let (product, quantity) = value
        .split_once(':')
        .ok_or_else(|| format!("expected <product_id>:<quantity>, got '{value}'"))?;

    let product_id = product
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid product id '{product}': {e}"))?;
    let quantity = quantity
        .trim()
        .parse::<i64>()
        .map_err(|e| format!("invalid quantity '{quantity}': {e}"))?;

    Ok(OrderLineRequest::new(ProductId(product_id), quantity))
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub metrics: MetricsConfig,
    pub order: OrderConfig,
    /// Tracing filter directive; `RUST_LOG` wins when set
    pub log_filter: Option<String>,
    /// Plain `DATABASE_URL`, folded into `database.url` by `load`
    #[serde(skip_serializing)]
    pub database_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Metrics server of the `serve` mode
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OrderConfig {
    /// Placements running longer are aborted and rolled back
    #[serde(with = "humantime_serde")]
    pub placement_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            metrics: MetricsConfig::default(),
            order: OrderConfig::default(),
            log_filter: None,
            database_url: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost:5432/fulfillment".to_string(),
            max_connections: 10,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            placement_timeout: Duration::from_secs(5),
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;

        if let Some(url) = config.database_url.take() {
            config.database.url = url;
        }

        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables override specific values
            .merge(Env::prefixed("FULFILLMENT_").split("__"))
            // Common DATABASE_URL pattern
            .merge(Env::raw().only(&["DATABASE_URL"]))
    }
}
