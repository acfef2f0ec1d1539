// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for the fulfillment engine
// ============================================================================
//
// Provides metrics for:
// - Order placement outcomes and latency
// - Stock reservations rejected by the ledger
// - Wallet debits rejected and credits applied
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the engine
pub struct Metrics {
    registry: Registry,

    // Order Metrics
    pub orders_placed: IntCounter,
    pub orders_rejected: IntCounterVec,
    pub order_placement_duration: HistogramVec,

    // Ledger Metrics
    pub stock_reservations_rejected: IntCounter,
    pub wallet_debits_rejected: IntCounter,
    pub wallet_credits: IntCounter,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Order Metrics
        let orders_placed = IntCounter::new("orders_placed_total", "Total orders committed")?;
        registry.register(Box::new(orders_placed.clone()))?;

        let orders_rejected = IntCounterVec::new(
            Opts::new("orders_rejected_total", "Total order placements that failed"),
            &["reason"],
        )?;
        registry.register(Box::new(orders_rejected.clone()))?;

        let order_placement_duration = HistogramVec::new(
            HistogramOpts::new(
                "order_placement_duration_seconds",
                "Order placement duration, resolution through commit",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["outcome"],
        )?;
        registry.register(Box::new(order_placement_duration.clone()))?;

        // Ledger Metrics
        let stock_reservations_rejected = IntCounter::new(
            "stock_reservations_rejected_total",
            "Stock reservations refused for insufficient stock",
        )?;
        registry.register(Box::new(stock_reservations_rejected.clone()))?;

        let wallet_debits_rejected = IntCounter::new(
            "wallet_debits_rejected_total",
            "Wallet debits refused for insufficient balance",
        )?;
        registry.register(Box::new(wallet_debits_rejected.clone()))?;

        let wallet_credits = IntCounter::new("wallet_credits_total", "Wallet credits applied")?;
        registry.register(Box::new(wallet_credits.clone()))?;

        Ok(Self {
            registry,
            orders_placed,
            orders_rejected,
            order_placement_duration,
            stock_reservations_rejected,
            wallet_debits_rejected,
            wallet_credits,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Helper to record a committed order
    pub fn record_order_placed(&self, duration_secs: f64) {
        self.orders_placed.inc();
        self.order_placement_duration
            .with_label_values(&["placed"])
            .observe(duration_secs);
    }

    /// Helper to record a failed placement
    pub fn record_order_rejected(&self, reason: &str, duration_secs: f64) {
        self.orders_rejected.with_label_values(&[reason]).inc();
        self.order_placement_duration
            .with_label_values(&["rejected"])
            .observe(duration_secs);
    }

    pub fn record_stock_rejection(&self) {
        self.stock_reservations_rejected.inc();
    }

    pub fn record_debit_rejection(&self) {
        self.wallet_debits_rejected.inc();
    }

    pub fn record_credit(&self) {
        self.wallet_credits.inc();
    }
}
