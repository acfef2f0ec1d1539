//! Line-delimited order intake.
//!
//! Each input line is a JSON `PlaceOrder`; each output line is either
//! `{"order": {...}}` or `{"error": {"reason", "category", "message"}}`.
//! Lines are placed one at a time through a shared [`OrderAssembler`], so the
//! process keeps recording into the same metrics registry for as long as the
//! input stays open.

use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::order::{ErrorCategory, Order, OrderAssembler, OrderError, PlaceOrder};
use crate::persistence::Store;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IntakeSummary {
    pub placed: u64,
    pub rejected: u64,
    pub malformed: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
enum Reply<'a> {
    Order(&'a Order),
    Error {
        reason: &'a str,
        category: ErrorCategory,
        message: String,
    },
}

impl<'a> Reply<'a> {
    fn rejected(err: &OrderError) -> Self {
        Reply::Error {
            reason: err.reason(),
            category: err.category(),
            message: err.to_string(),
        }
    }
}

/// Place every order read from `reader` until it is exhausted, writing one
/// reply line per request to `writer`.
pub async fn serve_orders<S, R, W>(
    assembler: &OrderAssembler<S>,
    reader: R,
    mut writer: W,
) -> anyhow::Result<IntakeSummary>
where
    S: Store,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut summary = IntakeSummary::default();
    let mut lines = reader.lines();
    let mut line_number: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<PlaceOrder>(trimmed) {
            Ok(command) => match assembler.place_order(command).await {
                Ok(order) => {
                    summary.placed += 1;
                    serde_json::to_string(&Reply::Order(&order))?
                }
                Err(e) => {
                    summary.rejected += 1;
                    serde_json::to_string(&Reply::rejected(&e))?
                }
            },
            Err(e) => {
                tracing::warn!(line_number, error = %e, "Malformed order request");
                summary.malformed += 1;
                serde_json::to_string(&Reply::Error {
                    reason: "malformed_request",
                    category: ErrorCategory::Input,
                    message: format!("line {line_number}: {e}"),
                })?
            }
        };

        writer.write_all(reply.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    tracing::info!(
        placed = summary.placed,
        rejected = summary.rejected,
        malformed = summary.malformed,
        "Order intake drained"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::Product;
    use crate::domain::wallet::DEFAULT_CURRENCY;
    use crate::metrics::Metrics;
    use crate::models::{ProductId, UserId};
    use crate::persistence::{InMemoryStore, LedgerReader};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    async fn setup() -> (Arc<InMemoryStore>, Arc<Metrics>, OrderAssembler<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let assembler = OrderAssembler::new(store.clone(), metrics.clone());

        store
            .insert_product(Product::new(ProductId(1), "Lamp", "LMP-1", 2))
            .await;
        store.add_price_rule(ProductId(1), None, dec!(15)).await;
        assembler
            .wallet_ledger()
            .open_wallet(store.as_ref(), UserId(1), DEFAULT_CURRENCY)
            .await
            .unwrap();
        assembler
            .wallet_ledger()
            .top_up(store.as_ref(), UserId(1), dec!(100))
            .await
            .unwrap();

        (store, metrics, assembler)
    }

    #[tokio::test]
    async fn test_replies_one_line_per_request() {
        let (store, _metrics, assembler) = setup().await;
        let input = concat!(
            r#"{"user_id":1,"lines":[{"product_id":1,"quantity":1}],"address":"1 Quay St"}"#,
            "\n\n",
            "not json\n",
            r#"{"user_id":1,"lines":[{"product_id":1,"quantity":5}]}"#,
            "\n",
        );
        let mut output = Vec::new();

        let summary = serve_orders(&assembler, input.as_bytes(), &mut output)
            .await
            .unwrap();

        assert_eq!(
            summary,
            IntakeSummary {
                placed: 1,
                rejected: 1,
                malformed: 1
            }
        );

        let replies: Vec<serde_json::Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(replies.len(), 3);
        assert_eq!(replies[0]["order"]["status"], "paid");
        assert_eq!(replies[0]["order"]["address"], "1 Quay St");
        assert_eq!(replies[1]["error"]["reason"], "malformed_request");
        assert_eq!(replies[2]["error"]["reason"], "insufficient_stock");
        assert_eq!(replies[2]["error"]["category"], "resource");

        assert_eq!(store.stock_of(ProductId(1)).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_served_registry_sees_intake_outcomes() {
        let (_store, metrics, assembler) = setup().await;
        // The metrics server is handed a clone of this registry
        let served = metrics.registry().clone();

        let input = concat!(
            r#"{"user_id":1,"lines":[{"product_id":1,"quantity":1}]}"#,
            "\n",
            r#"{"user_id":2,"lines":[{"product_id":1,"quantity":1}]}"#,
            "\n",
        );
        serve_orders(&assembler, input.as_bytes(), Vec::new())
            .await
            .unwrap();

        let gathered = served.gather();
        let placed = gathered
            .iter()
            .find(|family| family.name() == "orders_placed_total")
            .unwrap();
        assert_eq!(placed.metric[0].counter.value, Some(1.0));

        let rejected = gathered
            .iter()
            .find(|family| family.name() == "orders_rejected_total")
            .unwrap();
        let total: f64 = rejected
            .metric
            .iter()
            .map(|m| m.counter.value.unwrap_or(0.0))
            .sum();
        assert_eq!(total, 1.0);
    }
}
