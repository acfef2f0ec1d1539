use async_trait::async_trait;
use futures_util::future::try_join_all;
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::BTreeSet;

use crate::config::DatabaseConfig;
use crate::domain::catalog::{PriceRule, Product};
use crate::domain::order::{NewOrder, Order, OrderLine, OrderStatus};
use crate::domain::wallet::Wallet;
use crate::models::{GroupId, OrderId, PriceRuleId, ProductId, UserId};
use crate::persistence::core::{
    CatalogReader, ConditionalUpdate, LedgerReader, MembershipReader, OrderReader, StoreResult,
    TransactionalStore, UnitOfWork,
};

// ============================================================================
// PostgreSQL Store
// ============================================================================
//
// Tables: products, product_prices, groups, user_groups, group_products,
// wallets, orders, order_details. Rows with a non-null deleted_at are treated
// as absent. The schema is owned by the migration layer.
//
// Ledger rows change through single conditional UPDATE statements; Postgres
// re-checks the WHERE clause after waiting on a concurrent writer, so the
// "stock >= n" / "balance >= n" guard can never be passed on a stale value.
// A transaction dropped without commit is rolled back by sqlx.
//
// ============================================================================

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await?;

        tracing::info!(max_connections = config.max_connections, "🐘 Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_lines(&self, order_id: OrderId) -> StoreResult<Vec<OrderLine>> {
        let rows = sqlx::query(
            r#"
            SELECT product_id, quantity, unit_price, subtotal
            FROM order_details
            WHERE order_id = $1 AND deleted_at IS NULL
            ORDER BY id
            "#,
        )
        .bind(order_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(line_from_row).collect()
    }

    async fn load_order(&self, header: &PgRow) -> StoreResult<Order> {
        let id = OrderId(header.try_get("id")?);
        let lines = self.load_lines(id).await?;
        order_from_row(header, lines)
    }
}

fn line_from_row(row: &PgRow) -> StoreResult<OrderLine> {
    Ok(OrderLine {
        product_id: ProductId(row.try_get("product_id")?),
        quantity: row.try_get("quantity")?,
        unit_price: row.try_get("unit_price")?,
        subtotal: row.try_get("subtotal")?,
    })
}

fn order_from_row(row: &PgRow, lines: Vec<OrderLine>) -> StoreResult<Order> {
    let status: String = row.try_get("status")?;
    let status = OrderStatus::parse(&status)
        .ok_or_else(|| anyhow::anyhow!("Unknown order status '{}'", status))?;

    Ok(Order {
        id: OrderId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        status,
        total: row.try_get("total")?,
        lines,
        address: non_empty(row.try_get("address")?),
        payment_method: non_empty(row.try_get("payment_method")?),
        created_at: row.try_get("created_at")?,
    })
}

// Older rows store missing notes as ''
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[async_trait]
impl CatalogReader for PgStore {
    async fn find_product(&self, product_id: ProductId) -> StoreResult<Option<Product>> {
        let row = sqlx::query(
            r#"
            SELECT p.id, p.name, p.sku, p.stock, p.is_active,
                   COALESCE(
                       array_agg(g.id) FILTER (WHERE g.id IS NOT NULL),
                       '{}'
                   ) AS group_ids
            FROM products p
            LEFT JOIN group_products gp ON gp.product_id = p.id
            LEFT JOIN groups g ON g.id = gp.group_id AND g.deleted_at IS NULL
            WHERE p.id = $1 AND p.deleted_at IS NULL
            GROUP BY p.id
            "#,
        )
        .bind(product_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let group_ids: Vec<i64> = row.try_get("group_ids")?;
        Ok(Some(Product {
            id: ProductId(row.try_get("id")?),
            name: row.try_get("name")?,
            sku: row.try_get("sku")?,
            stock: row.try_get("stock")?,
            is_active: row.try_get("is_active")?,
            group_ids: group_ids.into_iter().map(GroupId).collect(),
        }))
    }

    async fn price_rules_for(&self, product_id: ProductId) -> StoreResult<Vec<PriceRule>> {
        let rows = sqlx::query(
            r#"
            SELECT pp.id, pp.product_id, pp.group_id, pp.price
            FROM product_prices pp
            LEFT JOIN groups g ON g.id = pp.group_id
            WHERE pp.product_id = $1
              AND pp.deleted_at IS NULL
              AND g.deleted_at IS NULL
            ORDER BY pp.id
            "#,
        )
        .bind(product_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<PriceRule> {
                let group_id: Option<i64> = row.try_get("group_id")?;
                Ok(PriceRule {
                    id: PriceRuleId(row.try_get("id")?),
                    product_id: ProductId(row.try_get("product_id")?),
                    group_id: group_id.map(GroupId),
                    price: row.try_get("price")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl MembershipReader for PgStore {
    async fn groups_of_user(&self, user_id: UserId) -> StoreResult<BTreeSet<GroupId>> {
        let rows = sqlx::query(
            r#"
            SELECT ug.group_id
            FROM user_groups ug
            JOIN groups g ON g.id = ug.group_id
            WHERE ug.user_id = $1 AND g.deleted_at IS NULL
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> StoreResult<GroupId> { Ok(GroupId(row.try_get("group_id")?)) })
            .collect()
    }
}

#[async_trait]
impl LedgerReader for PgStore {
    async fn stock_of(&self, product_id: ProductId) -> StoreResult<Option<i64>> {
        let stock = sqlx::query_scalar::<_, i64>(
            "SELECT stock FROM products WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id.get())
        .fetch_optional(&self.pool)
        .await?;

        Ok(stock)
    }

    async fn wallet_of(&self, user_id: UserId) -> StoreResult<Option<Wallet>> {
        let row = sqlx::query(
            "SELECT user_id, balance, currency FROM wallets WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id.get())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| wallet_from_row(&row)).transpose()
    }
}

fn wallet_from_row(row: &PgRow) -> StoreResult<Wallet> {
    Ok(Wallet {
        user_id: UserId(row.try_get("user_id")?),
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
    })
}

#[async_trait]
impl OrderReader for PgStore {
    async fn find_order(&self, order_id: OrderId) -> StoreResult<Option<Order>> {
        let header = sqlx::query(
            r#"
            SELECT id, user_id, status, total, address, payment_method, created_at
            FROM orders
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(order_id.get())
        .fetch_optional(&self.pool)
        .await?;

        match header {
            Some(header) => Ok(Some(self.load_order(&header).await?)),
            None => Ok(None),
        }
    }

    async fn orders_for_user(&self, user_id: UserId) -> StoreResult<Vec<Order>> {
        let headers = sqlx::query(
            r#"
            SELECT id, user_id, status, total, address, payment_method, created_at
            FROM orders
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.get())
        .fetch_all(&self.pool)
        .await?;

        try_join_all(headers.iter().map(|header| self.load_order(header))).await
    }
}

#[async_trait]
impl TransactionalStore for PgStore {
    type UnitOfWork = PgUnitOfWork;

    async fn begin(&self) -> StoreResult<PgUnitOfWork> {
        Ok(PgUnitOfWork {
            tx: self.pool.begin().await?,
        })
    }
}

// ============================================================================
// Unit of Work
// ============================================================================

pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

impl PgUnitOfWork {
    /// Tell a refused conditional update apart from a missing row
    async fn current_stock(&mut self, product_id: ProductId) -> StoreResult<Option<i64>> {
        let stock = sqlx::query_scalar::<_, i64>(
            "SELECT stock FROM products WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(stock)
    }

    async fn current_balance(&mut self, user_id: UserId) -> StoreResult<Option<Decimal>> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            "SELECT balance FROM wallets WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id.get())
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(balance)
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn decrement_stock(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> StoreResult<ConditionalUpdate<i64>> {
        let updated = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE products
            SET stock = stock - $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL AND stock >= $2
            RETURNING stock
            "#,
        )
        .bind(product_id.get())
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(remaining) = updated {
            return Ok(ConditionalUpdate::Applied(remaining));
        }

        Ok(match self.current_stock(product_id).await? {
            Some(current) => ConditionalUpdate::Rejected { current },
            None => ConditionalUpdate::Missing,
        })
    }

    async fn increment_stock(
        &mut self,
        product_id: ProductId,
        quantity: i64,
    ) -> StoreResult<Option<i64>> {
        let stock = sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE products
            SET stock = stock + $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING stock
            "#,
        )
        .bind(product_id.get())
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(stock)
    }

    async fn debit_balance(
        &mut self,
        user_id: UserId,
        amount: Decimal,
    ) -> StoreResult<ConditionalUpdate<Decimal>> {
        let updated = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE wallets
            SET balance = balance - $2, updated_at = NOW()
            WHERE user_id = $1 AND deleted_at IS NULL AND balance >= $2
            RETURNING balance
            "#,
        )
        .bind(user_id.get())
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await?;

        if let Some(balance) = updated {
            return Ok(ConditionalUpdate::Applied(balance));
        }

        Ok(match self.current_balance(user_id).await? {
            Some(current) => ConditionalUpdate::Rejected { current },
            None => ConditionalUpdate::Missing,
        })
    }

    async fn credit_balance(
        &mut self,
        user_id: UserId,
        amount: Decimal,
    ) -> StoreResult<Option<Decimal>> {
        let balance = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE wallets
            SET balance = balance + $2, updated_at = NOW()
            WHERE user_id = $1 AND deleted_at IS NULL
            RETURNING balance
            "#,
        )
        .bind(user_id.get())
        .bind(amount)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(balance)
    }

    async fn insert_wallet(&mut self, user_id: UserId, currency: &str) -> StoreResult<Wallet> {
        let row = sqlx::query(
            r#"
            INSERT INTO wallets (user_id, balance, currency, created_at, updated_at)
            VALUES ($1, 0, $2, NOW(), NOW())
            RETURNING user_id, balance, currency
            "#,
        )
        .bind(user_id.get())
        .bind(currency)
        .fetch_one(&mut *self.tx)
        .await?;

        wallet_from_row(&row)
    }

    async fn insert_order(&mut self, order: NewOrder) -> StoreResult<Order> {
        let header = sqlx::query(
            r#"
            INSERT INTO orders (user_id, total, status, address, payment_method, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
            RETURNING id, created_at
            "#,
        )
        .bind(order.user_id.get())
        .bind(order.total)
        .bind(order.status.as_str())
        .bind(order.address.as_deref())
        .bind(order.payment_method.as_deref())
        .fetch_one(&mut *self.tx)
        .await?;

        let id = OrderId(header.try_get("id")?);
        let created_at = header.try_get("created_at")?;

        for line in &order.lines {
            sqlx::query(
                r#"
                INSERT INTO order_details
                    (order_id, product_id, quantity, unit_price, subtotal, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, NOW(), NOW())
                "#,
            )
            .bind(id.get())
            .bind(line.product_id.get())
            .bind(line.quantity)
            .bind(line.unit_price)
            .bind(line.subtotal)
            .execute(&mut *self.tx)
            .await?;
        }

        Ok(Order::from_new(id, order, created_at))
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
