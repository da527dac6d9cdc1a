//! Postgres-backed store implementation.
//!
//! Implements every storage trait on top of a SQLx connection pool. The
//! storage traits are synchronous, so each call runs its SQL on the tokio
//! runtime captured at construction via `Handle::block_on`. Callers must be
//! on a thread that may block (e.g. `tokio::task::spawn_blocking`), never on
//! an async worker thread.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError | Scenario |
//! |------------|----------------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Duplicate order or item code |
//! | Database (foreign key violation) | `23503` | `NotFound` | Line for an unknown header or item |
//! | Database (foreign key violation) on item delete | `23503` | `Conflict` | Item still used by lines or stock |
//! | Database (check constraint violation) | `23514` | `Storage` | Row rejected by a CHECK constraint |
//! | Database (other) | Any other | `Storage` | Other database errors |
//! | PoolClosed / Other | N/A | `Storage` | Network errors, connection failures, etc. |
//!
//! ## Atomicity
//!
//! Stock adjustments are a single `INSERT ... ON CONFLICT DO UPDATE` with the
//! addition done by the database, so concurrent deltas to one item never
//! lose updates. Units of work are SQL transactions; `lock_header` issues
//! `SELECT ... FOR UPDATE` and code reservation locks the series row in
//! `order_sequences`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, Row, Transaction};
use tokio::runtime::Handle;
use tracing::instrument;
use uuid::Uuid;

use stockroom_catalog::Item;
use stockroom_core::{DetailId, ItemId, OrderId};
use stockroom_inventory::{StockDelta, StockEntry, StockLevel};
use stockroom_orders::code::stored_value;
use stockroom_orders::{
    Counterparty, DetailView, OrderCode, OrderDetail, OrderHeader, OrderKind, OrderStatus,
    SequenceError, Series,
};
use stockroom_purchasing::Purchase;
use stockroom_sales::Sale;

use super::{
    ItemCatalog, OrderReader, OrderSchema, SequenceGenerator, StockLedger, StoredOrder,
    TransactionalStore, UnitOfWork,
};
use crate::error::StoreError;

const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
    handle: Handle,
}

impl PgStore {
    /// Wrap an existing pool; SQL runs on `handle`.
    pub fn new(pool: PgPool, handle: Handle) -> Self {
        Self { pool, handle }
    }

    /// Connect a pool and capture the current runtime.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool, Handle::current()))
    }

    /// Create every table and index that does not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }

    fn run<T>(&self, op: impl Future<Output = Result<T, StoreError>>) -> Result<T, StoreError> {
        self.handle.block_on(op)
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<Postgres>, StoreError> {
        self.pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("acquire", e))
    }
}

/// Unit of work over [`PgStore`]: one SQL transaction.
///
/// Dropping it without `commit` rolls the transaction back.
pub struct PgUnitOfWork<'a> {
    tx: Transaction<'static, Postgres>,
    handle: &'a Handle,
}

impl TransactionalStore for PgStore {
    type Tx<'a> = PgUnitOfWork<'a>;

    fn begin(&self) -> Result<PgUnitOfWork<'_>, StoreError> {
        let tx = self
            .handle
            .block_on(self.pool.begin())
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(PgUnitOfWork {
            tx,
            handle: &self.handle,
        })
    }
}

impl UnitOfWork for PgUnitOfWork<'_> {
    fn reserve_code(&mut self, series: Series) -> Result<OrderCode, StoreError> {
        self.handle.block_on(reserve_code(&mut self.tx, series))
    }

    fn lock_header<K: StoredOrder>(&mut self, id: OrderId) -> Result<Option<OrderHeader<K>>, StoreError> {
        self.handle
            .block_on(fetch_header::<K>(&mut self.tx, id, true))
    }

    fn insert_header<K: StoredOrder>(&mut self, header: &OrderHeader<K>) -> Result<(), StoreError> {
        self.handle.block_on(insert_header(&mut self.tx, header))
    }

    fn update_header<K: StoredOrder>(&mut self, header: &OrderHeader<K>) -> Result<(), StoreError> {
        self.handle.block_on(update_header(&mut self.tx, header))
    }

    fn delete_header<K: StoredOrder>(&mut self, id: OrderId) -> Result<(), StoreError> {
        self.handle.block_on(delete_header::<K>(&mut self.tx, id))
    }

    fn insert_detail<K: StoredOrder>(&mut self, detail: &OrderDetail<K>) -> Result<(), StoreError> {
        self.handle.block_on(insert_detail(&mut self.tx, detail))
    }

    fn update_detail<K: StoredOrder>(&mut self, detail: &OrderDetail<K>) -> Result<(), StoreError> {
        self.handle.block_on(update_detail(&mut self.tx, detail))
    }

    fn delete_detail<K: StoredOrder>(&mut self, id: DetailId) -> Result<(), StoreError> {
        self.handle.block_on(delete_detail::<K>(&mut self.tx, id))
    }

    fn details<K: StoredOrder>(&mut self, header_id: OrderId) -> Result<Vec<OrderDetail<K>>, StoreError> {
        self.handle.block_on(fetch_details::<K>(&mut self.tx, header_id))
    }

    fn detail<K: StoredOrder>(&mut self, id: DetailId) -> Result<Option<OrderDetail<K>>, StoreError> {
        self.handle.block_on(fetch_detail::<K>(&mut self.tx, id))
    }

    fn mark_confirmed<K: StoredOrder>(&mut self, id: OrderId) -> Result<bool, StoreError> {
        self.handle.block_on(mark_confirmed::<K>(&mut self.tx, id))
    }

    fn apply_delta(&mut self, item_id: ItemId, delta: StockDelta) -> Result<StockEntry, StoreError> {
        self.handle.block_on(apply_delta(&mut self.tx, item_id, delta))
    }

    fn commit(self) -> Result<(), StoreError> {
        self.handle
            .block_on(self.tx.commit())
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

impl SequenceGenerator for PgStore {
    fn next_code(&self, series: Series) -> Result<OrderCode, StoreError> {
        self.run(async {
            let mut conn = self.acquire().await?;
            let max = max_code_value(&mut conn, series).await?;
            Ok(OrderCode::from_value(
                max.checked_add(1).ok_or(SequenceError::Exhausted)?,
            )?)
        })
    }
}

impl StockLedger for PgStore {
    fn apply_delta(&self, item_id: ItemId, delta: StockDelta) -> Result<StockEntry, StoreError> {
        self.run(async {
            let mut conn = self.acquire().await?;
            apply_delta(&mut conn, item_id, delta).await
        })
    }

    fn get(&self, item_id: ItemId) -> Result<Option<StockEntry>, StoreError> {
        self.run(async {
            let row = sqlx::query("SELECT item_id, quantity FROM stocks WHERE item_id = $1")
                .bind(item_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_stock", e))?;
            row.map(|r| stock_entry(&r)).transpose()
        })
    }

    fn list_all(&self) -> Result<Vec<StockEntry>, StoreError> {
        self.run(async {
            let rows = sqlx::query("SELECT item_id, quantity FROM stocks ORDER BY item_id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_stock", e))?;
            rows.iter().map(stock_entry).collect()
        })
    }

    fn list_levels(&self) -> Result<Vec<StockLevel>, StoreError> {
        self.run(async {
            let rows = sqlx::query(
                r#"
                SELECT
                    s.item_id,
                    i.code AS item_code,
                    i.description AS item_description,
                    s.quantity
                FROM stocks s
                JOIN items i ON i.id = s.item_id
                ORDER BY i.code
                "#,
            )
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_stock_levels", e))?;

            rows.iter()
                .map(|r| {
                    Ok(StockLevel {
                        item_id: ItemId::from_uuid(r.try_get("item_id").map_err(decode_error)?),
                        item_code: r.try_get("item_code").map_err(decode_error)?,
                        item_description: r.try_get("item_description").map_err(decode_error)?,
                        quantity: r.try_get("quantity").map_err(decode_error)?,
                    })
                })
                .collect()
        })
    }
}

impl ItemCatalog for PgStore {
    fn insert_item(&self, item: &Item) -> Result<(), StoreError> {
        self.run(async {
            sqlx::query(
                r#"
                INSERT INTO items (id, code, description, cost, price, is_active)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(&item.code)
            .bind(&item.description)
            .bind(item.cost)
            .bind(item.price)
            .bind(item.active)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_item", e))?;
            Ok(())
        })
    }

    fn item(&self, id: ItemId) -> Result<Option<Item>, StoreError> {
        self.run(async {
            let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_item", e))?;
            row.map(|r| ItemRow::from_row(&r).map(Item::from).map_err(decode_error))
                .transpose()
        })
    }

    fn item_by_code(&self, code: &str) -> Result<Option<Item>, StoreError> {
        self.run(async {
            let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items WHERE code = $1"))
                .bind(code)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_item_by_code", e))?;
            row.map(|r| ItemRow::from_row(&r).map(Item::from).map_err(decode_error))
                .transpose()
        })
    }

    fn items(&self) -> Result<Vec<Item>, StoreError> {
        self.run(async {
            let rows = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM items ORDER BY code"))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_items", e))?;
            rows.iter()
                .map(|r| ItemRow::from_row(r).map(Item::from).map_err(decode_error))
                .collect()
        })
    }

    fn update_item(&self, item: &Item) -> Result<(), StoreError> {
        self.run(async {
            let result = sqlx::query(
                r#"
                UPDATE items
                SET code = $2, description = $3, cost = $4, price = $5, is_active = $6
                WHERE id = $1
                "#,
            )
            .bind(item.id.as_uuid())
            .bind(&item.code)
            .bind(&item.description)
            .bind(item.cost)
            .bind(item.price)
            .bind(item.active)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("update_item", e))?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("item {}", item.id)));
            }
            Ok(())
        })
    }

    fn delete_item(&self, id: ItemId) -> Result<(), StoreError> {
        self.run(async {
            let result = sqlx::query("DELETE FROM items WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    if is_foreign_key_violation(&e) {
                        StoreError::Conflict(format!("item {id} is still referenced"))
                    } else {
                        map_sqlx_error("delete_item", e)
                    }
                })?;
            if result.rows_affected() == 0 {
                return Err(StoreError::NotFound(format!("item {id}")));
            }
            Ok(())
        })
    }
}

impl OrderReader for PgStore {
    fn header<K: StoredOrder>(&self, id: OrderId) -> Result<Option<OrderHeader<K>>, StoreError> {
        self.run(async {
            let mut conn = self.acquire().await?;
            fetch_header::<K>(&mut conn, id, false).await
        })
    }

    fn header_by_code<K: StoredOrder>(
        &self,
        code: &OrderCode,
    ) -> Result<Option<OrderHeader<K>>, StoreError> {
        self.run(async {
            let sql = format!("{} WHERE h.code = $1", select_headers(&K::SCHEMA));
            let row = sqlx::query(&sql)
                .bind(code.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("get_header_by_code", e))?;
            row.map(|r| header_from_row::<K>(&r)).transpose()
        })
    }

    fn headers<K: StoredOrder>(&self) -> Result<Vec<OrderHeader<K>>, StoreError> {
        self.run(async {
            let sql = format!("{} ORDER BY h.code", select_headers(&K::SCHEMA));
            let rows = sqlx::query(&sql)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_headers", e))?;
            rows.iter().map(header_from_row::<K>).collect()
        })
    }

    fn details<K: StoredOrder>(&self, header_id: OrderId) -> Result<Vec<OrderDetail<K>>, StoreError> {
        self.run(async {
            let mut conn = self.acquire().await?;
            fetch_details::<K>(&mut conn, header_id).await
        })
    }

    fn detail<K: StoredOrder>(&self, id: DetailId) -> Result<Option<OrderDetail<K>>, StoreError> {
        self.run(async {
            let mut conn = self.acquire().await?;
            fetch_detail::<K>(&mut conn, id).await
        })
    }

    fn detail_views<K: StoredOrder>(&self, header_id: OrderId) -> Result<Vec<DetailView<K>>, StoreError> {
        self.run(async {
            let schema = K::SCHEMA;
            let sql = format!(
                r#"
                SELECT
                    d.id,
                    d.header_id,
                    d.item_id,
                    d.quantity,
                    d.{price} AS unit_price,
                    d.amount,
                    i.code AS item_code,
                    i.description AS item_description
                FROM {details} d
                JOIN items i ON i.id = d.item_id
                WHERE d.header_id = $1
                ORDER BY d.position
                "#,
                price = schema.unit_price,
                details = schema.details_table,
            );
            let rows = sqlx::query(&sql)
                .bind(header_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_detail_views", e))?;

            rows.iter()
                .map(|r| {
                    let detail = DetailRow::from_row(r).map_err(decode_error)?;
                    Ok(DetailView {
                        detail: detail.into_detail(),
                        item_code: r.try_get("item_code").map_err(decode_error)?,
                        item_description: r.try_get("item_description").map_err(decode_error)?,
                    })
                })
                .collect()
        })
    }

    fn headers_by_counterparty<K: StoredOrder>(
        &self,
        fragment: &str,
    ) -> Result<Vec<OrderHeader<K>>, StoreError> {
        self.run(async {
            let sql = format!(
                "{} WHERE h.{} ILIKE $1 ESCAPE '\\' ORDER BY h.code",
                select_headers(&K::SCHEMA),
                K::SCHEMA.counterparty_name
            );
            let rows = sqlx::query(&sql)
                .bind(format!("%{}%", escape_like(fragment)))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("search_headers", e))?;
            rows.iter().map(header_from_row::<K>).collect()
        })
    }

    fn headers_by_item_code<K: StoredOrder>(
        &self,
        item_code: &str,
    ) -> Result<Vec<OrderHeader<K>>, StoreError> {
        self.run(async {
            let sql = format!(
                r#"
                {select}
                WHERE EXISTS (
                    SELECT 1
                    FROM {details} d
                    JOIN items i ON i.id = d.item_id
                    WHERE d.header_id = h.id AND i.code = $1
                )
                ORDER BY h.code
                "#,
                select = select_headers(&K::SCHEMA),
                details = K::SCHEMA.details_table,
            );
            let rows = sqlx::query(&sql)
                .bind(item_code)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("headers_by_item_code", e))?;
            rows.iter().map(header_from_row::<K>).collect()
        })
    }
}

// Statements shared by the pool and the transaction paths.

const ITEM_COLUMNS: &str = "id, code, description, cost, price, is_active";

fn headers_table(series: Series) -> &'static str {
    match series {
        Series::Purchases => Purchase::SCHEMA.headers_table,
        Series::Sales => Sale::SCHEMA.headers_table,
    }
}

fn select_headers(schema: &OrderSchema) -> String {
    let phone = match schema.counterparty_phone {
        Some(column) => format!("h.{column}"),
        None => "NULL::TEXT".to_string(),
    };
    format!(
        "SELECT h.id, h.code, h.{name} AS counterparty_name, {phone} AS counterparty_phone, \
         h.created_at, h.{flag} AS confirmed FROM {table} h",
        name = schema.counterparty_name,
        flag = schema.confirmed_flag,
        table = schema.headers_table,
    )
}

fn select_details(schema: &OrderSchema) -> String {
    format!(
        "SELECT d.id, d.header_id, d.item_id, d.quantity, d.{price} AS unit_price, d.amount \
         FROM {table} d",
        price = schema.unit_price,
        table = schema.details_table,
    )
}

/// Highest numeric code stored in the series, 0 when empty.
async fn max_code_value(conn: &mut PgConnection, series: Series) -> Result<u64, StoreError> {
    let table = headers_table(series);

    let corrupt: Option<String> = sqlx::query_scalar(&format!(
        "SELECT code FROM {table} WHERE code !~ '^[0-9]+$' LIMIT 1"
    ))
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("scan_codes", e))?;
    if let Some(code) = corrupt {
        return Err(SequenceError::NonNumeric(code).into());
    }

    let max: Option<String> = sqlx::query_scalar(&format!(
        "SELECT MAX(CAST(code AS NUMERIC))::TEXT FROM {table}"
    ))
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("max_code", e))?;

    match max {
        Some(raw) => Ok(stored_value(&raw)?),
        None => Ok(0),
    }
}

#[instrument(level = "debug", skip(conn), err)]
async fn reserve_code(conn: &mut PgConnection, series: Series) -> Result<OrderCode, StoreError> {
    sqlx::query(
        "INSERT INTO order_sequences (series, last_value) VALUES ($1, 0) ON CONFLICT (series) DO NOTHING",
    )
    .bind(series.as_str())
    .execute(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("init_sequence", e))?;

    let last: i64 =
        sqlx::query_scalar("SELECT last_value FROM order_sequences WHERE series = $1 FOR UPDATE")
            .bind(series.as_str())
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| map_sqlx_error("lock_sequence", e))?;

    let max = max_code_value(conn, series).await?;
    let next = max
        .max(u64::try_from(last).unwrap_or(0))
        .checked_add(1)
        .ok_or(SequenceError::Exhausted)?;
    let code = OrderCode::from_value(next)?;

    sqlx::query("UPDATE order_sequences SET last_value = $2 WHERE series = $1")
        .bind(series.as_str())
        .bind(code.value() as i64)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("advance_sequence", e))?;

    Ok(code)
}

#[instrument(level = "debug", skip(conn), fields(kind = K::LABEL), err)]
async fn fetch_header<K: StoredOrder>(
    conn: &mut PgConnection,
    id: OrderId,
    for_update: bool,
) -> Result<Option<OrderHeader<K>>, StoreError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let sql = format!("{} WHERE h.id = $1{lock}", select_headers(&K::SCHEMA));
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get_header", e))?;
    row.map(|r| header_from_row::<K>(&r)).transpose()
}

#[instrument(level = "debug", skip_all, fields(kind = K::LABEL, header_id = %header.id, code = %header.code), err)]
async fn insert_header<K: StoredOrder>(
    conn: &mut PgConnection,
    header: &OrderHeader<K>,
) -> Result<(), StoreError> {
    let schema = K::SCHEMA;
    let (phone_column, phone_param) = match schema.counterparty_phone {
        Some(column) => (format!(", {column}"), ", $6"),
        None => (String::new(), ""),
    };
    let sql = format!(
        "INSERT INTO {table} (id, code, {name}, created_at, {flag}{phone_column}) \
         VALUES ($1, $2, $3, $4, $5{phone_param})",
        table = schema.headers_table,
        name = schema.counterparty_name,
        flag = schema.confirmed_flag,
    );

    let mut query = sqlx::query(&sql)
        .bind(header.id.as_uuid())
        .bind(header.code.as_str())
        .bind(header.counterparty.name())
        .bind(header.created_at)
        .bind(header.is_confirmed());
    if schema.counterparty_phone.is_some() {
        query = query.bind(header.counterparty.phone());
    }
    query
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_header", e))?;
    Ok(())
}

#[instrument(level = "debug", skip_all, fields(kind = K::LABEL, header_id = %header.id), err)]
async fn update_header<K: StoredOrder>(
    conn: &mut PgConnection,
    header: &OrderHeader<K>,
) -> Result<(), StoreError> {
    let schema = K::SCHEMA;
    let phone_assignment = match schema.counterparty_phone {
        Some(column) => format!(", {column} = $4"),
        None => String::new(),
    };
    let sql = format!(
        "UPDATE {table} SET code = $2, {name} = $3{phone_assignment} WHERE id = $1",
        table = schema.headers_table,
        name = schema.counterparty_name,
    );

    let mut query = sqlx::query(&sql)
        .bind(header.id.as_uuid())
        .bind(header.code.as_str())
        .bind(header.counterparty.name());
    if schema.counterparty_phone.is_some() {
        query = query.bind(header.counterparty.phone());
    }
    let result = query
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("update_header", e))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("{} {}", K::LABEL, header.id)));
    }
    Ok(())
}

async fn delete_header<K: StoredOrder>(conn: &mut PgConnection, id: OrderId) -> Result<(), StoreError> {
    let sql = format!("DELETE FROM {} WHERE id = $1", K::SCHEMA.headers_table);
    let result = sqlx::query(&sql)
        .bind(id.as_uuid())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete_header", e))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("{} {id}", K::LABEL)));
    }
    Ok(())
}

async fn fetch_details<K: StoredOrder>(
    conn: &mut PgConnection,
    header_id: OrderId,
) -> Result<Vec<OrderDetail<K>>, StoreError> {
    let sql = format!(
        "{} WHERE d.header_id = $1 ORDER BY d.position",
        select_details(&K::SCHEMA)
    );
    let rows = sqlx::query(&sql)
        .bind(header_id.as_uuid())
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("list_details", e))?;
    rows.iter()
        .map(|r| {
            DetailRow::from_row(r)
                .map(DetailRow::into_detail)
                .map_err(decode_error)
        })
        .collect()
}

async fn fetch_detail<K: StoredOrder>(
    conn: &mut PgConnection,
    id: DetailId,
) -> Result<Option<OrderDetail<K>>, StoreError> {
    let sql = format!("{} WHERE d.id = $1", select_details(&K::SCHEMA));
    let row = sqlx::query(&sql)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("get_detail", e))?;
    row.map(|r| {
        DetailRow::from_row(&r)
            .map(DetailRow::into_detail)
            .map_err(decode_error)
    })
    .transpose()
}

#[instrument(level = "debug", skip_all, fields(kind = K::LABEL, detail_id = %detail.id), err)]
async fn insert_detail<K: StoredOrder>(
    conn: &mut PgConnection,
    detail: &OrderDetail<K>,
) -> Result<(), StoreError> {
    let sql = format!(
        "INSERT INTO {table} (id, header_id, item_id, quantity, {price}, amount) \
         VALUES ($1, $2, $3, $4, $5, $6)",
        table = K::SCHEMA.details_table,
        price = K::SCHEMA.unit_price,
    );
    sqlx::query(&sql)
        .bind(detail.id.as_uuid())
        .bind(detail.header_id.as_uuid())
        .bind(detail.item_id.as_uuid())
        .bind(detail.quantity)
        .bind(detail.unit_price)
        .bind(detail.amount)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("insert_detail", e))?;
    Ok(())
}

#[instrument(level = "debug", skip_all, fields(kind = K::LABEL, detail_id = %detail.id), err)]
async fn update_detail<K: StoredOrder>(
    conn: &mut PgConnection,
    detail: &OrderDetail<K>,
) -> Result<(), StoreError> {
    let sql = format!(
        "UPDATE {table} SET item_id = $2, quantity = $3, {price} = $4, amount = $5 WHERE id = $1",
        table = K::SCHEMA.details_table,
        price = K::SCHEMA.unit_price,
    );
    let result = sqlx::query(&sql)
        .bind(detail.id.as_uuid())
        .bind(detail.item_id.as_uuid())
        .bind(detail.quantity)
        .bind(detail.unit_price)
        .bind(detail.amount)
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("update_detail", e))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("{} detail {}", K::LABEL, detail.id)));
    }
    Ok(())
}

async fn delete_detail<K: StoredOrder>(conn: &mut PgConnection, id: DetailId) -> Result<(), StoreError> {
    let sql = format!("DELETE FROM {} WHERE id = $1", K::SCHEMA.details_table);
    let result = sqlx::query(&sql)
        .bind(id.as_uuid())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("delete_detail", e))?;
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("{} detail {id}", K::LABEL)));
    }
    Ok(())
}

#[instrument(level = "debug", skip(conn), fields(kind = K::LABEL), err)]
async fn mark_confirmed<K: StoredOrder>(conn: &mut PgConnection, id: OrderId) -> Result<bool, StoreError> {
    let sql = format!(
        "UPDATE {table} SET {flag} = TRUE WHERE id = $1 AND {flag} = FALSE",
        table = K::SCHEMA.headers_table,
        flag = K::SCHEMA.confirmed_flag,
    );
    let result = sqlx::query(&sql)
        .bind(id.as_uuid())
        .execute(&mut *conn)
        .await
        .map_err(|e| map_sqlx_error("mark_confirmed", e))?;
    Ok(result.rows_affected() == 1)
}

#[instrument(level = "debug", skip(conn), fields(delta = delta.value()), err)]
async fn apply_delta(
    conn: &mut PgConnection,
    item_id: ItemId,
    delta: StockDelta,
) -> Result<StockEntry, StoreError> {
    let row = sqlx::query(
        r#"
        INSERT INTO stocks (item_id, quantity)
        VALUES ($1, $2)
        ON CONFLICT (item_id)
        DO UPDATE SET quantity = stocks.quantity + EXCLUDED.quantity
        RETURNING item_id, quantity
        "#,
    )
    .bind(item_id.as_uuid())
    .bind(delta.value())
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| map_sqlx_error("apply_delta", e))?;
    stock_entry(&row)
}

/// Escape `%`, `_` and `\` so a search fragment matches literally.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                // Unique violation
                Some("23505") => StoreError::Conflict(msg),
                // Foreign key violation: the referenced header or item is gone
                Some("23503") => StoreError::NotFound(msg),
                _ => StoreError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            StoreError::Storage(format!("connection pool closed in {}", operation))
        }
        sqlx::Error::RowNotFound => {
            StoreError::Storage(format!("unexpected row not found in {}", operation))
        }
        _ => StoreError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}

/// Check if an error is a foreign key violation.
fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23503";
        }
    }
    false
}

fn decode_error(err: sqlx::Error) -> StoreError {
    StoreError::Storage(format!("failed to decode row: {err}"))
}

fn stock_entry(row: &PgRow) -> Result<StockEntry, StoreError> {
    Ok(StockEntry {
        item_id: ItemId::from_uuid(row.try_get("item_id").map_err(decode_error)?),
        quantity: row.try_get("quantity").map_err(decode_error)?,
    })
}

fn header_from_row<K: OrderKind>(row: &PgRow) -> Result<OrderHeader<K>, StoreError> {
    HeaderRow::from_row(row).map_err(decode_error)?.into_header()
}

// SQLx row types

#[derive(Debug)]
struct HeaderRow {
    id: Uuid,
    code: String,
    counterparty_name: String,
    counterparty_phone: Option<String>,
    created_at: DateTime<Utc>,
    confirmed: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for HeaderRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(HeaderRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            counterparty_name: row.try_get("counterparty_name")?,
            counterparty_phone: row.try_get("counterparty_phone")?,
            created_at: row.try_get("created_at")?,
            confirmed: row.try_get("confirmed")?,
        })
    }
}

impl HeaderRow {
    fn into_header<K: OrderKind>(self) -> Result<OrderHeader<K>, StoreError> {
        Ok(OrderHeader {
            id: OrderId::from_uuid(self.id),
            code: OrderCode::from_stored(&self.code)?,
            counterparty: K::Counterparty::from_parts(self.counterparty_name, self.counterparty_phone),
            created_at: self.created_at,
            status: OrderStatus::from_confirmed(self.confirmed),
        })
    }
}

#[derive(Debug)]
struct DetailRow {
    id: Uuid,
    header_id: Uuid,
    item_id: Uuid,
    quantity: i64,
    unit_price: Decimal,
    amount: Decimal,
}

impl<'r> sqlx::FromRow<'r, PgRow> for DetailRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(DetailRow {
            id: row.try_get("id")?,
            header_id: row.try_get("header_id")?,
            item_id: row.try_get("item_id")?,
            quantity: row.try_get("quantity")?,
            unit_price: row.try_get("unit_price")?,
            amount: row.try_get("amount")?,
        })
    }
}

impl DetailRow {
    fn into_detail<K: OrderKind>(self) -> OrderDetail<K> {
        OrderDetail::from_parts(
            DetailId::from_uuid(self.id),
            OrderId::from_uuid(self.header_id),
            ItemId::from_uuid(self.item_id),
            self.quantity,
            self.unit_price,
            self.amount,
        )
    }
}

#[derive(Debug)]
struct ItemRow {
    id: Uuid,
    code: String,
    description: String,
    cost: Decimal,
    price: Decimal,
    is_active: bool,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ItemRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ItemRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            description: row.try_get("description")?,
            cost: row.try_get("cost")?,
            price: row.try_get("price")?,
            is_active: row.try_get("is_active")?,
        })
    }
}

impl From<ItemRow> for Item {
    fn from(row: ItemRow) -> Self {
        Item {
            id: ItemId::from_uuid(row.id),
            code: row.code,
            description: row.description,
            cost: row.cost,
            price: row.price,
            active: row.is_active,
        }
    }
}
