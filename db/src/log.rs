use async_trait::async_trait;
use common::error::{AppError, Res};
use sqlx::{Executor, MySql, MySqlPool, QueryBuilder};

use crate::models::log::{Column, ColumnValue};

/// Destination for audit rows.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Inserts one row into `table`.
    async fn insert(&self, table: &str, columns: &[Column], values: &[ColumnValue]) -> Res<()>;

    /// Releases the underlying connection.
    async fn close(&self) {}
}

/// `LogStore` over a single MySQL connection.
#[derive(Clone, Debug)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

#[async_trait]
impl LogStore for MySqlStore {
    async fn insert(&self, table: &str, columns: &[Column], values: &[ColumnValue]) -> Res<()> {
        insert_log(&self.pool, table, columns, values).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Builds `INSERT INTO <table> (<columns>) VALUES (<values>)`.
///
/// Table and column names are written as given; values are bound.
pub fn insert_statement(
    table: &str,
    columns: &[Column],
    values: &[ColumnValue],
) -> QueryBuilder<'static, MySql> {
    let column_list = columns
        .iter()
        .map(Column::as_str)
        .collect::<Vec<_>>()
        .join(",");

    let mut qb: QueryBuilder<MySql> =
        QueryBuilder::new(format!("INSERT INTO {} ({}) ", table, column_list));

    qb.push_values(std::iter::once(values), |mut row, values| {
        for value in values {
            match value {
                ColumnValue::Text(text) => row.push_bind(text.clone()),
                ColumnValue::Int(number) => row.push_bind(*number),
                ColumnValue::Timestamp(timestamp) => row.push_bind(*timestamp),
            };
        }
    });

    qb
}

pub async fn insert_log<'e, E: Executor<'e, Database = MySql>>(
    executor: E,
    table: &str,
    columns: &[Column],
    values: &[ColumnValue],
) -> Res<()> {
    let mut qb = insert_statement(table, columns, values);

    qb.build()
        .execute(executor)
        .await
        .map_err(AppError::from)?;

    Ok(())
}
