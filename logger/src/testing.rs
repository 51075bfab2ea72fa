use std::{sync::Mutex, time::Duration};

use async_trait::async_trait;
use common::error::{AppError, Res};
use db::{
    log::LogStore,
    models::log::{Column, ColumnValue},
};

pub type Row = (String, Vec<Column>, Vec<ColumnValue>);

/// Keeps inserted rows in memory, optionally after a delay.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<Row>>,
    delay: Option<Duration>,
}

impl MemoryStore {
    pub fn delayed(delay: Duration) -> Self {
        MemoryStore {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn rows(&self) -> Vec<Row> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl LogStore for MemoryStore {
    async fn insert(&self, table: &str, columns: &[Column], values: &[ColumnValue]) -> Res<()> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.rows
            .lock()
            .unwrap()
            .push((table.to_string(), columns.to_vec(), values.to_vec()));
        Ok(())
    }
}

/// Rejects every insert.
pub struct FailingStore;

#[async_trait]
impl LogStore for FailingStore {
    async fn insert(&self, _: &str, _: &[Column], _: &[ColumnValue]) -> Res<()> {
        Err(AppError::Database(sqlx::Error::PoolClosed))
    }
}
