use std::sync::{Arc, Mutex, PoisonError};

use client::ResponseInterceptor;
use colored::Colorize;
use common::{
    error::{AppError, Res},
    exchange::{RawResponse, RequestConfig, SentRequest},
};
use db::{
    log::LogStore,
    models::log::{Column, ColumnValue},
};
use log::{debug, error, info};
use tokio::task::JoinHandle;

use super::{
    canonical::{create_canonical_request, create_canonical_response},
    projector::{ExchangeRecord, project},
    tagger::{now_millis, read_tag},
};
use crate::options::{BodyTransform, FailureHandler, LoggerOptions};

/// Writes one row per finished exchange.
///
/// Owns the store connection for its whole lifetime. Inserts run as detached
/// tasks that finish even if the logger is dropped first;
/// [`AuditLogger::close`] waits for them and closes the store.
pub struct AuditLogger {
    store: Arc<dyn LogStore>,
    table: String,
    columns: Vec<Column>,
    all_instances: bool,
    transform_request_body: Option<BodyTransform>,
    transform_response_body: Option<BodyTransform>,
    console_logging: bool,
    on_insert_failure: FailureHandler,
    in_flight: Mutex<Vec<JoinHandle<()>>>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn LogStore>, options: &LoggerOptions) -> Res<Self> {
        let exclude = Column::parse_all(&options.exclude_columns)?;

        Ok(AuditLogger {
            store,
            table: options.table.clone(),
            columns: Column::selected(&exclude),
            all_instances: options.all_instances,
            transform_request_body: options.transform_request_body.clone(),
            transform_response_body: options.transform_response_body.clone(),
            console_logging: options.console_logging,
            on_insert_failure: options.on_insert_failure.clone(),
            in_flight: Mutex::new(Vec::new()),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Columns written for every exchange, in table order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn all_instances(&self) -> bool {
        self.all_instances
    }

    /// Records a successful exchange and hands the response back untouched.
    pub fn log_response(&self, response: RawResponse) -> Res<RawResponse> {
        self.record(&response.config, Some(&response.request), Some(&response), None)?;
        Ok(response)
    }

    /// Records a failed exchange and returns the original error.
    ///
    /// Errors that are not HTTP failures carry no exchange to record and are
    /// passed through as they are.
    pub fn log_error(&self, error: AppError) -> Res<RawResponse> {
        if let Some(exchange) = error.as_exchange() {
            self.record(
                &exchange.config,
                exchange.request.as_ref(),
                exchange.response.as_ref(),
                Some(exchange.message.as_str()),
            )?;
        }
        Err(error)
    }

    fn record(
        &self,
        config: &RequestConfig,
        sent: Option<&SentRequest>,
        response: Option<&RawResponse>,
        error: Option<&str>,
    ) -> Res<()> {
        let tag = read_tag(config)?;
        let elapsed_millis = now_millis() - tag.request_timestamp;

        let request =
            create_canonical_request(config, sent, self.transform_request_body.as_ref())?;
        let response = create_canonical_response(response, self.transform_response_body.as_ref())?;

        let record = ExchangeRecord {
            request: &request,
            response: response.as_ref(),
            error,
            elapsed_millis,
        };
        let values = project(&self.columns, &record)?;

        if self.console_logging {
            print_exchange(&record);
        }

        self.spawn_insert(values);
        Ok(())
    }

    fn spawn_insert(&self, values: Vec<ColumnValue>) {
        let store = Arc::clone(&self.store);
        let table = self.table.clone();
        let columns = self.columns.clone();
        let on_insert_failure = Arc::clone(&self.on_insert_failure);

        // dropping a handle detaches the task, it never cancels it
        let handle = tokio::spawn(async move {
            if let Err(e) = store.insert(&table, &columns, &values).await {
                error!("Failed to insert audit row into {}: {}", table, e);
                on_insert_failure(&e);
            }
        });

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight.retain(|pending| !pending.is_finished());
        in_flight.push(handle);
    }

    /// Waits for every insert issued so far.
    pub async fn flush(&self) {
        let pending = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *in_flight)
        };
        for handle in pending {
            if let Err(e) = handle.await {
                error!("Audit insert task failed: {}", e);
            }
        }
    }

    /// Waits for pending inserts, then closes the store.
    pub async fn close(&self) {
        self.flush().await;
        self.store.close().await;
        debug!("Audit logger for {} closed", self.table);
    }
}

impl ResponseInterceptor for AuditLogger {
    fn on_response(&self, response: RawResponse) -> Res<RawResponse> {
        self.log_response(response)
    }

    fn on_error(&self, error: AppError) -> Res<RawResponse> {
        self.log_error(error)
    }
}

fn print_exchange(record: &ExchangeRecord<'_>) {
    let status = record.response.map(|response| response.status);
    let colored_status = match status {
        Some(code @ 200..=299) => code.to_string().green(),
        Some(code @ 300..=399) => code.to_string().yellow(),
        Some(code @ 400..=499) => code.to_string().bright_red(),
        Some(code) => code.to_string().red(),
        None => "---".red(),
    };

    let method = record.request.method.as_str();
    let colored_method = match method {
        "GET" => method.blue(),
        "POST" => method.yellow(),
        "PUT" => method.purple(),
        "DELETE" => method.red(),
        _ => method.normal(),
    };

    info!(
        "[{}] {} {} {}",
        colored_status,
        colored_method,
        record.request.path.bright_white(),
        format!("({}ms)", record.elapsed_millis).bright_black(),
    );

    if let Some(message) = record.error {
        debug!("  Error: {}", message.bright_red());
    }
    if !record.request.body.is_null() {
        debug!("  Request: {}", record.request.body.to_string().bright_green());
    }
    if let Some(response) = record.response.filter(|response| !response.body.is_null()) {
        debug!("  Response: {}", response.body.to_string().bright_yellow());
    }
}
