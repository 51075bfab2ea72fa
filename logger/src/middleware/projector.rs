use chrono::{NaiveDateTime, Utc};
use common::error::Res;
use db::models::log::{Column, ColumnValue};
use serde::Serialize;

use super::canonical::{CanonicalRequest, CanonicalResponse};

/// Everything known about one finished exchange.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeRecord<'a> {
    pub request: &'a CanonicalRequest,
    /// `None` when no response was received.
    pub response: Option<&'a CanonicalResponse>,
    /// Error message of a failed exchange.
    pub error: Option<&'a str>,
    pub elapsed_millis: i64,
}

/// One value per column, in column order. `createdAt` is the time of the call.
pub fn project(columns: &[Column], record: &ExchangeRecord<'_>) -> Res<Vec<ColumnValue>> {
    let now = Utc::now().naive_utc();
    columns
        .iter()
        .map(|column| extract(*column, record, now))
        .collect()
}

fn extract(column: Column, record: &ExchangeRecord<'_>, now: NaiveDateTime) -> Res<ColumnValue> {
    let request = record.request;
    let response = record.response;

    Ok(match column {
        Column::Method => request.method.clone().into(),
        Column::Host => request
            .headers
            .get("host")
            .cloned()
            .unwrap_or_default()
            .into(),
        Column::Path => request.path.clone().into(),
        Column::RequestHeaders => json(&request.headers)?,
        Column::RequestQuery => json(&request.query)?,
        Column::RequestBody => json(&request.body)?,
        Column::ResponseStatus => match response {
            Some(response) => ColumnValue::Int(response.status.into()),
            None => "".into(),
        },
        Column::ResponseHeaders => match response {
            Some(response) => json(&response.headers)?,
            None => "".into(),
        },
        Column::ResponseBody => match response {
            Some(response) => json(&response.body)?,
            None => "".into(),
        },
        Column::ResponseError => json(&record.error)?,
        Column::ResponseTime => ColumnValue::Int(record.elapsed_millis),
        Column::CreatedAt => ColumnValue::Timestamp(now),
    })
}

fn json<T: Serialize + ?Sized>(value: &T) -> Res<ColumnValue> {
    Ok(ColumnValue::Text(serde_json::to_string(value)?))
}
