use std::{fmt, str::FromStr};

use chrono::NaiveDateTime;
use common::error::AppError;

/// A column of the audit table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Method,
    Host,
    Path,
    RequestHeaders,
    RequestQuery,
    RequestBody,
    ResponseStatus,
    ResponseHeaders,
    ResponseBody,
    ResponseError,
    ResponseTime,
    CreatedAt,
}

impl Column {
    /// Every column, in table order.
    pub const ALL: [Column; 12] = [
        Column::Method,
        Column::Host,
        Column::Path,
        Column::RequestHeaders,
        Column::RequestQuery,
        Column::RequestBody,
        Column::ResponseStatus,
        Column::ResponseHeaders,
        Column::ResponseBody,
        Column::ResponseError,
        Column::ResponseTime,
        Column::CreatedAt,
    ];

    /// Name of the column as it appears in the table.
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Method => "method",
            Column::Host => "host",
            Column::Path => "path",
            Column::RequestHeaders => "requestheaders",
            Column::RequestQuery => "requestQuery",
            Column::RequestBody => "requestBody",
            Column::ResponseStatus => "responseStatus",
            Column::ResponseHeaders => "responseHeaders",
            Column::ResponseBody => "responseBody",
            Column::ResponseError => "responseError",
            Column::ResponseTime => "responseTime",
            Column::CreatedAt => "createdAt",
        }
    }

    /// All columns minus `exclude`, keeping table order.
    pub fn selected(exclude: &[Column]) -> Vec<Column> {
        Column::ALL
            .into_iter()
            .filter(|column| !exclude.contains(column))
            .collect()
    }

    /// Parses column names, failing on the first name that is not a column.
    pub fn parse_all<S: AsRef<str>>(names: &[S]) -> Result<Vec<Column>, AppError> {
        names.iter().map(|name| name.as_ref().parse()).collect()
    }
}

impl FromStr for Column {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .into_iter()
            .find(|column| column.as_str() == s)
            .ok_or_else(|| AppError::UnknownColumn(s.to_string()))
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value of an insert record.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(String),
    Int(i64),
    Timestamp(NaiveDateTime),
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        ColumnValue::Text(value)
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        ColumnValue::Text(value.to_string())
    }
}

impl From<i64> for ColumnValue {
    fn from(value: i64) -> Self {
        ColumnValue::Int(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_exclusions_selects_every_column() {
        assert_eq!(Column::selected(&[]), Column::ALL.to_vec());
    }

    #[test]
    fn exclusion_drops_column_and_keeps_order() {
        let selected = Column::selected(&[Column::ResponseError]);
        let names: Vec<&str> = selected.iter().map(Column::as_str).collect();
        assert_eq!(
            names,
            vec![
                "method",
                "host",
                "path",
                "requestheaders",
                "requestQuery",
                "requestBody",
                "responseStatus",
                "responseHeaders",
                "responseBody",
                "responseTime",
                "createdAt",
            ]
        );
    }

    #[test]
    fn names_round_trip_and_are_case_sensitive() {
        for column in Column::ALL {
            assert_eq!(column.as_str().parse::<Column>().unwrap(), column);
        }
        assert!(matches!(
            "requestHeaders".parse::<Column>(),
            Err(AppError::UnknownColumn(name)) if name == "requestHeaders"
        ));
    }

    #[test]
    fn parse_all_rejects_unknown_names() {
        let parsed = Column::parse_all(&["createdAt", "responseTime"]).unwrap();
        assert_eq!(parsed, vec![Column::CreatedAt, Column::ResponseTime]);
        assert!(Column::parse_all(&["createdAt", "userAgent"]).is_err());
    }
}
