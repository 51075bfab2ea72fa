use std::{fs::File, sync::Arc};

use client::HttpClient;
use colored::Colorize;
use common::error::Res;
use db::models::log::Column;
use middleware::{logger::AuditLogger, tagger::RequestTagger};

pub mod options;

pub mod middleware {
    pub mod canonical;
    pub mod logger;
    pub mod projector;
    pub mod tagger;
}

#[cfg(test)]
mod testing;

pub use options::{BodyContext, BodyTransform, LoggerOptions};

pub fn setup(log_file: &str) -> Result<(), fern::InitError> {
    File::create(log_file).map_err(fern::InitError::Io)?;

    fern::Dispatch::new()
        .format(|out, message, record| {
            let color = match record.level() {
                log::Level::Info => "green",
                log::Level::Warn => "yellow",
                log::Level::Error => "red",
                log::Level::Debug => "magenta",
                log::Level::Trace => "bright black",
            };
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%H:%M:%S]"),
                record.target(),
                record.level().to_string().color(color),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .level_for("hyper", log::LevelFilter::Off)
        .level_for("hyper_util", log::LevelFilter::Off)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("sqlx", log::LevelFilter::Warn)
        .chain(std::io::stdout())
        .chain(fern::log_file(log_file)?)
        .apply()?;
    Ok(())
}

/// Connects to MySQL and installs audit logging on `client`.
///
/// Returns the instrumented client and the logger, whose `close` should be
/// awaited before shutdown so pending rows are written.
pub async fn use_mysql_logger(
    client: HttpClient,
    options: LoggerOptions,
) -> Res<(HttpClient, Arc<AuditLogger>)> {
    // reject bad column names before opening the connection
    Column::parse_all(&options.exclude_columns)?;

    let store = db::setup(&options.connection_settings()).await?;
    let logger = Arc::new(AuditLogger::new(Arc::new(store), &options)?);

    Ok((install(client, Arc::clone(&logger)), logger))
}

/// Registers the request tagger and the response/error pair on `client`.
///
/// When the logger covers all instances, clients derived from the result
/// get the same treatment, and so do their own derivatives.
pub fn install(mut client: HttpClient, logger: Arc<AuditLogger>) -> HttpClient {
    client.interceptors_mut().use_request(Arc::new(RequestTagger));
    client.interceptors_mut().use_response(logger.clone());

    if logger.all_instances() {
        client.on_derive(Arc::new(move |instance| install(instance, Arc::clone(&logger))));
    }
    client
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use client::ClientDefaults;
    use common::{error::AppError, exchange::RequestConfig};
    use db::models::log::ColumnValue;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    fn options() -> LoggerOptions {
        LoggerOptions::new("localhost", "root", "audit", "http_log")
            .on_insert_failure(|e| panic!("unexpected insert failure: {e}"))
    }

    fn logged(options: &LoggerOptions) -> (HttpClient, Arc<AuditLogger>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        let logger = Arc::new(AuditLogger::new(store.clone(), options).unwrap());
        let client = install(HttpClient::new().unwrap(), Arc::clone(&logger));
        (client, logger, store)
    }

    fn column(logger: &AuditLogger, row: &[ColumnValue], column: Column) -> ColumnValue {
        let index = logger.columns().iter().position(|c| *c == column).unwrap();
        row[index].clone()
    }

    async fn mock_server() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 42 })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "db down" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn successful_request_is_logged() {
        let server = mock_server().await;
        let (client, logger, store) = logged(&options());

        let config = RequestConfig::post(format!("{}/orders?source=web", server.uri()))
            .param("dry_run", false)
            .json(&json!({ "sku": "A-1", "qty": 2 }))
            .unwrap();
        let response = client.request(config).await.unwrap();
        assert_eq!(response.status, 201);
        assert_eq!(response.data, Some(json!({ "id": 42 })));

        logger.flush().await;
        let rows = store.rows();
        assert_eq!(rows.len(), 1);
        let row = &rows[0].2;

        let host = server.uri().trim_start_matches("http://").to_string();
        assert_eq!(column(&logger, row, Column::Method), ColumnValue::from("POST"));
        assert_eq!(column(&logger, row, Column::Host), ColumnValue::from(host));
        assert_eq!(
            column(&logger, row, Column::Path),
            ColumnValue::from("/orders?source=web&dry_run=false")
        );
        assert_eq!(
            column(&logger, row, Column::RequestQuery),
            ColumnValue::from(r#"{"dry_run":false,"source":"web"}"#)
        );
        assert_eq!(
            column(&logger, row, Column::RequestBody),
            ColumnValue::from(r#"{"qty":2,"sku":"A-1"}"#)
        );
        assert_eq!(column(&logger, row, Column::ResponseStatus), ColumnValue::Int(201));
        assert_eq!(
            column(&logger, row, Column::ResponseBody),
            ColumnValue::from(r#"{"id":42}"#)
        );
        assert_eq!(column(&logger, row, Column::ResponseError), ColumnValue::from("null"));
    }

    #[tokio::test]
    async fn rejected_status_is_logged_and_reraised() {
        let server = mock_server().await;
        let (client, logger, store) = logged(&options());

        let error = client
            .get(format!("{}/broken", server.uri()))
            .await
            .unwrap_err()
            .into_exchange()
            .unwrap();
        assert_eq!(error.message, "Request failed with status code 500");
        assert_eq!(error.response.as_ref().map(|r| r.status), Some(500));

        logger.flush().await;
        let rows = store.rows();
        let row = &rows[0].2;
        assert_eq!(column(&logger, row, Column::ResponseStatus), ColumnValue::Int(500));
        assert_eq!(
            column(&logger, row, Column::ResponseBody),
            ColumnValue::from(r#"{"error":"db down"}"#)
        );
        assert_eq!(
            column(&logger, row, Column::ResponseError),
            ColumnValue::from(r#""Request failed with status code 500""#)
        );
    }

    #[tokio::test]
    async fn refused_connection_is_logged_without_response() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (client, logger, store) = logged(&options());
        let error = client
            .get(format!("http://127.0.0.1:{}/jobs", port))
            .await
            .unwrap_err();
        assert!(error.as_exchange().is_some_and(|e| e.response.is_none()));

        logger.flush().await;
        let rows = store.rows();
        let row = &rows[0].2;
        assert_eq!(column(&logger, row, Column::ResponseStatus), ColumnValue::from(""));
        assert_eq!(column(&logger, row, Column::ResponseHeaders), ColumnValue::from(""));
        assert_eq!(column(&logger, row, Column::ResponseBody), ColumnValue::from(""));
        assert!(matches!(
            column(&logger, row, Column::ResponseError),
            ColumnValue::Text(text) if text.starts_with('"') && text.len() > 2
        ));
    }

    #[tokio::test]
    async fn failing_transform_fails_the_request() {
        let server = mock_server().await;
        let (client, logger, store) =
            logged(&options().transform_response_body(|_, _| Err("no redaction rule".into())));

        let error = client.get(format!("{}/ping", server.uri())).await.unwrap_err();
        match error {
            AppError::Transform(source) => assert_eq!(source.to_string(), "no redaction rule"),
            other => panic!("unexpected error: {other}"),
        }

        logger.flush().await;
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn derived_clients_are_logged_with_all_instances() {
        let server = mock_server().await;
        let (client, logger, store) = logged(&options().all_instances(true));

        let child = client.create(ClientDefaults::default());
        let grandchild = child.create(ClientDefaults::default());
        child.get(format!("{}/ping", server.uri())).await.unwrap();
        grandchild.get(format!("{}/ping", server.uri())).await.unwrap();

        logger.flush().await;
        assert_eq!(store.rows().len(), 2);
    }

    #[tokio::test]
    async fn derived_clients_are_not_logged_by_default() {
        let server = mock_server().await;
        let (client, logger, store) = logged(&options());

        let child = client.create(ClientDefaults::default());
        let response = child.get(format!("{}/ping", server.uri())).await.unwrap();
        assert_eq!(response.data, Some(json!("pong")));

        logger.flush().await;
        assert!(store.rows().is_empty());
    }

    #[tokio::test]
    async fn concurrent_exchanges_each_get_a_row() {
        let server = mock_server().await;
        let (client, logger, store) = logged(&options());

        let url = format!("{}/ping", server.uri());
        let requests = (0..8).map(|_| client.get(url.clone()));
        let responses = futures::future::join_all(requests).await;
        assert!(responses.iter().all(Result::is_ok));

        logger.close().await;
        assert_eq!(store.rows().len(), 8);
    }

    #[tokio::test]
    async fn unknown_column_is_rejected_before_connecting() {
        let options = options().exclude_columns(["responseErrors"]);
        let result = use_mysql_logger(HttpClient::new().unwrap(), options).await;
        assert!(matches!(result, Err(AppError::UnknownColumn(name)) if name == "responseErrors"));
    }
}
