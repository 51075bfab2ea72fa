use std::time::Duration;

use clap::Parser;
use client::{ClientDefaults, HttpClient};
use common::{
    env_config::Config,
    error::{AppError, Res},
    exchange::RequestConfig,
};
use logger::LoggerOptions;

#[derive(Parser, Debug)]
#[command(version, about = "Send HTTP requests and record each exchange in MySQL")]
struct Cli {
    /// HTTP method used for every URL
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra header, `Name: value`
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Raw request body
    #[arg(short, long)]
    data: Option<String>,

    /// Targets, requested concurrently
    #[arg(required = true)]
    urls: Vec<String>,
}

#[tokio::main]
async fn main() -> Res<()> {
    let cli = Cli::parse();

    // get env vars
    let config = Config::from_env()?;

    // init logger
    if config.console_logging_enabled {
        logger::setup(&config.log_file)
            .map_err(|e| AppError::Config(format!("Failed to set up logger: {}", e)))?;
    }

    let client = HttpClient::with_defaults(ClientDefaults {
        timeout: config.http_timeout_secs.map(Duration::from_secs),
        ..Default::default()
    })?;

    // init db connection and interceptors
    let (client, audit) = logger::use_mysql_logger(client, LoggerOptions::from_config(&config)).await?;

    let requests = cli
        .urls
        .iter()
        .map(|url| build_request(&cli, url))
        .collect::<Res<Vec<_>>>()?;

    let results = futures::future::join_all(
        requests
            .into_iter()
            .map(|request| client.request(request)),
    )
    .await;

    for (url, result) in cli.urls.iter().zip(results) {
        match result {
            Ok(response) => println!("{} {}", response.status, url),
            Err(e) => eprintln!("ERR {} {}", url, e),
        }
    }

    audit.close().await;
    Ok(())
}

fn build_request(cli: &Cli, url: &str) -> Res<RequestConfig> {
    let mut request = RequestConfig::new(&cli.method, url);
    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| AppError::Config(format!("Malformed header '{}'", header)))?;
        request = request.header(name.trim(), value.trim());
    }
    if let Some(data) = &cli.data {
        request = request.body(data.clone());
    }
    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_and_body_are_applied() {
        let cli = Cli::parse_from([
            "main",
            "-X",
            "post",
            "-H",
            "Content-Type: application/json",
            "--data",
            r#"{"a":1}"#,
            "http://api.local/items",
        ]);

        let request = build_request(&cli, &cli.urls[0]).unwrap();
        assert_eq!(request.method, "post");
        assert_eq!(request.header_value("content-type"), Some("application/json"));
        assert_eq!(request.data.as_deref(), Some(r#"{"a":1}"#));
    }

    #[test]
    fn malformed_header_is_rejected() {
        let cli = Cli::parse_from(["main", "-H", "no-colon", "http://api.local"]);
        assert!(matches!(
            build_request(&cli, &cli.urls[0]),
            Err(AppError::Config(_))
        ));
    }
}
