//! fetch-cli
//!
//! Issues one request through the engine and prints the result.
//!
//! ```text
//! fetch-cli [--config client.toml] [-X POST] [-H 'k: v']... [-d BODY] <URL>
//!     default:    service-envelope decode, pretty JSON on stdout
//!     --raw:      content-type decode only
//!     --stream:   body bytes copied to stdout under the read timeout
//!     --records:  one JSON line per BSON record
//! ```

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use futures_util::StreamExt;
use http::Method;
use tokio::io::AsyncWriteExt;

use fetch_engine::config::{load_config, ClientConfig, TransportKind};
use fetch_engine::http::decoder::generic_decoder;
use fetch_engine::http::headers::header_map;
use fetch_engine::observability::logging;
use fetch_engine::{NetworkClient, RequestParams};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Socket,
    Fetch,
}

#[derive(Parser)]
#[command(name = "fetch-cli")]
#[command(about = "Issue a request through the fetch engine", long_about = None)]
struct Cli {
    /// Request URL.
    url: String,

    /// Client configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// HTTP method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Extra header, `name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body, sent as JSON when it parses as JSON and as text otherwise.
    #[arg(short = 'd', long)]
    data: Option<String>,

    /// Override the configured transport.
    #[arg(long, value_enum)]
    transport: Option<TransportArg>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Total attempts; implies --retryable.
    #[arg(long)]
    attempts: Option<u32>,

    /// Retry 5xx responses and connection failures.
    #[arg(long)]
    retryable: bool,

    /// Decode by content type only, without the service envelope.
    #[arg(long, conflicts_with_all = ["stream", "records"])]
    raw: bool,

    /// Copy the response body to stdout as it arrives.
    #[arg(long, conflicts_with = "records")]
    stream: bool,

    /// Print each BSON record of the response as a JSON line.
    #[arg(long)]
    records: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    match cli.transport {
        Some(TransportArg::Socket) => config.transport.kind = TransportKind::Socket,
        Some(TransportArg::Fetch) => config.transport.kind = TransportKind::Fetch,
        None => {}
    }

    logging::init(&config.observability);

    let client = NetworkClient::from_config(&config)?;
    let params = build_params(&cli)?;

    tracing::debug!(url = %cli.url, method = %params.method, "Issuing request");
    let handle = client.request(&cli.url, params).await?;
    let status = handle.status();

    if cli.stream {
        let mut body = handle.stream().await?;
        let mut stdout = tokio::io::stdout();
        while let Some(chunk) = body.next().await {
            stdout.write_all(&chunk?).await?;
        }
        stdout.flush().await?;
    } else if cli.records {
        let mut records = handle.records().await?;
        while let Some(record) = records.next().await {
            println!("{}", serde_json::to_string(&record?)?);
        }
    } else {
        let value = handle.decode().await?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    }

    if status.is_server_error() {
        eprintln!("Server responded with status {}", status);
    }

    Ok(())
}

fn build_params(cli: &Cli) -> Result<RequestParams, Box<dyn std::error::Error>> {
    let method = Method::from_bytes(cli.method.to_ascii_uppercase().as_bytes())?;
    let mut params = RequestParams::new(method);

    if !cli.headers.is_empty() {
        let pairs = cli
            .headers
            .iter()
            .map(|raw| {
                raw.split_once(':')
                    .map(|(name, value)| (name.trim(), value.trim()))
                    .ok_or_else(|| format!("malformed header {raw:?}, expected `name: value`"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        params = params.with_headers(header_map(pairs)?);
    }

    if let Some(data) = &cli.data {
        params = match serde_json::from_str::<serde_json::Value>(data) {
            Ok(value) => params.with_body(value),
            Err(_) => params.with_body(data.as_str()),
        };
    }

    if let Some(ms) = cli.timeout_ms {
        params = params.with_timeout(Duration::from_millis(ms));
    }
    if let Some(ms) = cli.read_timeout_ms {
        params = params.with_read_timeout(Duration::from_millis(ms));
    }
    if let Some(attempts) = cli.attempts {
        params = params.with_retry_attempts(attempts).with_retryable(true);
    }
    if cli.retryable {
        params = params.with_retryable(true);
    }
    if cli.raw {
        params = params.with_decoder(generic_decoder());
    }

    Ok(params)
}
