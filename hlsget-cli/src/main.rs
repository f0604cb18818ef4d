use std::time::Duration;

use clap::Parser;
use error::AppError;
use hlsget_engine::broadcaster::{self, BroadcasterClient, MediaRecord};
use hlsget_engine::{HlsConfig, HlsDownloader, TransportConfig, TransportConfigBuilder};
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::writer::MakeWriterExt;

mod cli;
mod error;
mod utils;

use cli::{CliArgs, Command};

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open("hlsget.log")?;

    // Logs go to stderr so `--json` output on stdout stays parseable.
    let multi_writer = MakeWriterExt::and(std::io::stderr, log_file);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(multi_writer)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    info!(
        "HTTP configuration: timeout={}s, connect={}s, retry_delay={}ms, max_retries={}",
        args.timeout, args.connect_timeout, args.retry_delay, args.max_retries
    );

    let transport_config = transport_config(&args);
    let hls_config = HlsConfig::builder()
        .with_transport_config(transport_config)
        .max_depth(args.max_depth)
        .segment_concurrency(args.concurrency)
        .iv_policy(args.iv)
        .build();
    let downloader = HlsDownloader::new(hls_config)?;

    match &args.command {
        Command::Save { url, output } => {
            let output = match output {
                Some(path) => path.clone(),
                None => utils::default_output_path(url)?,
            };
            let result = downloader.save(url, &output).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                info!(
                    path = %result.path.display(),
                    bytes = result.bytes_written,
                    "Saved"
                );
            }
        }
        Command::Voice { id, dir, format } => {
            let client = BroadcasterClient::new(downloader);
            // Accept the published file name as well as the bare identifier.
            let id = broadcaster::media_id_from_uri(id);
            let record = client.download_voice(id, dir, *format).await?;
            report(&record, args.json)?;
        }
        Command::Video { id, dir } => {
            let client = BroadcasterClient::new(downloader);
            let record = client.download_video(id, dir).await?;
            report(&record, args.json)?;
        }
    }

    Ok(())
}

fn report(record: &MediaRecord, json: bool) -> Result<(), AppError> {
    if json {
        println!("{}", record.to_json()?);
    } else {
        info!(
            id = %record.id,
            url = %record.url,
            path = %record.location.display(),
            "Saved"
        );
    }
    Ok(())
}

/// Map CLI flags onto a transport configuration.
///
/// Broadcaster commands start from the browser-like preset; `save` from the
/// plain defaults. Headers given with `-H` win over both.
fn transport_config(args: &CliArgs) -> TransportConfig {
    let base = if args.command.is_broadcaster() {
        broadcaster::transport_config()
    } else {
        TransportConfig::default()
    };

    let mut builder = TransportConfigBuilder::from(base)
        .with_timeout(Duration::from_secs(args.timeout))
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_retry_delay(Duration::from_millis(args.retry_delay))
        .with_max_retries(args.max_retries)
        .merge_headers(utils::parse_headers(&args.headers));

    if args.no_proxy {
        info!("System proxy disabled (--no-proxy flag)");
        builder = builder.with_system_proxy(false);
    }

    builder.build()
}
