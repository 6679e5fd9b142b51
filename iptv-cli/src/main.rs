use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;
use iptv_engine::{
    HttpInput, HttpInputConfig, MuxInput, ReqwestEngine, SystemTick, TokioTimer,
};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use url::Url;

mod cli;
mod error;
mod mux;
mod utils;

use cli::CliArgs;
use error::AppError;
use mux::{ChannelMux, MuxEvent};
use utils::{format_bytes, parse_headers};

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) -> Result<(), AppError> {
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::builder()
        .with_default_directive(log_level.into())
        .from_env_lossy();

    // stdout may carry the stream itself
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    let args = CliArgs::parse();
    init_logging(args.verbose)?;

    let url = Url::parse(&args.url)
        .map_err(|e| AppError::InvalidInput(format!("{}: {e}", args.url)))?;
    if !HttpInput::handles(url.scheme()) {
        return Err(AppError::InvalidInput(format!(
            "unsupported scheme '{}', expected http or https",
            url.scheme()
        )));
    }
    if args.queue_size == 0 {
        return Err(AppError::InvalidInput("queue size must be at least 1".into()));
    }

    let mut builder = HttpInputConfig::builder()
        .with_connect_timeout(Duration::from_secs(args.connect_timeout))
        .with_read_timeout(Duration::from_secs(args.read_timeout))
        .with_min_variant_bandwidth(args.min_bandwidth)
        .with_system_proxy(args.use_system_proxy);
    if let Some(user_agent) = &args.user_agent {
        builder = builder.with_user_agent(user_agent);
    }
    let config = builder.build();
    info!(
        "HTTP timeout configuration: connect={}s, read={}s",
        args.connect_timeout, args.read_timeout
    );

    let (chunk_tx, chunk_rx) = mpsc::channel::<Bytes>(args.queue_size);
    let writer = match &args.output {
        Some(path) => {
            info!(path = %path.display(), "Writing stream to file");
            let file = tokio::fs::File::create(path).await?;
            tokio::spawn(write_stream(file, chunk_rx))
        }
        None => tokio::spawn(write_stream(tokio::io::stdout(), chunk_rx)),
    };

    let runtime = Handle::current();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mux = Arc::new(ChannelMux::new(
        args.url.clone(),
        parse_headers(&args.headers),
        config.output_buffer_size,
        chunk_tx,
        event_tx,
        TokioTimer::new(runtime.clone()),
    ));
    mux.set_active(true);

    let engine = ReqwestEngine::new(&config, runtime)?;
    let input = Arc::new(HttpInput::new(
        Arc::new(engine),
        config,
        Arc::new(SystemTick),
    ));

    let session = {
        let mut stream = mux.locks().stream();
        input.start(mux.clone(), &url, &mut stream)?
    };

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping");
                break Ok(());
            }
            event = event_rx.recv() => match event {
                Some(MuxEvent::Started) => info!(url = %url, "Receiving media"),
                Some(MuxEvent::Failed(reason)) => {
                    error!(url = %url, reason = %reason, "Tuning failed");
                    break Err(AppError::Tuning(reason));
                }
                None => break Ok(()),
            },
        }
    };

    mux.set_active(false);
    // Stopping may block on an in-flight engine callback.
    let stop_mux = mux.clone();
    let stop_input = input.clone();
    tokio::task::spawn_blocking(move || {
        let mut stream = stop_mux.locks().stream();
        stop_input.stop(&session, &mut stream);
    })
    .await?;

    mux.close_writer();
    match writer.await? {
        Ok(written) => info!(
            written = %format_bytes(written),
            forwarded = %format_bytes(mux.forwarded()),
            "Stream closed"
        ),
        Err(e) => warn!(error = %e, "Writer failed"),
    }

    outcome
}

/// Drain `chunks` into `sink`, returning the number of bytes written
async fn write_stream<W>(mut sink: W, mut chunks: mpsc::Receiver<Bytes>) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0u64;
    while let Some(chunk) = chunks.recv().await {
        sink.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    sink.flush().await?;
    debug!(written, "Writer finished");
    Ok(written)
}
