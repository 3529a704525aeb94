//! Command-line runner: upload one chart image, save the extracted leads.
//!
//! ```text
//! leadwire scan.png --url ws://localhost:9998/ws --out-dir ekg
//! ```
//!
//! Logs go to stderr; set `RUST_LOG` to adjust verbosity.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use leadwire::protocol::DEFAULT_CHUNK_SIZE;
use leadwire::transport::{HttpTransport, DEFAULT_MAX_MESSAGE_SIZE};
use leadwire::{export_bitmaps, Client, LeadwireError, RasterImage};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Transport {
    /// Persistent WebSocket connection.
    Ws,
    /// Single HTTP POST.
    Http,
}

#[derive(Parser)]
#[command(about = "Upload a chart scan and save the lead bitmaps the processor extracts.")]
struct Args {
    /// Chart image to upload (PNG).
    image: PathBuf,

    /// Processor endpoint.
    #[arg(long, default_value = "ws://localhost:9998/ws")]
    url: String,

    #[arg(long, value_enum, default_value = "ws")]
    transport: Transport,

    /// Directory receiving one PNG and one text dump per lead.
    #[arg(long, default_value = "ekg")]
    out_dir: PathBuf,

    /// Largest pixel chunk per frame, in bytes.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Largest accepted reply, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_MESSAGE_SIZE)]
    max_message_size: usize,

    /// Seconds to wait for the reply; 0 waits forever.
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let phase = e
                .downcast_ref::<LeadwireError>()
                .map(LeadwireError::phase)
                .unwrap_or("setup");
            tracing::error!("{} phase failed: {:#}", phase, e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let timeout = (args.timeout_secs > 0).then(|| Duration::from_secs(args.timeout_secs));

    let image = RasterImage::open(&args.image)
        .with_context(|| format!("loading {}", args.image.display()))?;

    let bitmaps = match args.transport {
        Transport::Ws => {
            let client = Client::builder(&args.url)
                .max_chunk_size(args.chunk_size)
                .max_message_size(args.max_message_size)
                .reply_timeout(timeout)
                .connect()
                .await?;
            let result = client.process(&image).await;
            client.close().await;
            result?
        }
        Transport::Http => HttpTransport::new(&args.url, timeout)?.process(&image).await?,
    };

    tracing::info!("Decoded {} bitmaps", bitmaps.len());
    let written = export_bitmaps(&args.out_dir, &bitmaps)
        .with_context(|| format!("exporting to {}", args.out_dir.display()))?;
    tracing::info!("Wrote {} files to {}", written.len(), args.out_dir.display());

    Ok(())
}
