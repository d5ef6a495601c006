//! Fetch snapshot example
//!
//! Locates the snapshot published at (or shortly after) a date and either
//! downloads it or prints its URL.
//!
//! ```text
//! cargo run --example fetch_snapshot -- 2022-02-28_08-00-00
//! cargo run --example fetch_snapshot -- 2022-02-28_08-00-00 --report
//! cargo run --example fetch_snapshot -- 2022-02-28_08-00-00 --config snapshot.json --output latest.car
//! ```

use std::path::PathBuf;

use snapshot_dl::{Config, Event, FetchOutcome, SnapshotClient, Timestamp, cancel_on_signal};
use tokio_util::sync::CancellationToken;

const USAGE: &str = "usage: fetch_snapshot <YYYY-MM-DD_HH-MM-SS> [--report] [--strict] \
                     [--config FILE] [--host URL] [--output FILE] [--segments N]";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging (optional)
    // Uncomment if you add tracing-subscriber to your dependencies:
    // tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(date) = args.next() else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let mut config = Config::default();
    let mut overrides = Vec::new();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                let path = PathBuf::from(args.next().ok_or(USAGE)?);
                config = Config::from_json_file(&path)?;
            }
            "--report" | "--strict" => overrides.push((arg, None)),
            "--host" | "--output" | "--segments" => {
                let value = args.next().ok_or(USAGE)?;
                overrides.push((arg, Some(value)));
            }
            _ => {
                eprintln!("{USAGE}");
                std::process::exit(2);
            }
        }
    }

    // Flags win over the config file regardless of order
    for (flag, value) in overrides {
        match (flag.as_str(), value) {
            ("--report", _) => config.report_only = true,
            ("--strict", _) => config.strict = true,
            ("--host", Some(host)) => config.host = host,
            ("--output", Some(path)) => config.output_path = Some(path.into()),
            ("--segments", Some(n)) => config.segments = n.parse()?,
            _ => {}
        }
    }

    let start = Timestamp::parse(&date)?;
    let token = CancellationToken::new();
    tokio::spawn(cancel_on_signal(token.clone()));

    let client = SnapshotClient::new(config)?.with_cancellation(token);

    if client.config().report_only {
        client.report_to(start, &mut std::io::stdout()).await?;
        return Ok(());
    }

    let mut events = client.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::ProbeMissed { url, status, .. } => {
                    eprintln!("not found ({status}): {url}");
                }
                Event::Located { url, content_length } => {
                    eprintln!("found {url} ({content_length} bytes)");
                }
                Event::Downloading {
                    percent, speed_bps, ..
                } => {
                    eprintln!("{percent:.1}% at {:.1} MB/s", speed_bps as f64 / 1_000_000.0);
                }
                Event::PartitionFailed { range, error } => {
                    eprintln!("partition {range} failed: {error}");
                }
                _ => {}
            }
        }
    });

    if let FetchOutcome::Downloaded(file) = client.locate_and_fetch(start).await? {
        if file.is_complete() {
            println!("saved {}", file.path().display());
        } else {
            eprintln!(
                "{} of {} partitions failed, {} is incomplete",
                file.partition_errors.len(),
                file.partitions,
                file.path().display()
            );
            std::process::exit(1);
        }
    }

    Ok(())
}
