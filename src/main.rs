//! Binary entrypoint: wires CLI configuration, the `EventLake` facade, and
//! the stdin-JSONL demo source, and waits for a shutdown signal.

use std::time::Duration;

use clap::Parser;
use eventlake::config::{Cli, Options};
use eventlake::demo::stdin_source;
use eventlake::EventLake;

#[tokio::main]
async fn main() {
    env_logger::init();

    let options: Options = Cli::parse().into();
    let mut lake = match EventLake::open(options) {
        Ok(lake) => lake,
        Err(err) => {
            log::error!("failed to open event lake: {err}");
            std::process::exit(1);
        }
    };

    log::info!("eventlake open at {}", lake.options().db_path.display());

    let handle = lake.ingest_handle();
    let stdin_task = tokio::spawn(stdin_source::run(tokio::io::stdin(), handle));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            log::info!("received shutdown signal");
        }
        appended = stdin_task => {
            match appended {
                Ok(n) => log::info!("stdin source closed after appending {n} events"),
                Err(err) => log::warn!("stdin source task panicked: {err}"),
            }
        }
    }

    lake.shutdown(Duration::from_secs(30)).await;
}
