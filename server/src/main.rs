use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use framelink::sink::persist::{self, BINARY_EXTENSION, TEXT_EXTENSION};
use framelink::{BroadcastHub, PacketSink};
use log::*;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tokio_util::sync::CancellationToken;

mod error;
mod ingest;
mod options;

use error::{Result, ServerError};
use ingest::{Mode, Outputs};
use options::{Args, Options};

/// Serial read timeout; bounds how long a stop request waits on the link.
const SERIAL_READ_TIMEOUT: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let options = Options::resolve(&args);

    let verbose = options.as_ref().map_or(args.verbose, |o| o.verbose);
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let result = match options {
        Ok(options) => run(options).await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(options: Options) -> Result<()> {
    info!("Final options: {:?}", options);

    let stop = CancellationToken::new();
    let hub = BroadcastHub::start(options.hub_config(), stop.clone()).await?;

    let port = match open_serial(&options) {
        Ok(port) => port,
        Err(e) => {
            hub.stop().await;
            return Err(e);
        }
    };
    info!("Hit Ctrl+C to save the data and exit at any time.");

    let mode = if options.repeat {
        Mode::Repeat
    } else {
        Mode::Framed {
            limit: options.data_size,
        }
    };
    let sink = PacketSink::new();
    let outputs = Outputs {
        sink: sink.clone(),
        publisher: hub.publisher(),
    };
    let ingest_stop = stop.clone();
    let mut ingestion =
        tokio::task::spawn_blocking(move || ingest::run(port, mode, ingest_stop, &outputs));

    let outcome = tokio::select! {
        outcome = &mut ingestion => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            stop.cancel();
            ingestion.await
        }
    };
    stop.cancel();
    hub.stop().await;

    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Serial ingestion stopped: {}", e),
        Err(e) => error!("{}", ServerError::from(e)),
    }

    save(&options, &sink)
}

fn open_serial(options: &Options) -> Result<Box<dyn SerialPort>> {
    let port = serialport::new(&options.serial_port, options.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .flow_control(FlowControl::None)
        .timeout(SERIAL_READ_TIMEOUT)
        .open()
        .map_err(|source| ServerError::SerialOpen {
            port: options.serial_port.clone(),
            source,
        })?;
    info!(
        "Opened serial port: {} at {} baud",
        options.serial_port, options.baud_rate
    );
    Ok(port)
}

fn save(options: &Options, sink: &PacketSink) -> Result<()> {
    let packets = sink.take();
    let now = chrono::Local::now();
    let saved = if options.repeat {
        let path = persist::output_path(&options.output_file, TEXT_EXTENSION, options.stamped, &now);
        persist::save_text(path, &packets)?
    } else {
        let path = persist::output_path(&options.output_file, BINARY_EXTENSION, options.stamped, &now);
        persist::save_binary(path, &packets)?
    };

    if !saved {
        info!("no data to save");
    }
    Ok(())
}
