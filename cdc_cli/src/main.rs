//! Thin bootstrap binary: loads configuration, starts tracing, and wires
//! the conversion driver (§4.8) and the client line-protocol listener
//! (§4.9) together as two independent blocking loops.
//!
//! Grounded on the teacher's `binlog_cli/src/main.rs` argument/bootstrap
//! shape, narrowed since this crate's conversion loop is synchronous
//! (§5) and the external interface never names a MySQL replication
//! handshake (host/port/username/password) for this binary to accept.

use std::io::{BufRead, BufReader};
use std::net::{TcpListener, TcpStream};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;

use cdc::driver::ConversionDriver;
use cdc::session::ClientSession;
use common::config::{read_config, AvroConverterConfig};
use common::err::CResult;
use common::log::tracing_factory::{init_log, OutputType, TracingFactoryOptions};

/// How long the driver sleeps before retrying once it pauses for a
/// non-fatal reason (no next file yet, or an open transaction at
/// end-of-file, §4.8 steps 6-7). This stands in for the external
/// housekeeper process that §1 leaves out of scope.
const DRIVER_RETRY_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Parser, Debug, Clone)]
#[command(name = "cdc-cli")]
#[command(version)]
#[command(about = "MariaDB binlog to Avro CDC converter", long_about = None)]
struct CliArgs {
    /// Path to the TOML configuration file.
    #[arg(short, long, help = "Path to the configuration file", value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(short, long, help = "enable debug logging", default_value_t = false)]
    debug: bool,
}

fn main() -> CResult<()> {
    let args = CliArgs::parse();
    let config = load_config(&args)?;

    let log_opts = TracingFactoryOptions {
        debug: args.debug,
        output_type: if config.base.log_dir.is_some() {
            OutputType::File
        } else {
            OutputType::Stdout
        },
        log_dir: config.base.log_dir.clone().unwrap_or_default(),
    };
    init_log(log_opts);

    eprintln!();
    eprintln!("╔╦╗╔═╗ ╔═╗╔╦╗╦  ");
    eprintln!(" ║ ╠═╣ ║   ║ ║  ");
    eprintln!(" ╩ ╩ ╩ ╚═╝ ╩ ╩═╝ binlog-to-Avro CDC converter");
    eprintln!();

    tracing::info!(
        "reading binlog from `{}` starting at `{}`",
        config.binlog.binlog_path,
        config.binlog.file
    );

    let driver_config = config.clone();
    thread::spawn(move || run_driver(driver_config));

    serve(&config.listen.addr, config.avro.avro_dir.clone())
}

fn load_config(args: &CliArgs) -> CResult<AvroConverterConfig> {
    match &args.config {
        Some(path) => read_config(path),
        None => Ok(AvroConverterConfig::default()),
    }
}

/// Runs the conversion loop forever. A pause that isn't an error (no
/// next file yet, or a transaction left open at end-of-file) and a
/// decode/IO error both just mean "try again shortly from the last
/// checkpoint" (§4.8 step 2, §7) — there is nothing else useful to do
/// with either outcome at this layer.
fn run_driver(config: AvroConverterConfig) {
    let checkpoint_path = format!("{}/avro-conversion.ini", config.avro.avro_dir);
    let ddl_path = format!("{}/table-ddl.list", config.avro.avro_dir);

    let mut driver = match ConversionDriver::new(&config, checkpoint_path, ddl_path) {
        Ok(d) => d,
        Err(e) => {
            tracing::error!("failed to start conversion driver: {e}");
            return;
        }
    };

    loop {
        match driver.run() {
            Ok(outcome) => tracing::debug!("conversion driver paused: {outcome:?}"),
            Err(e) => tracing::warn!("conversion driver stopped on error, retrying from checkpoint: {e}"),
        }
        thread::sleep(DRIVER_RETRY_INTERVAL);
    }
}

/// Accepts client connections and drives one [`ClientSession`] per
/// connection on its own thread (§4.9): sessions share nothing but the
/// read-only `avro_dir`, so no locking is needed between them.
fn serve(addr: &str, avro_dir: String) -> CResult<()> {
    let listener = TcpListener::bind(addr)?;
    tracing::info!("listening for CDC clients on {addr}");

    for stream in listener.incoming() {
        let stream = stream?;
        let avro_dir = avro_dir.clone();
        thread::spawn(move || {
            if let Err(e) = handle_client(stream, avro_dir) {
                tracing::warn!("client session ended: {e}");
            }
        });
    }
    Ok(())
}

fn handle_client(stream: TcpStream, avro_dir: String) -> CResult<()> {
    let reader = BufReader::new(stream.try_clone()?);
    let mut session = ClientSession::new(avro_dir, stream);
    for line in reader.lines() {
        session.handle_line(&line?)?;
    }
    Ok(())
}
