// SPDX-FileCopyrightText: 2025 All contributors
//
// SPDX-License-Identifier: GPL-2.0-or-later

use clap::{Args, Parser, Subcommand};
use common::{clock::SystemClock, settings::LogSettings};
use gnss::{GpsdClient, StreamConfig};
use logger::{GpsLogger, LogPolicyEngine};
use module_core::{EventBus, EventKind, Module};
use std::{path::PathBuf, sync::Arc, time::Duration};
use storage::{SampleStore, StoreConfig};
use time_sync::{DateCommand, TimeSync, TimeSyncConfig};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address of the gpsd daemon
    #[arg(long, default_value = "127.0.0.1:2947", global = true)]
    gpsd: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log qualifying fixes into the database and publish the status file
    Logger(LoggerArgs),
    /// Keep the system clock in sync with the receiver's time
    TimeSync(TimeSyncArgs),
}

#[derive(Args, Debug)]
struct LoggerArgs {
    #[arg(long, default_value = "/var/lib/gps-logger/gps_logs.db")]
    db: PathBuf,
    #[arg(long, default_value = "/run/gps-logger/status.json")]
    status: PathBuf,
    /// Seeded into the settings table if no value is stored yet
    #[arg(long, default_value_t = 1.0)]
    log_interval_sec: f64,
    #[arg(long, default_value_t = 0.8)]
    min_speed_write_mps: f64,
    #[arg(long, default_value_t = 3.0)]
    max_hdop_for_log: f64,
}

#[derive(Args, Debug)]
struct TimeSyncArgs {
    #[arg(long, default_value = "/run/gps-logger/time-sync-status.json")]
    status: PathBuf,
    /// Program called as `<program> -u -s @<epoch>` to set the clock
    #[arg(long, default_value = "/bin/date")]
    date_program: PathBuf,
    #[arg(long, default_value_t = 10)]
    command_timeout_sec: u64,
    #[arg(long, default_value_t = 2.0)]
    threshold_sec: f64,
    #[arg(long, default_value_t = 30)]
    hold_off_sec: u64,
}

fn create_logger(eb: &EventBus, gpsd: &str, args: &LoggerArgs) -> Box<dyn Module + Send> {
    let clock = Arc::new(SystemClock);
    let defaults = LogSettings {
        interval_sec: args.log_interval_sec,
        min_speed_mps: args.min_speed_write_mps,
        max_hdop: args.max_hdop_for_log,
    };
    let store = SampleStore::new(StoreConfig::new(&args.db));
    let engine = LogPolicyEngine::new(store, &args.status, defaults, clock.clone());
    let client = GpsdClient::new(StreamConfig::new(gpsd));
    Box::new(GpsLogger::new(eb.context(), client, engine, clock))
}

fn create_time_sync(eb: &EventBus, gpsd: &str, args: &TimeSyncArgs) -> Box<dyn Module + Send> {
    let client = GpsdClient::new(StreamConfig {
        read_timeout: Duration::from_secs(10),
        read_backoff: Duration::from_secs(2),
        ..StreamConfig::new(gpsd)
    });
    let config = TimeSyncConfig {
        correction_threshold_sec: args.threshold_sec,
        hold_off: Duration::from_secs(args.hold_off_sec),
        ..TimeSyncConfig::new(&args.status)
    };
    let date = DateCommand::new(
        &args.date_program,
        Duration::from_secs(args.command_timeout_sec),
    );
    Box::new(TimeSync::new(
        eb.context(),
        client,
        config,
        Box::new(date),
        Arc::new(SystemClock),
    ))
}

#[tokio::main]
async fn main() -> Result<(), ()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let eb = EventBus::default();
    let mut module = match &cli.command {
        Command::Logger(args) => create_logger(&eb, &cli.gpsd, args),
        Command::TimeSync(args) => create_time_sync(&eb, &cli.gpsd, args),
    };

    let quit_ctx = eb.context();
    if let Err(e) = ctrlc::set_handler(move || quit_ctx.publish_event(EventKind::QuitEvent)) {
        error!("Failed to install signal handler. Error: {e}");
        return Err(());
    }

    info!("Starting {:?} with gpsd at {}", cli.command, cli.gpsd);
    module.run().await
}
