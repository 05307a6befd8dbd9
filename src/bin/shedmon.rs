// shedmon: shed humidity monitor, run from cron every few minutes

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use log::{LevelFilter, debug, error, info};
use serde_json::json;

use home_monitor::humidity::relative_to_absolute;
use home_monitor::sensor::dht22::Dht22;
use home_monitor::sensor::ds18b20::Ds18b20;
use home_monitor::sensor::{c_to_f, RetryPolicy};
use home_monitor::stats::median;
use home_monitor::status::{Status, Thresholds, escalate};
use home_monitor::table::Table;
use home_monitor::telemetry::Client;

const COLUMNS: &[&str] = &[
    "date", "time", "temp1", "temp2", "temp3", "hum", "AH", "status",
];

#[derive(Parser)]
#[command(about = "log shed temperature and humidity, with alarm escalation")]
struct Args {
    /// log at debug level
    #[arg(short, long)]
    verbose: bool,
    /// DHT22 GPIO pin (BCM numbering)
    #[arg(long, default_value_t = 18)]
    pin: u8,
    /// 1-wire sysfs base directory
    #[arg(long, default_value = "/sys/bus/w1/devices")]
    w1_base: String,
    /// directory holding the daily tables
    #[arg(long, default_value = "/var/log/shed-monitor")]
    log_dir: PathBuf,
    /// DHT22 samples per cycle
    #[arg(long, default_value_t = 3)]
    samples: u32,
    /// humidity above this is HUMID
    #[arg(long, default_value_t = 55.0)]
    threshold_humid: f64,
    /// humidity above this is WET
    #[arg(long, default_value_t = 75.0)]
    threshold_wet: f64,
    /// telemetry device id; upload is skipped when absent
    #[arg(long)]
    device: Option<String>,
    /// file holding the telemetry api key
    #[arg(long)]
    api_key_file: Option<PathBuf>,
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "nan".to_string(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    std::fs::create_dir_all(&args.log_dir)?;

    info!("#### Reading Temperature and Humidity Sensors ####");
    info!("Reading DHT22");
    let dht = Dht22::new(args.pin).with_retry(RetryPolicy::default());
    let mut temps_f = Vec::new();
    let mut temps_c = Vec::new();
    let mut hums = Vec::new();
    for i in 0..args.samples {
        if i > 0 {
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        match dht.read() {
            Ok(reading) => {
                debug!(
                    "  Temperature = {}, Humidity = {}",
                    fmt_opt(reading.temperature_f()),
                    fmt_opt(reading.humidity_pct)
                );
                if let Some(c) = reading.temperature_c {
                    temps_c.push(c);
                    temps_f.push(c_to_f(c));
                }
                if let Some(h) = reading.humidity_pct {
                    hums.push(h);
                }
            }
            Err(e) => error!("DHT22 read failed: {e}"),
        }
    }
    let temp_f = median(&temps_f);
    let temp_c = median(&temps_c);
    let hum = median(&hums);
    info!(
        "  Temperature = {} F, Humidity = {} %",
        fmt_opt(temp_f),
        fmt_opt(hum)
    );
    let ah = match (temp_c, hum) {
        (Some(t), Some(h)) => Some(relative_to_absolute(t, h)),
        _ => None,
    };
    if let Some(ah) = ah {
        info!("  Absolute Humidity = {ah:.2} g/m^3");
    }

    info!("Reading DS18B20");
    let probe_temps_f: Vec<f64> = match Ds18b20::new(&args.w1_base).read_all() {
        Ok(temps) => temps.iter().map(|t| c_to_f(*t)).collect(),
        Err(e) => {
            error!("DS18B20 read failed: {e}");
            Vec::new()
        }
    };
    for temp in &probe_temps_f {
        info!("  Temperature = {temp:.3} F");
    }

    // Classify against the thresholds, then escalate against the day's
    // history so a persistent humid spell raises exactly one alarm.
    let thresholds = Thresholds {
        humid: args.threshold_humid,
        wet: args.threshold_wet,
    };
    let now = Local::now();
    let datafile = args.log_dir.join(now.format("%Y%m%d_log.txt").to_string());
    debug!("Reading history from {}", datafile.display());
    let history = match Table::load(&datafile, COLUMNS) {
        Ok(table) => table,
        Err(e) => {
            error!("Failed to read data file {}: {e}", datafile.display());
            Table::new(COLUMNS)
        }
    };
    let past: Vec<Status> = history
        .column("status")
        .unwrap_or_default()
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();
    let mut status = None;
    if let Some(hum) = hum {
        let current = escalate(Status::classify(hum, &thresholds), &past);
        info!("Status: {current}");
        status = Some(current);
    }

    let row = vec![
        now.format("%Y/%m/%d").to_string(),
        now.format("%H:%M:%S").to_string(),
        fmt_opt(probe_temps_f.first().copied()),
        fmt_opt(probe_temps_f.get(1).copied()),
        fmt_opt(temp_f),
        fmt_opt(hum),
        fmt_opt(ah),
        status.map(|s| s.to_string()).unwrap_or_else(|| "nan".to_string()),
    ];
    debug!("Writing new row to {}", datafile.display());
    if let Err(e) = Table::append_row(&datafile, COLUMNS, &row) {
        error!("Failed to append to data file: {e}");
    }

    if let Some(device) = &args.device {
        info!("Sending data to telemetry endpoint");
        let key_file = args
            .api_key_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(std::env::var("HOME").unwrap_or_default()).join(".carriots_api"));
        match Client::from_key_file(device, &key_file) {
            Ok(client) => {
                let data = json!({
                    "Temperature1": probe_temps_f.first(),
                    "Temperature2": probe_temps_f.get(1),
                    "Temperature3": temp_f,
                    "Humidity": hum,
                    "Absolute Humidity": ah,
                    "Status": status.map(|s| s.to_string()),
                });
                debug!("  Data: {data}");
                if let Err(e) = client.upload(&data).await {
                    error!("  Upload failed: {e}");
                }
            }
            Err(e) => error!("  {e}"),
        }
    }

    info!("Done");
    Ok(())
}
