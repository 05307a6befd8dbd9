// kegerator: freezer thermostat, run from cron every few minutes

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use clap::Parser;
use log::{LevelFilter, debug, error, info};
use serde_json::json;

use home_monitor::humidity::relative_to_absolute;
use home_monitor::relay::{Relay, RelayState, Thermostat};
use home_monitor::sensor::dht22::Dht22;
use home_monitor::sensor::ds18b20::Ds18b20;
use home_monitor::sensor::c_to_f;
use home_monitor::stats::median;
use home_monitor::table::Table;
use home_monitor::telemetry::Client;

const COLUMNS: &[&str] = &[
    "date", "time", "AmbTemp", "KegTemp1", "KegTemp2", "RH", "AH", "status",
];

#[derive(Parser)]
#[command(about = "drive the kegerator relay from the keg temperatures")]
struct Args {
    /// log at debug level
    #[arg(short, long)]
    verbose: bool,
    /// DHT22 GPIO pin (BCM numbering)
    #[arg(long, default_value_t = 18)]
    pin: u8,
    /// relay GPIO pin (BCM numbering)
    #[arg(long, default_value_t = 23)]
    relay_pin: u8,
    /// 1-wire sysfs base directory
    #[arg(long, default_value = "/sys/bus/w1/devices")]
    w1_base: String,
    /// directory holding the daily tables
    #[arg(long, default_value = "/var/log/kegerator")]
    log_dir: PathBuf,
    /// switch the freezer on above this temperature (F)
    #[arg(long, default_value_t = 42.0)]
    temp_high: f64,
    /// switch the freezer off below this temperature (F)
    #[arg(long, default_value_t = 38.0)]
    temp_low: f64,
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
    let mut temps_f: Vec<f64> = Vec::new();

    debug!("Reading DHT22");
    let mut rh = None;
    let mut ah = None;
    match Dht22::new(args.pin).read() {
        Ok(reading) => {
            debug!(
                "  Temperature = {}, Humidity = {}",
                fmt_opt(reading.temperature_f()),
                fmt_opt(reading.humidity_pct)
            );
            if let Some(t) = reading.temperature_f() {
                temps_f.push(t);
            }
            if let (Some(t), Some(h)) = (reading.temperature_c, reading.humidity_pct) {
                rh = Some(h);
                ah = Some(relative_to_absolute(t, h));
                debug!("  Absolute Humidity = {:.2} g/m^3", ah.unwrap());
            }
        }
        Err(e) => error!("DHT22 read failed: {e}"),
    }

    debug!("Reading DS18B20");
    match Ds18b20::new(&args.w1_base).read_all() {
        Ok(temps) => {
            for temp in temps {
                debug!("  Temperature = {:.3} F", c_to_f(temp));
                temps_f.push(c_to_f(temp));
            }
        }
        Err(e) => error!("DS18B20 read failed: {e}"),
    }

    let now = Local::now();
    let datafile = args.log_dir.join(now.format("%Y%m%d.txt").to_string());
    debug!("Reading history from {}", datafile.display());
    let history = match Table::load(&datafile, COLUMNS) {
        Ok(table) => table,
        Err(e) => {
            error!("Failed to read data file {}: {e}", datafile.display());
            Table::new(COLUMNS)
        }
    };
    let last_state: Option<RelayState> = history
        .last("status")
        .and_then(|s| s.parse().ok());

    // The DHT22 sits outside the freezer, so the warmest reading is the
    // ambient one; the rest are keg probes.
    temps_f.sort_by(|a, b| a.total_cmp(b));
    let ambient = temps_f.pop();
    if let Some(ambient) = ambient {
        info!("Ambient Temperature = {ambient:.1} F");
    }
    for temp in &temps_f {
        info!("Kegerator Temperature = {temp:.1} F");
    }

    let thermostat = Thermostat {
        high_f: args.temp_high,
        low_f: args.temp_low,
    };
    let status = match median(&temps_f) {
        Some(keg_temp) => {
            info!("Median Temperature = {keg_temp:.1} F");
            let state = thermostat.decide(keg_temp, last_state);
            match state {
                s if keg_temp > args.temp_high => {
                    info!(
                        "Temperature {keg_temp:.1} is greater than {:.1}. Turning freezer {s}.",
                        args.temp_high
                    );
                }
                s if keg_temp < args.temp_low => {
                    info!(
                        "Temperature {keg_temp:.1} is less than {:.1}. Turning freezer {s}.",
                        args.temp_low
                    );
                }
                s => info!("Temperature is {keg_temp:.1}. Taking no action. Status is {s}."),
            }
            match Relay::open(args.relay_pin) {
                Ok(mut relay) => relay.set(state),
                Err(e) => error!("Relay control failed: {e}"),
            }
            Some(state)
        }
        None => {
            // No keg probes answered; leave the relay alone.
            error!("No keg temperatures available, taking no action");
            last_state
        }
    };

    let row = vec![
        now.format("%Y/%m/%d").to_string(),
        now.format("%H:%M:%S").to_string(),
        fmt_opt(ambient),
        fmt_opt(temps_f.first().copied()),
        fmt_opt(temps_f.get(1).copied()),
        fmt_opt(rh),
        fmt_opt(ah),
        status.unwrap_or(RelayState::Off).to_string(),
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
                    "Temperature": median(&temps_f),
                    "Status": status.unwrap_or(RelayState::Off).to_string(),
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
