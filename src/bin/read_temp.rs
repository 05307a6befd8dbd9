// read_temp: one-shot read of the DS18B20 probes and the DHT22

use clap::Parser;
use log::{LevelFilter, error, info};

use home_monitor::sensor::dht22::Dht22;
use home_monitor::sensor::ds18b20::Ds18b20;
use home_monitor::sensor::{RetryPolicy, c_to_f};

#[derive(Parser)]
#[command(about = "read temperature and humidity sensors once")]
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
    /// maximum DHT22 read attempts
    #[arg(long, default_value_t = 5)]
    retries: u32,
    /// path to the Adafruit DHT helper binary
    #[arg(long, default_value = "Adafruit_DHT")]
    dht_helper: String,
}

fn main() {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(if args.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    match Ds18b20::new(&args.w1_base).read_all() {
        Ok(temps) => {
            for temp in &temps {
                info!("Temperature (DS18B20) = {:.1} F", c_to_f(*temp));
            }
        }
        Err(e) => error!("DS18B20 read failed: {e}"),
    }

    let dht = Dht22::new(args.pin)
        .with_helper(&args.dht_helper)
        .with_retry(RetryPolicy {
            max_attempts: args.retries,
        });
    match dht.read() {
        Ok(reading) => {
            if let Some(temp_f) = reading.temperature_f() {
                info!("Temperature (DHT22) = {:.1} F", temp_f);
            }
            if let Some(hum) = reading.humidity_pct {
                info!("Humidity (DHT22) = {:.0} %", hum);
            }
        }
        Err(e) => error!("DHT22 read failed: {e}"),
    }
}
