// cloudlog: poll the AAG cloud sensor and log sigma-clipped summaries

use clap::Parser;
use log::{LevelFilter, error, info};

use home_monitor::sensor::c_to_f;
use home_monitor::sensor::cloud::{CloudReport, CloudSensor};
use home_monitor::stats::{ClipConfig, Summary};

#[derive(Parser)]
#[command(about = "poll the cloud sensor and log one summary line")]
struct Args {
    /// log at debug level
    #[arg(short, long)]
    verbose: bool,
    /// serial device the sensor is attached to
    #[arg(long, default_value = "/dev/ttyAMA0")]
    port: String,
    /// readings per channel before clipping
    #[arg(long, default_value_t = 15)]
    samples: usize,
    /// clipping width in standard deviations
    #[arg(long, default_value_t = 2.0)]
    sigma: f64,
    /// clipping passes
    #[arg(long, default_value_t = 2)]
    iterations: u32,
}

/// `value (stddev count)` in the fixed-width form the daily log uses.
fn cell(summary: &Option<Summary>, fahrenheit: bool) -> String {
    match summary {
        Some(s) => {
            // Spreads scale but do not shift under the unit change.
            let (mean, stddev) = if fahrenheit {
                (c_to_f(s.mean), s.stddev * 9.0 / 5.0)
            } else {
                (s.mean, s.stddev)
            };
            format!("{:7.2} ({:5.1} {:2})", mean, stddev, s.count)
        }
        None => format!("{:>7} ({:>5} {:>2})", "-", "-", "-"),
    }
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

    let mut sensor = match CloudSensor::open(&args.port) {
        Ok(sensor) => {
            info!("Connected to cloud sensor on {}", args.port);
            sensor
        }
        Err(e) => {
            error!("Unable to connect to cloud sensor on {}: {e}", args.port);
            return;
        }
    };

    let cfg = ClipConfig {
        sigma: args.sigma,
        iterations: args.iterations,
    };
    let report: CloudReport = match sensor.query_all(args.samples, &cfg) {
        Ok(report) => report,
        Err(e) => {
            error!("Cloud sensor poll failed: {e}");
            return;
        }
    };

    let safe_digit = match report.safe {
        Some(true) => 1,
        _ => 0,
    };
    info!(
        "{} {} {} {} {} {:7.0} {:5}",
        cell(&report.sky_temp_c, true),
        cell(&report.ambient_temp_c, true),
        cell(&report.voltage, false),
        cell(&report.ldr_kohm, false),
        cell(&report.rain_temp_c, false),
        report.pwm_pct.unwrap_or(-1.0),
        safe_digit,
    );
    if report.errors.iter().any(|e| matches!(e, Some(n) if *n > 0)) {
        error!("Cloud sensor error counters: {:?}", report.errors);
    }
}
