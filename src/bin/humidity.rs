// humidity: dew point to relative and absolute humidity

use clap::Parser;

use home_monitor::humidity::{VaporPhase, from_dew_point};

#[derive(Parser)]
#[command(about = "convert temperature and dew point to relative and absolute humidity")]
struct Args {
    /// air temperature in degrees C
    #[arg(short = 'T', long = "temperature", allow_hyphen_values = true)]
    temperature: f64,
    /// dew point in degrees C
    #[arg(short = 'D', long = "dew-point", allow_hyphen_values = true)]
    dew_point: f64,
    /// use constants for ice rather than water
    #[arg(short, long)]
    ice: bool,
}

fn main() {
    let args = Args::parse();
    let phase = if args.ice {
        VaporPhase::Ice
    } else {
        VaporPhase::Water
    };
    let report = from_dew_point(args.temperature, args.dew_point, phase);
    println!("Relative Humidity = {:.1} %", report.relative_pct);
    println!("Absolute Humidity = {:.2} g/m^3", report.absolute_g_m3);
}
