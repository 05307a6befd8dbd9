//! DS18B20 1-wire temperature sensors via the kernel w1 sysfs interface.
//!
//! Requires the `w1-gpio` and `w1-therm` modules. Each probe shows up as
//! `/sys/bus/w1/devices/28-*/w1_slave` with a two-line report: a CRC line
//! ending in YES/NO and a data line carrying `t=<millidegrees>`.

use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

use glob::glob;
use log::{debug, warn};
use regex::Regex;

use super::SensorError;

static TEMP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"t=(-?\d+)").unwrap());

pub struct Ds18b20 {
    base: PathBuf,
}

impl Default for Ds18b20 {
    fn default() -> Self {
        Self::new("/sys/bus/w1/devices")
    }
}

impl Ds18b20 {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Read every attached probe, in Celsius. Probes with a bad CRC are
    /// skipped with a warning; no probes at all is an error so callers can
    /// tell an empty bus from a missing kernel module.
    pub fn read_all(&self) -> Result<Vec<f64>, SensorError> {
        let pattern = self.base.join("28-*").join("w1_slave");
        let paths: Vec<PathBuf> = glob(&pattern.to_string_lossy())
            .map_err(|e| SensorError::Parse(e.to_string()))?
            .filter_map(Result::ok)
            .collect();
        if paths.is_empty() {
            return Err(SensorError::NoDevices(self.base.display().to_string()));
        }

        let mut temps = Vec::with_capacity(paths.len());
        for path in paths {
            let contents = fs::read_to_string(&path)?;
            match parse_w1_report(&contents) {
                Some(temp) => {
                    debug!("{}: {:.3} C", path.display(), temp);
                    temps.push(temp);
                }
                None => warn!("{}: bad CRC or malformed report", path.display()),
            }
        }
        Ok(temps)
    }
}

/// Parse one w1_slave report into Celsius. `None` on CRC failure or a
/// missing `t=` field.
fn parse_w1_report(contents: &str) -> Option<f64> {
    let mut lines = contents.lines();
    let crc_line = lines.next()?;
    if !crc_line.trim_end().ends_with("YES") {
        return None;
    }
    let data_line = lines.next()?;
    let raw: i64 = TEMP_RE.captures(data_line)?.get(1)?.as_str().parse().ok()?;
    Some(raw as f64 / 1000.0)
}
