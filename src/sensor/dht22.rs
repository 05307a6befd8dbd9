//! DHT22/AM2302 temperature and humidity sensor.
//!
//! The sensor's 1-wire timing protocol needs tight bit-banging, so reads go
//! through the Adafruit `Adafruit_DHT` helper binary and its text output is
//! parsed here. Reads fail routinely (checksum errors on long cables), hence
//! the bounded retry with a settle delay between attempts.

use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;
use std::thread::sleep;
use std::time::Duration;

use chrono::Utc;
use log::debug;
use regex::Regex;

use super::{Reading, RetryPolicy, SensorError};

static TEMP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Temp =\s+([0-9.]+)").unwrap());
static HUM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Hum =\s+([0-9.]+)").unwrap());

/// The helper's sensor-model argument for the AM2302/DHT22.
const MODEL: &str = "2302";

/// Minimum spacing between DHT22 reads per the datasheet.
const SETTLE: Duration = Duration::from_secs(2);

pub struct Dht22 {
    helper: PathBuf,
    pin: u8,
    retry: RetryPolicy,
}

impl Dht22 {
    pub fn new(pin: u8) -> Self {
        Self {
            helper: PathBuf::from("Adafruit_DHT"),
            pin,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_helper(mut self, helper: impl Into<PathBuf>) -> Self {
        self.helper = helper.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Read the sensor, retrying until at least one field parses.
    pub fn read(&self) -> Result<Reading, SensorError> {
        for attempt in 1..=self.retry.max_attempts {
            if attempt > 1 {
                sleep(SETTLE);
            }
            let output = Command::new(&self.helper)
                .arg(MODEL)
                .arg(self.pin.to_string())
                .output()
                .map_err(|source| SensorError::Spawn {
                    helper: self.helper.display().to_string(),
                    source,
                })?;
            let text = String::from_utf8_lossy(&output.stdout);
            let reading = parse_output(&text);
            if reading.temperature_c.is_some() || reading.humidity_pct.is_some() {
                return Ok(reading);
            }
            debug!("DHT22 attempt {attempt} returned no parseable fields");
        }
        Err(SensorError::Exhausted {
            attempts: self.retry.max_attempts,
        })
    }
}

/// Pull `Temp = <n>` and `Hum = <n>` out of the helper's output. Either
/// field may be absent on a bad read.
fn parse_output(text: &str) -> Reading {
    let grab = |re: &Regex| {
        re.captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
    };
    Reading {
        temperature_c: grab(&TEMP_RE),
        humidity_pct: grab(&HUM_RE),
        at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_fields() {
        let reading = parse_output("Using pin #18\nData (40): ...\nTemp =  22.3 *C, Hum = 48.9 %");
        assert_eq!(reading.temperature_c, Some(22.3));
        assert_eq!(reading.humidity_pct, Some(48.9));
        assert!((reading.temperature_f().unwrap() - 72.14).abs() < 0.01);
    }

    #[test]
    fn missing_fields_become_none() {
        let reading = parse_output("Data (40): 0x1 0x2\nChecksum error");
        assert_eq!(reading.temperature_c, None);
        assert_eq!(reading.humidity_pct, None);
    }

    #[test]
    fn partial_read_keeps_the_parsed_field() {
        let reading = parse_output("Temp =  19.0 *C");
        assert_eq!(reading.temperature_c, Some(19.0));
        assert_eq!(reading.humidity_pct, None);
    }
}
