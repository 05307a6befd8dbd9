//! Sensor drivers and the types they share.

use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod cloud;
pub mod dht22;
pub mod ds18b20;

/// One capture from a temperature/humidity sensor. Fields are `None` when
/// the sensor answered but a value could not be parsed out of the response.
#[derive(Clone, Copy, Debug)]
pub struct Reading {
    pub temperature_c: Option<f64>,
    pub humidity_pct: Option<f64>,
    pub at: DateTime<Utc>,
}

impl Reading {
    pub fn temperature_f(&self) -> Option<f64> {
        self.temperature_c.map(c_to_f)
    }
}

pub fn c_to_f(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Bounded retry for flaky one-wire reads. The original scripts disagreed
/// between retry-forever and read-once; a small bounded count covers both
/// uses without risking a hung cron job.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("failed to run sensor helper {helper}: {source}")]
    Spawn {
        helper: String,
        source: std::io::Error,
    },
    #[error("no valid reading after {attempts} attempts")]
    Exhausted { attempts: u32 },
    #[error("unparseable sensor response: {0}")]
    Parse(String),
    #[error("no 1-wire devices found under {0}")]
    NoDevices(String),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("timed out sending to sensor")]
    Timeout,
    #[error("sensor i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn celsius_to_fahrenheit() {
        assert!((c_to_f(0.0) - 32.0).abs() < 1e-9);
        assert!((c_to_f(100.0) - 212.0).abs() < 1e-9);
        assert!((c_to_f(-40.0) + 40.0).abs() < 1e-9);
    }
}
