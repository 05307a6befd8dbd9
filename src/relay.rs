//! Relay control and the two-threshold thermostat policy.

use std::fmt;
use std::str::FromStr;

use rppal::gpio::{Gpio, OutputPin};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("gpio error: {0}")]
    Gpio(#[from] rppal::gpio::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayState {
    On,
    Off,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::On => write!(f, "On"),
            RelayState::Off => write!(f, "Off"),
        }
    }
}

impl FromStr for RelayState {
    type Err = ();

    /// Anything other than the known states reads as Off; an unreadable
    /// history row must not leave the compressor running.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "On" => Ok(RelayState::On),
            _ => Ok(RelayState::Off),
        }
    }
}

/// Two-threshold hysteresis: switch on above `high_f`, off below `low_f`,
/// hold the last state inside the dead band.
#[derive(Clone, Copy, Debug)]
pub struct Thermostat {
    pub high_f: f64,
    pub low_f: f64,
}

impl Thermostat {
    pub fn decide(&self, temp_f: f64, last: Option<RelayState>) -> RelayState {
        if temp_f > self.high_f {
            RelayState::On
        } else if temp_f < self.low_f {
            RelayState::Off
        } else {
            // No history (fresh log file) defaults to off.
            last.unwrap_or(RelayState::Off)
        }
    }
}

/// A relay on one BCM-numbered GPIO pin.
pub struct Relay {
    pin: OutputPin,
}

impl Relay {
    pub fn open(bcm_pin: u8) -> Result<Self, RelayError> {
        let pin = Gpio::new()?.get(bcm_pin)?.into_output();
        Ok(Self { pin })
    }

    pub fn set(&mut self, state: RelayState) {
        match state {
            RelayState::On => self.pin.set_high(),
            RelayState::Off => self.pin.set_low(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THERMOSTAT: Thermostat = Thermostat {
        high_f: 42.0,
        low_f: 38.0,
    };

    #[test]
    fn above_high_switches_on() {
        assert_eq!(THERMOSTAT.decide(45.0, Some(RelayState::Off)), RelayState::On);
    }

    #[test]
    fn below_low_switches_off() {
        assert_eq!(THERMOSTAT.decide(35.0, Some(RelayState::On)), RelayState::Off);
    }

    #[test]
    fn dead_band_holds_last_state() {
        assert_eq!(THERMOSTAT.decide(40.0, Some(RelayState::On)), RelayState::On);
        assert_eq!(THERMOSTAT.decide(40.0, Some(RelayState::Off)), RelayState::Off);
    }

    #[test]
    fn dead_band_without_history_defaults_off() {
        assert_eq!(THERMOSTAT.decide(40.0, None), RelayState::Off);
    }

    #[test]
    fn unknown_status_strings_parse_as_off() {
        assert_eq!("On".parse::<RelayState>(), Ok(RelayState::On));
        assert_eq!("Off".parse::<RelayState>(), Ok(RelayState::Off));
        assert_eq!("unknown".parse::<RelayState>(), Ok(RelayState::Off));
    }
}
