//! Shed humidity status classification and alarm escalation.

use std::fmt;
use std::str::FromStr;

/// Humidity thresholds separating the three status levels.
#[derive(Clone, Copy, Debug)]
pub struct Thresholds {
    pub humid: f64,
    pub wet: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            humid: 55.0,
            wet: 75.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Ok,
    Humid,
    Wet,
}

impl Level {
    /// Numeric weight used when averaging recent history.
    fn score(self) -> f64 {
        match self {
            Level::Ok => 0.0,
            Level::Humid => 1.0,
            Level::Wet => 2.0,
        }
    }
}

/// A status as written to (and read back from) the daily table, e.g.
/// `OK`, `HUMID`, `WET-ALARM`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Status {
    pub level: Level,
    pub alarm: bool,
}

impl Status {
    pub fn classify(humidity_pct: f64, thresholds: &Thresholds) -> Self {
        let level = if humidity_pct < thresholds.humid {
            Level::Ok
        } else if humidity_pct < thresholds.wet {
            Level::Humid
        } else {
            Level::Wet
        };
        Status {
            level,
            alarm: false,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self.level {
            Level::Ok => "OK",
            Level::Humid => "HUMID",
            Level::Wet => "WET",
        };
        if self.alarm {
            write!(f, "{name}-ALARM")
        } else {
            write!(f, "{name}")
        }
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, alarm) = match s.strip_suffix("-ALARM") {
            Some(name) => (name, true),
            None => (s, false),
        };
        let level = match name {
            "OK" => Level::Ok,
            "HUMID" => Level::Humid,
            "WET" => Level::Wet,
            other => return Err(format!("unknown status {other:?}")),
        };
        Ok(Status { level, alarm })
    }
}

/// Raise the alarm once a humid spell has persisted.
///
/// With more than 12 history rows: if the mean level of the last 6 exceeds
/// 0.5, the current level is not OK, and no alarm fired in the last 12, the
/// current status gains the alarm flag. The re-fire suppression keeps the
/// notification hook from going off every three minutes all afternoon.
pub fn escalate(current: Status, history: &[Status]) -> Status {
    if history.len() <= 12 || current.level == Level::Ok {
        return current;
    }
    let recent = &history[history.len() - 6..];
    let recent_score = recent.iter().map(|s| s.level.score()).sum::<f64>() / recent.len() as f64;
    let recent_alarm = history[history.len() - 12..].iter().any(|s| s.alarm);
    if recent_score > 0.5 && !recent_alarm {
        return Status {
            alarm: true,
            ..current
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(s: &str) -> Status {
        s.parse().unwrap()
    }

    #[test]
    fn classification_brackets() {
        let t = Thresholds::default();
        assert_eq!(Status::classify(40.0, &t).level, Level::Ok);
        assert_eq!(Status::classify(60.0, &t).level, Level::Humid);
        assert_eq!(Status::classify(80.0, &t).level, Level::Wet);
    }

    #[test]
    fn display_and_parse_round_trip() {
        for s in ["OK", "HUMID", "WET", "HUMID-ALARM", "WET-ALARM"] {
            assert_eq!(status(s).to_string(), s);
        }
        assert!("DAMP".parse::<Status>().is_err());
    }

    #[test]
    fn short_history_never_alarms() {
        let history = vec![status("HUMID"); 12];
        let result = escalate(status("HUMID"), &history);
        assert!(!result.alarm);
    }

    #[test]
    fn persistent_humidity_raises_alarm() {
        let history = vec![status("HUMID"); 13];
        let result = escalate(status("HUMID"), &history);
        assert!(result.alarm);
        assert_eq!(result.to_string(), "HUMID-ALARM");
    }

    #[test]
    fn recent_alarm_suppresses_refire() {
        let mut history = vec![status("HUMID"); 12];
        history.push(status("HUMID-ALARM"));
        let result = escalate(status("HUMID"), &history);
        assert!(!result.alarm);
    }

    #[test]
    fn ok_reading_never_alarms() {
        let history = vec![status("WET"); 20];
        let result = escalate(status("OK"), &history);
        assert!(!result.alarm);
    }
}
