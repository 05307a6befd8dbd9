//! Raspberry Pi home monitoring: sensor drivers, humidity conversions,
//! robust sample aggregation, daily log tables, relay control, and cloud
//! telemetry.
//!
//! Each binary under `src/bin/` is one cron-invoked tool built from these
//! pieces: `read_temp`, `shedmon`, `kegerator`, `cloudlog`, and `humidity`.

pub mod humidity;
pub mod relay;
pub mod sensor;
pub mod stats;
pub mod status;
pub mod table;
pub mod telemetry;
