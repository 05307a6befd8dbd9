//! AAG CloudWatcher-style weather sensor on a serial line.
//!
//! The device answers every command with one or more fixed 15-byte blocks:
//! a 3-character tag (`!` plus two tag characters) followed by a 12-character
//! payload, terminated by a handshake block (`!`, 0x11, twelve spaces, `0`).
//! A mangled handshake or an unexpected tag is treated as "no data" for that
//! field, not as a hard failure; the device recovers on the next poll.

use std::io::{Read, Write};
use std::sync::LazyLock;
use std::time::Duration;

use log::debug;
use regex::Regex;
use serialport::{ClearBuffer, SerialPort};

use super::SensorError;
use crate::stats::{ClipConfig, Summary, summarize};

const BAUD: u32 = 9600;
const TIMEOUT: Duration = Duration::from_secs(2);
const BLOCK_LEN: usize = 15;

static BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(![\s\w]{2})([\s\w]{12})$").unwrap());
static HANDSHAKE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^!\x11\s{12}0$").unwrap());

/// Rain sensor thermistor constants (pull-up in kOhm, beta, R at 25 C).
const RAIN_PULLUP: f64 = 1.0;
const RAIN_R_AT_25: f64 = 1.0;
const RAIN_BETA: f64 = 3450.0;
const ABS_ZERO: f64 = 273.15;

/// LDR pull-up resistor in kOhm.
const LDR_PULLUP: f64 = 56.0;

/// Zener reference voltage.
const ZENER_CONSTANT: f64 = 3.0;

/// One parsed response block: 3-character tag, 12-character payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub tag: String,
    pub payload: String,
}

impl Block {
    fn value(&self) -> Option<f64> {
        self.payload.trim().parse().ok()
    }
}

/// Analog channels returned by the `C!` command.
#[derive(Clone, Copy, Debug, Default)]
pub struct Electrics {
    pub voltage: Option<f64>,
    pub ldr_kohm: Option<f64>,
    pub rain_temp_c: Option<f64>,
}

/// Sigma-clipped summaries over one polling cycle, plus the one-shot fields.
#[derive(Debug, Default)]
pub struct CloudReport {
    pub sky_temp_c: Option<Summary>,
    pub ambient_temp_c: Option<Summary>,
    pub voltage: Option<Summary>,
    pub ldr_kohm: Option<Summary>,
    pub rain_temp_c: Option<Summary>,
    pub pwm_pct: Option<f64>,
    pub errors: [Option<u32>; 4],
    pub safe: Option<bool>,
}

pub struct CloudSensor {
    port: Box<dyn SerialPort>,
}

impl CloudSensor {
    pub fn open(path: &str) -> Result<Self, SensorError> {
        let port = serialport::new(path, BAUD).timeout(TIMEOUT).open()?;
        Ok(Self { port })
    }

    /// Send one command and read back `blocks` response blocks plus the
    /// handshake. `Ok(None)` when the response is short or does not match
    /// the wire format; the device recovers by the next command, so only
    /// hard port failures surface as errors.
    fn transact(&mut self, command: &str, blocks: usize) -> Result<Option<Vec<Block>>, SensorError> {
        if self.port.bytes_to_read()? > 0 {
            debug!("clearing stale bytes from cloud sensor input buffer");
            self.port.clear(ClearBuffer::Input)?;
        }
        self.port.write_all(command.as_bytes()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                SensorError::Timeout
            } else {
                SensorError::Io(e)
            }
        })?;

        let Some(buf) = read_response(&mut self.port, (blocks + 1) * BLOCK_LEN)? else {
            debug!("cloud sensor response to {command:?} was short or absent");
            return Ok(None);
        };
        let text = String::from_utf8_lossy(&buf).into_owned();

        let parsed = parse_response(&text, blocks);
        if parsed.is_none() {
            debug!("cloud sensor response to {command:?} did not match: {text:?}");
        }
        Ok(parsed)
    }

    /// Ambient air temperature in C (`T!`, tag `!2`, centidegrees).
    pub fn ambient_temperature(&mut self) -> Result<Option<f64>, SensorError> {
        Ok(self
            .transact("T!", 1)?
            .and_then(|blocks| tagged_value(&blocks, 0, "!2"))
            .map(|v| v / 100.0))
    }

    /// Sky (IR) temperature in C (`S!`, tag `!1`, centidegrees).
    pub fn sky_temperature(&mut self) -> Result<Option<f64>, SensorError> {
        Ok(self
            .transact("S!", 1)?
            .and_then(|blocks| tagged_value(&blocks, 0, "!1"))
            .map(|v| v / 100.0))
    }

    /// Zener voltage, LDR resistance, and rain sensor temperature (`C!`).
    pub fn electrics(&mut self) -> Result<Electrics, SensorError> {
        let Some(blocks) = self.transact("C!", 3)? else {
            return Ok(Electrics::default());
        };
        Ok(Electrics {
            voltage: tagged_value(&blocks, 0, "!6").map(zener_voltage),
            ldr_kohm: tagged_value(&blocks, 1, "!4").map(ldr_resistance),
            rain_temp_c: tagged_value(&blocks, 2, "!5").map(rain_thermistor_c),
        })
    }

    /// Heater PWM duty cycle in percent (`Q!`, tag `!Q`).
    pub fn pwm_duty(&mut self) -> Result<Option<f64>, SensorError> {
        Ok(self
            .transact("Q!", 1)?
            .and_then(|blocks| tagged_value(&blocks, 0, "!Q"))
            .map(|v| v * 100.0 / 1023.0))
    }

    /// Internal error counters (`D!`, tags `!E1`..`!E4`).
    pub fn error_counters(&mut self) -> Result<[Option<u32>; 4], SensorError> {
        let mut counters = [None; 4];
        if let Some(blocks) = self.transact("D!", 4)? {
            for (i, counter) in counters.iter_mut().enumerate() {
                *counter = tagged_value(&blocks, i, &format!("!E{}", i + 1)).map(|v| v as u32);
            }
        }
        Ok(counters)
    }

    /// Rain switch state (`F!`): `!X` safe, `!Y` unsafe.
    pub fn safe_switch(&mut self) -> Result<Option<bool>, SensorError> {
        Ok(self.transact("F!", 1)?.and_then(|blocks| {
            let tag = &blocks[0].tag;
            if tag.starts_with("!X") {
                Some(true)
            } else if tag.starts_with("!Y") {
                Some(false)
            } else {
                None
            }
        }))
    }

    /// Poll every channel `samples` times and reduce the analog channels
    /// with the sigma-clipped aggregator.
    pub fn query_all(&mut self, samples: usize, cfg: &ClipConfig) -> Result<CloudReport, SensorError> {
        let mut sky = Vec::with_capacity(samples);
        let mut ambient = Vec::with_capacity(samples);
        let mut voltage = Vec::with_capacity(samples);
        let mut ldr = Vec::with_capacity(samples);
        let mut rain = Vec::with_capacity(samples);

        for _ in 0..samples {
            sky.push(self.sky_temperature()?);
            ambient.push(self.ambient_temperature()?);
            let electrics = self.electrics()?;
            voltage.push(electrics.voltage);
            ldr.push(electrics.ldr_kohm);
            rain.push(electrics.rain_temp_c);
        }

        Ok(CloudReport {
            sky_temp_c: summarize(&sky, cfg),
            ambient_temp_c: summarize(&ambient, cfg),
            voltage: summarize(&voltage, cfg),
            ldr_kohm: summarize(&ldr, cfg),
            rain_temp_c: summarize(&rain, cfg),
            pwm_pct: self.pwm_duty()?,
            errors: self.error_counters()?,
            safe: self.safe_switch()?,
        })
    }
}

/// Read up to `len` bytes, stopping at the port timeout or EOF. A short
/// response is `Ok(None)` ("no data" for this poll), matching the timed
/// read semantics the device protocol assumes; only hard I/O failures are
/// errors.
fn read_response(port: &mut dyn Read, len: usize) -> Result<Option<Vec<u8>>, SensorError> {
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match port.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock =>
            {
                break;
            }
            Err(e) => return Err(SensorError::Io(e)),
        }
    }
    if filled < len {
        return Ok(None);
    }
    Ok(Some(buf))
}

/// Split a raw response into blocks, checking the trailing handshake.
fn parse_response(text: &str, blocks: usize) -> Option<Vec<Block>> {
    // Line noise can decode to multi-byte replacement characters; the
    // fixed-offset slicing below assumes one byte per character.
    if !text.is_ascii() || text.len() != (blocks + 1) * BLOCK_LEN {
        return None;
    }
    let (body, handshake) = text.split_at(blocks * BLOCK_LEN);
    if !HANDSHAKE_RE.is_match(handshake) {
        return None;
    }
    let mut parsed = Vec::with_capacity(blocks);
    for chunk_start in (0..body.len()).step_by(BLOCK_LEN) {
        let chunk = &body[chunk_start..chunk_start + BLOCK_LEN];
        let caps = BLOCK_RE.captures(chunk)?;
        parsed.push(Block {
            tag: caps[1].to_string(),
            payload: caps[2].to_string(),
        });
    }
    Some(parsed)
}

/// Numeric payload of `blocks[index]` if its tag carries the expected prefix.
fn tagged_value(blocks: &[Block], index: usize, tag: &str) -> Option<f64> {
    let block = blocks.get(index)?;
    if block.tag.starts_with(tag) {
        block.value()
    } else {
        None
    }
}

/// Restrict a raw ADU to the usable part of the 10-bit range.
fn clamp_adu(raw: f64) -> f64 {
    raw.clamp(1.0, 1022.0)
}

fn zener_voltage(raw: f64) -> f64 {
    1023.0 * ZENER_CONSTANT / raw
}

fn ldr_resistance(raw: f64) -> f64 {
    let raw = clamp_adu(raw);
    LDR_PULLUP / (1023.0 / raw - 1.0)
}

fn rain_thermistor_c(raw: f64) -> f64 {
    let raw = clamp_adu(raw);
    let r = RAIN_PULLUP / (1023.0 / raw - 1.0);
    let r = (r / RAIN_R_AT_25).ln();
    1.0 / (r / RAIN_BETA + 1.0 / (ABS_ZERO + 25.0)) - ABS_ZERO
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(tag: &str, payload: &str) -> String {
        format!("{tag:<3}{payload:>12}")
    }

    fn handshake() -> String {
        format!("!\x11{:12}0", "")
    }

    #[test]
    fn single_block_response_parses() {
        let text = format!("{}{}", block("!2", "2050"), handshake());
        let blocks = parse_response(&text, 1).unwrap();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].tag.starts_with("!2"));
        assert_eq!(tagged_value(&blocks, 0, "!2"), Some(2050.0));
    }

    #[test]
    fn three_block_response_parses_in_order() {
        let text = format!(
            "{}{}{}{}",
            block("!6", "250"),
            block("!4", "700"),
            block("!5", "512"),
            handshake()
        );
        let blocks = parse_response(&text, 3).unwrap();
        assert_eq!(tagged_value(&blocks, 0, "!6"), Some(250.0));
        assert_eq!(tagged_value(&blocks, 1, "!4"), Some(700.0));
        assert_eq!(tagged_value(&blocks, 2, "!5"), Some(512.0));
    }

    #[test]
    fn bad_handshake_is_rejected() {
        let text = format!("{}{}", block("!2", "2050"), block("!2", "2050"));
        assert!(parse_response(&text, 1).is_none());
    }

    #[test]
    fn truncated_response_is_rejected() {
        let text = format!("{}{}", block("!2", "2050"), handshake());
        assert!(parse_response(&text[..20], 1).is_none());
    }

    #[test]
    fn unexpected_tag_yields_no_data() {
        let text = format!("{}{}", block("!9", "2050"), handshake());
        let blocks = parse_response(&text, 1).unwrap();
        assert_eq!(tagged_value(&blocks, 0, "!2"), None);
    }

    /// Reader that yields some bytes, then times out like a serial port.
    struct StallingReader {
        data: std::io::Cursor<Vec<u8>>,
    }

    impl Read for StallingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.read(buf)? {
                0 => Err(std::io::Error::from(std::io::ErrorKind::TimedOut)),
                n => Ok(n),
            }
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
        }
    }

    #[test]
    fn full_response_is_read_back() {
        let text = format!("{}{}", block("!2", "2050"), handshake());
        let mut port = std::io::Cursor::new(text.clone().into_bytes());
        let buf = read_response(&mut port, 30).unwrap().unwrap();
        assert_eq!(buf, text.as_bytes());
    }

    #[test]
    fn short_response_is_no_data_not_an_error() {
        // 14 of 15 expected bytes, then EOF.
        let mut port = std::io::Cursor::new(vec![b'!'; 14]);
        assert!(read_response(&mut port, 15).unwrap().is_none());
    }

    #[test]
    fn timeout_mid_response_is_no_data_not_an_error() {
        let mut port = StallingReader {
            data: std::io::Cursor::new(vec![b'!'; 14]),
        };
        assert!(read_response(&mut port, 15).unwrap().is_none());
    }

    #[test]
    fn hard_io_failure_is_still_an_error() {
        assert!(read_response(&mut BrokenReader, 15).is_err());
    }

    #[test]
    fn ldr_conversion_matches_divider_math() {
        // Mid-scale: 1023/512 - 1 ~ 0.998, so R ~ pull-up.
        let r = ldr_resistance(512.0);
        assert!((r - 56.109).abs() < 0.01, "got {r}");
        // Clamping keeps the extremes finite.
        assert!(ldr_resistance(0.0).is_finite());
        assert!(ldr_resistance(1023.0).is_finite());
    }

    #[test]
    fn rain_thermistor_at_mid_scale_is_25c() {
        // raw 511.5 gives R = R_25, which is 25 C by definition.
        let t = rain_thermistor_c(511.5);
        assert!((t - 25.0).abs() < 0.01, "got {t}");
    }

    #[test]
    fn zener_voltage_at_full_scale() {
        assert!((zener_voltage(1023.0) - 3.0).abs() < 1e-9);
    }
}
