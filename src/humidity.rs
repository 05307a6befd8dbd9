//! Psychrometric conversions between relative humidity, dew point, and
//! absolute humidity.
//!
//! The dew point formulas follow the Vaisala humidity conversion application
//! note (B210973EN); the relative-to-absolute shortcut uses the Magnus-style
//! approximation. Round-tripping RH -> AH -> RH across the two formula
//! families is not exactly invertible; the small disagreement is inherent to
//! the approximations, not an implementation error.

/// Water vapor constant C, in g*K/J.
const VAPOR_C: f64 = 2.16679;

/// Saturation vapor pressure constant set, selected by phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VaporPhase {
    /// Over liquid water, valid -20..50 C.
    Water,
    /// Over ice, valid -70..0 C.
    Ice,
}

impl VaporPhase {
    /// (A, m, Tn) for the `Pws = A * 10^(m*T/(T+Tn))` fit.
    fn constants(self) -> (f64, f64, f64) {
        match self {
            VaporPhase::Water => (6.116441, 7.591386, 240.7263),
            VaporPhase::Ice => (6.114742, 9.778707, 273.1466),
        }
    }
}

/// Relative and absolute humidity derived from one dew point measurement.
#[derive(Clone, Copy, Debug)]
pub struct HumidityReport {
    pub relative_pct: f64,
    pub absolute_g_m3: f64,
}

/// Convert relative humidity to absolute humidity in g/m^3.
///
/// Accuracy is about 0.1% for temperatures between -30 and 35 C; values
/// outside that range are accepted and produce a numerically defined but
/// less accurate result.
pub fn relative_to_absolute(temp_c: f64, rh_pct: f64) -> f64 {
    (6.112 * ((17.67 * temp_c) / (temp_c + 243.5)).exp() * 2.1674 * rh_pct) / (273.15 + temp_c)
}

/// Derive relative and absolute humidity from air temperature and dew point.
///
/// A dew point above the air temperature is physically impossible, so the
/// relative humidity is clamped at 100% rather than reported above it.
pub fn from_dew_point(temp_c: f64, dew_point_c: f64, phase: VaporPhase) -> HumidityReport {
    let (a, m, tn) = phase.constants();

    let mut rh = 10f64.powf(m * (dew_point_c / (dew_point_c + tn) - temp_c / (temp_c + tn)));
    if temp_c < dew_point_c {
        rh = 1.0;
    }

    let pws = a * 10f64.powf(m * temp_c / (temp_c + tn)) * 100.0; // Pa
    let pw = pws * rh;
    let ah = VAPOR_C * pw / (temp_c + 273.16);

    HumidityReport {
        relative_pct: rh * 100.0,
        absolute_g_m3: ah,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_point_20c_50pct() {
        let ah = relative_to_absolute(20.0, 50.0);
        // 8.65 g/m^3 within 0.5% of the reference implementation.
        assert!((ah - 8.65).abs() / 8.65 < 0.005, "got {ah}");
    }

    #[test]
    fn dew_point_at_air_temperature_is_saturation() {
        for t in [-15.0, 0.0, 12.5, 30.0] {
            let report = from_dew_point(t, t, VaporPhase::Water);
            assert!((report.relative_pct - 100.0).abs() < 1e-9, "T={t}");
        }
    }

    #[test]
    fn dew_point_above_air_temperature_clamps() {
        let report = from_dew_point(20.0, 25.0, VaporPhase::Water);
        assert!((report.relative_pct - 100.0).abs() < 1e-9);
    }

    #[test]
    fn colder_dew_point_means_drier_air() {
        let dry = from_dew_point(20.0, 0.0, VaporPhase::Water);
        let damp = from_dew_point(20.0, 15.0, VaporPhase::Water);
        assert!(dry.relative_pct < damp.relative_pct);
        assert!(dry.absolute_g_m3 < damp.absolute_g_m3);
        assert!(damp.relative_pct < 100.0);
    }

    #[test]
    fn ice_phase_saturation_below_freezing() {
        let report = from_dew_point(-10.0, -10.0, VaporPhase::Ice);
        assert!((report.relative_pct - 100.0).abs() < 1e-9);
        assert!(report.absolute_g_m3 > 0.0);
    }

    #[test]
    fn dew_point_saturation_roughly_matches_magnus_formula() {
        // The two formula families agree within a few percent at saturation.
        let report = from_dew_point(20.0, 20.0, VaporPhase::Water);
        let magnus = relative_to_absolute(20.0, 100.0);
        assert!((report.absolute_g_m3 - magnus).abs() / magnus < 0.05);
    }
}
