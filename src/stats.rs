//! Robust summaries of small batches of noisy sensor readings.
//!
//! Sensors on a long cable produce the occasional wild value; repeated reads
//! plus iterative sigma clipping around the median give a usable mean.

/// Sigma-clipping parameters.
#[derive(Clone, Copy, Debug)]
pub struct ClipConfig {
    /// Half-width of the retained band, in standard deviations.
    pub sigma: f64,
    /// Number of clipping passes.
    pub iterations: u32,
}

impl Default for ClipConfig {
    fn default() -> Self {
        Self {
            sigma: 2.0,
            iterations: 2,
        }
    }
}

/// Robust summary of one sample set after clipping.
#[derive(Clone, Copy, Debug)]
pub struct Summary {
    pub mean: f64,
    pub stddev: f64,
    pub count: usize,
}

/// Median of a slice. `None` for an empty slice.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    }
}

/// Population standard deviation about the arithmetic mean.
fn stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Iteratively remove outliers from a batch of optional readings.
///
/// Missing entries are dropped up front. Each pass computes the median and
/// standard deviation of the surviving set and keeps only values strictly
/// inside `median +/- sigma*stddev` when the relative spread is
/// non-negligible (`stddev > median/100`); a near-uniform set passes through
/// unchanged. A pass that would empty the set keeps the unclipped set
/// instead, so downstream math never sees an empty sequence.
pub fn sigma_clip(values: &[Option<f64>], cfg: &ClipConfig) -> Vec<f64> {
    let mut kept: Vec<f64> = values
        .iter()
        .filter_map(|v| *v)
        .filter(|v| v.is_finite())
        .collect();

    for _ in 0..cfg.iterations {
        let Some(center) = median(&kept) else {
            break;
        };
        let spread = stddev(&kept);
        if spread <= center / 100.0 {
            continue;
        }
        let lo = center - cfg.sigma * spread;
        let hi = center + cfg.sigma * spread;
        let clipped: Vec<f64> = kept.iter().copied().filter(|v| *v > lo && *v < hi).collect();
        if !clipped.is_empty() {
            kept = clipped;
        }
    }
    kept
}

/// Sigma-clip a batch and report mean, standard deviation, and surviving
/// count. `None` when every entry was missing.
pub fn summarize(values: &[Option<f64>], cfg: &ClipConfig) -> Option<Summary> {
    let kept = sigma_clip(values, cfg);
    if kept.is_empty() {
        return None;
    }
    let mean = kept.iter().sum::<f64>() / kept.len() as f64;
    Some(Summary {
        mean,
        stddev: stddev(&kept),
        count: kept.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn median_of_odd_and_even_sets() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn uniform_set_is_untouched() {
        let cfg = ClipConfig {
            sigma: 2.0,
            iterations: 2,
        };
        let kept = sigma_clip(&some(&[10.0, 10.0, 10.0, 10.0]), &cfg);
        assert_eq!(kept, vec![10.0, 10.0, 10.0, 10.0]);
    }

    #[test]
    fn single_pass_removes_gross_outlier() {
        let cfg = ClipConfig {
            sigma: 2.0,
            iterations: 1,
        };
        let kept = sigma_clip(&some(&[10.0, 10.0, 10.0, 10.0, 1000.0]), &cfg);
        assert_eq!(kept, vec![10.0, 10.0, 10.0, 10.0]);
    }

    #[test]
    fn missing_entries_are_dropped() {
        let cfg = ClipConfig::default();
        let values = vec![Some(10.0), None, Some(11.0), None, Some(10.5)];
        let summary = summarize(&values, &cfg).unwrap();
        assert_eq!(summary.count, 3);
        assert!((summary.mean - 10.5).abs() < 1e-9);
    }

    #[test]
    fn count_never_exceeds_input() {
        let cfg = ClipConfig::default();
        let values = vec![Some(1.0), Some(50.0), Some(51.0), Some(52.0), None];
        let kept = sigma_clip(&values, &cfg);
        assert!(kept.len() <= values.len());
    }

    #[test]
    fn clip_that_would_empty_the_set_is_skipped() {
        // Two values symmetric about the median both fall outside any band
        // narrower than their spread; the pass must keep the unclipped set.
        let cfg = ClipConfig {
            sigma: 0.5,
            iterations: 3,
        };
        let kept = sigma_clip(&some(&[10.0, 30.0]), &cfg);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn all_missing_yields_no_summary() {
        let cfg = ClipConfig::default();
        assert!(summarize(&[None, None], &cfg).is_none());
    }
}
