//! NaN-aware statistics over sample slices.
//!
//! All reductions in this crate funnel through these helpers so that invalid
//! samples (NaN) are handled one way everywhere: they are ignored, and a slice
//! with no finite samples reduces to NaN rather than panicking.

/// Conversion from a median absolute deviation to an equivalent Gaussian
/// standard deviation (1 / Phi^-1(3/4)).
const MAD_TO_SIGMA: f64 = 1.4826;

// ---------------------------------------------------------------------------
// Percentiles and medians
// ---------------------------------------------------------------------------

/// Percentile of the non-NaN values in `values`, with linear interpolation
/// between adjacent order statistics.
///
/// `percentile` is expressed in 0–100. Returns NaN when no value is finite.
pub fn nanpercentile(values: &[f64], percentile: f64) -> f64 {
    let mut kept: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if kept.is_empty() {
        return f64::NAN;
    }
    kept.sort_by(f64::total_cmp);

    let q = (percentile / 100.0).clamp(0.0, 1.0);
    let position = q * (kept.len() - 1) as f64;
    let below = position.floor() as usize;
    let above = position.ceil() as usize;
    if below == above {
        kept[below]
    } else {
        let fraction = position - below as f64;
        kept[below] + fraction * (kept[above] - kept[below])
    }
}

/// Median of the non-NaN values. NaN when no value is finite.
pub fn nanmedian(values: &[f64]) -> f64 {
    nanpercentile(values, 50.0)
}

// ---------------------------------------------------------------------------
// Scatter estimators
// ---------------------------------------------------------------------------

/// Population standard deviation of the non-NaN values.
/// NaN when no value is finite.
pub fn nanstd(values: &[f64]) -> f64 {
    let kept: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if kept.is_empty() {
        return f64::NAN;
    }
    let n = kept.len() as f64;
    let mean = kept.iter().sum::<f64>() / n;
    let variance = kept.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Robust scatter estimate: the median absolute deviation from the median,
/// scaled to match a Gaussian standard deviation.
///
/// MAD has a 50% breakdown point, so it stays a reliable scale estimate even
/// when a large fraction of the samples are outliers.
pub fn mad_scatter(values: &[f64]) -> f64 {
    let center = nanmedian(values);
    if center.is_nan() {
        return f64::NAN;
    }
    let deviations: Vec<f64> = values
        .iter()
        .filter(|v| !v.is_nan())
        .map(|v| (v - center).abs())
        .collect();
    MAD_TO_SIGMA * nanmedian(&deviations)
}

// ---------------------------------------------------------------------------
// Differences
// ---------------------------------------------------------------------------

/// Numerical gradient of a uniformly sampled series: second-order central
/// differences in the interior, one-sided differences at the edges.
///
/// A single-element series has zero gradient; an empty one stays empty.
pub fn gradient(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    match n {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => {
            let mut out = vec![0.0; n];
            out[0] = values[1] - values[0];
            out[n - 1] = values[n - 1] - values[n - 2];
            for i in 1..n - 1 {
                out[i] = (values[i + 1] - values[i - 1]) / 2.0;
            }
            out
        }
    }
}

/// Median spacing between consecutive samples. NaN for fewer than two samples.
pub fn median_spacing(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let spacings: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    nanmedian(&spacings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nanpercentile_interpolates() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(nanpercentile(&values, 0.0), 1.0);
        assert_eq!(nanpercentile(&values, 100.0), 4.0);
        assert_eq!(nanpercentile(&values, 50.0), 2.5);
        assert_eq!(nanpercentile(&values, 25.0), 1.75);
    }

    #[test]
    fn test_nanpercentile_ignores_nan() {
        let values = [f64::NAN, 3.0, 1.0, f64::NAN, 2.0];
        assert_eq!(nanpercentile(&values, 50.0), 2.0);
    }

    #[test]
    fn test_nanpercentile_all_nan_is_nan() {
        assert!(nanpercentile(&[f64::NAN, f64::NAN], 50.0).is_nan());
        assert!(nanpercentile(&[], 50.0).is_nan());
    }

    #[test]
    fn test_nanmedian_even_count() {
        assert_eq!(nanmedian(&[4.0, 1.0, 3.0, 2.0]), 2.5);
    }

    #[test]
    fn test_nanstd_known_value() {
        // Population std of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2.
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((nanstd(&values) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mad_scatter_resists_outliers() {
        let clean = [1.0, 1.1, 0.9, 1.05, 0.95, 1.0, 1.02];
        let with_outlier = [1.0, 1.1, 0.9, 1.05, 0.95, 1.0, 1000.0];
        let clean_mad = mad_scatter(&clean);
        let outlier_mad = mad_scatter(&with_outlier);
        assert!(outlier_mad < 10.0 * clean_mad.max(1e-3));
        assert!(nanstd(&with_outlier) > 100.0);
    }

    #[test]
    fn test_mad_scatter_of_constant_is_zero() {
        assert_eq!(mad_scatter(&[5.0, 5.0, 5.0]), 0.0);
    }

    #[test]
    fn test_gradient_of_linear_series_is_slope() {
        let values = [1.0, 3.0, 5.0, 7.0];
        for g in gradient(&values) {
            assert!((g - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_gradient_edge_cases() {
        assert!(gradient(&[]).is_empty());
        assert_eq!(gradient(&[3.0]), vec![0.0]);
        assert_eq!(gradient(&[1.0, 4.0]), vec![3.0, 3.0]);
    }

    #[test]
    fn test_median_spacing_uniform() {
        let times = [0.0, 0.5, 1.0, 1.5];
        assert!((median_spacing(&times) - 0.5).abs() < 1e-12);
        assert!(median_spacing(&[1.0]).is_nan());
    }
}
