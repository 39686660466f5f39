//! Coarsening the time axis by averaging consecutive samples.
//!
//! Groups of `ntimes` consecutive time samples collapse into one: the binned
//! flux is the inverse-variance-weighted mean of the acceptable samples in
//! the group, the binned uncertainty shrinks accordingly
//! (sigma = 1 / sqrt(sum 1/sigma_i^2)), the binned `ok` is the in-group mean,
//! and the binned time is the in-group mean time. A trailing partial group is
//! kept as a smaller bin.
//!
//! Samples with `ok` below the acceptance threshold (or NaN flux) carry no
//! weight; a group with no acceptable samples at all yields NaN flux and
//! uncertainty. When any acceptable sample lacks a usable uncertainty, the
//! group falls back to an unweighted mean and its binned uncertainty is NaN.

use ndarray::{Array1, Array2};

use crate::history::HistoryEntry;
use crate::rainbow::Rainbow;

impl Rainbow {
    /// Return a copy with the time axis coarsened by a factor of `ntimes`.
    ///
    /// `minimum_acceptable_ok` is the smallest `ok` weight still included in
    /// an average (1 keeps only perfect data, 1e-10 keeps everything but
    /// terrible data, 0 keeps all of it). The model, when present, is binned
    /// with the same weights as the flux. Records history.
    pub fn bin_in_time(&self, ntimes: usize, minimum_acceptable_ok: f64) -> Rainbow {
        let ntimes = ntimes.max(1);
        let (nwave, ntime) = self.shape();
        let nbins = ntime.div_ceil(ntimes);

        let mut time = Array1::zeros(nbins);
        let mut flux = Array2::from_elem((nwave, nbins), f64::NAN);
        let mut uncertainty = Array2::from_elem((nwave, nbins), f64::NAN);
        let mut ok = Array2::zeros((nwave, nbins));
        let mut model = self
            .model
            .as_ref()
            .map(|_| Array2::from_elem((nwave, nbins), f64::NAN));

        for b in 0..nbins {
            let start = b * ntimes;
            let end = ((b + 1) * ntimes).min(ntime);
            let span = (end - start) as f64;
            time[b] = self.time.iter().skip(start).take(end - start).sum::<f64>() / span;

            for i in 0..nwave {
                let mut ok_sum = 0.0;
                let mut members: Vec<usize> = Vec::new();
                for j in start..end {
                    ok_sum += self.ok[[i, j]];
                    if self.ok[[i, j]] >= minimum_acceptable_ok && !self.flux[[i, j]].is_nan() {
                        members.push(j);
                    }
                }
                ok[[i, b]] = ok_sum / span;
                if members.is_empty() {
                    continue;
                }

                let weighted = members.iter().all(|&j| {
                    let sigma = self.uncertainty[[i, j]];
                    sigma.is_finite() && sigma > 0.0
                });
                let weights: Vec<f64> = members
                    .iter()
                    .map(|&j| {
                        if weighted {
                            let sigma = self.uncertainty[[i, j]];
                            1.0 / (sigma * sigma)
                        } else {
                            1.0
                        }
                    })
                    .collect();
                let weight_sum: f64 = weights.iter().sum();

                flux[[i, b]] = members
                    .iter()
                    .zip(&weights)
                    .map(|(&j, &w)| w * self.flux[[i, j]])
                    .sum::<f64>()
                    / weight_sum;
                if weighted {
                    uncertainty[[i, b]] = (1.0 / weight_sum).sqrt();
                }
                if let (Some(source), Some(binned)) = (self.model.as_ref(), model.as_mut()) {
                    binned[[i, b]] = members
                        .iter()
                        .zip(&weights)
                        .map(|(&j, &w)| w * source[[i, j]])
                        .sum::<f64>()
                        / weight_sum;
                }
            }
        }

        let mut new = Rainbow {
            wavelength: self.wavelength.clone(),
            time,
            flux,
            uncertainty,
            ok,
            model,
            metadata: self.metadata.clone(),
            history: self.history.clone(),
        };
        new.push_history(HistoryEntry::BinInTime {
            ntimes,
            minimum_acceptable_ok,
        });
        new
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn rainbow(flux: Array2<f64>, sigma: f64) -> Rainbow {
        let (nwave, ntime) = flux.dim();
        Rainbow::new(
            Array1::linspace(1.0, nwave as f64, nwave),
            Array1::linspace(0.0, (ntime - 1) as f64, ntime),
            flux,
            Array2::from_elem((nwave, ntime), sigma),
            Array2::ones((nwave, ntime)),
        )
        .unwrap()
    }

    #[test]
    fn test_bin_counts_keep_the_trailing_partial_group() {
        let binned = rainbow(Array2::ones((2, 10)), 0.1).bin_in_time(3, 1e-10);
        assert_eq!(binned.shape(), (2, 4));
        assert!((binned.time()[0] - 1.0).abs() < 1e-12);
        assert!((binned.time()[3] - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_equal_sigma_binning_is_a_plain_mean() {
        let binned = rainbow(array![[1.0, 2.0, 3.0, 4.0]], 0.2).bin_in_time(2, 1e-10);
        assert!((binned.flux()[[0, 0]] - 1.5).abs() < 1e-12);
        assert!((binned.flux()[[0, 1]] - 3.5).abs() < 1e-12);
        let expected_sigma = 0.2 / 2.0f64.sqrt();
        for sigma in binned.uncertainty() {
            assert!((sigma - expected_sigma).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unequal_sigmas_weight_by_inverse_variance() {
        let mut source = rainbow(array![[1.0, 2.0]], 0.1);
        source.uncertainty[[0, 1]] = 0.3;
        let binned = source.bin_in_time(2, 1e-10);
        // weights 100 and 1/0.09: mean = (100 * 1 + 11.111 * 2) / 111.111
        assert!((binned.flux()[[0, 0]] - 1.1).abs() < 1e-6);
        let expected_sigma = (1.0_f64 / (100.0 + 1.0 / 0.09)).sqrt();
        assert!((binned.uncertainty()[[0, 0]] - expected_sigma).abs() < 1e-12);
    }

    #[test]
    fn test_flagged_samples_carry_no_weight() {
        let mut source = rainbow(array![[1.0, 100.0, 3.0, 5.0]], 0.1);
        source.ok[[0, 1]] = 0.0;
        let binned = source.bin_in_time(2, 1e-10);
        assert!((binned.flux()[[0, 0]] - 1.0).abs() < 1e-12);
        assert!((binned.ok()[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((binned.flux()[[0, 1]] - 4.0).abs() < 1e-12);
        assert!((binned.ok()[[0, 1]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fully_flagged_group_yields_nan() {
        let mut source = rainbow(array![[1.0, 2.0, 3.0, 4.0]], 0.1);
        source.ok[[0, 0]] = 0.0;
        source.ok[[0, 1]] = 0.0;
        let binned = source.bin_in_time(2, 1e-10);
        assert!(binned.flux()[[0, 0]].is_nan());
        assert!(binned.uncertainty()[[0, 0]].is_nan());
        assert_eq!(binned.ok()[[0, 0]], 0.0);
    }

    #[test]
    fn test_model_is_binned_with_the_flux_weights() {
        let source = rainbow(array![[2.0, 4.0]], 0.1)
            .attach_model(array![[1.0, 3.0]])
            .unwrap();
        let binned = source.bin_in_time(2, 1e-10);
        assert!((binned.model().unwrap()[[0, 0]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_binning_appends_history_and_leaves_source_alone() {
        let source = rainbow(Array2::ones((1, 6)), 0.1);
        let binned = source.bin_in_time(2, 1e-10);
        assert_eq!(
            binned.history().last(),
            Some(&HistoryEntry::BinInTime {
                ntimes: 2,
                minimum_acceptable_ok: 1e-10,
            })
        );
        assert!(source.history().is_empty());
        assert_eq!(source.shape(), (1, 6));
    }
}
