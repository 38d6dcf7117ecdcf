//! Weight acquisition: draw raw load-cell readings, reject invalid reads and
//! outliers, and summarise the batch.
//!
//! Two strategies are offered:
//! - **median**: center = median of the valid readings, spread = sample standard deviation
//! - **iqr**: readings outside [Q1 − 1.5·IQR, Q3 + 1.5·IQR] are dropped and the
//!   center is the mean of the rest
//!
//! Quartiles are taken at integer-floor positions (`len/4`, `3·len/4`) of the
//! sorted batch, without interpolation.

use crate::calibration::CalibrationState;
use crate::error::AcquisitionError;
use crate::hw_error::map_sensor_error;
use station_traits::LoadCell;

/// Hard cap on read attempts for one acquisition, valid or not.
pub const DEFAULT_MAX_ATTEMPTS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterStrategy {
    #[default]
    Median,
    Iqr,
}

/// Statistical summary of one batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub center: f64,
    pub stddev: f64,
    /// Samples that contributed to `center`.
    pub kept: usize,
    /// Valid samples drawn.
    pub total: usize,
}

/// Result of one weight measurement with calibration applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightEstimate {
    /// Filtered center in raw counts, before tare.
    pub raw: f64,
    /// `raw − tare`.
    pub tared: f64,
    /// `tared · scale`.
    pub grams: f64,
    /// Spread of the contributing samples, raw counts.
    pub stddev: f64,
    pub samples: usize,
}

/// Draw up to `n` valid readings, giving up after `max_attempts` reads.
///
/// Invalid reads are discarded. Fewer than `n` readings is fine as long as
/// at least one was valid.
pub fn collect_valid<L>(
    source: &mut L,
    n: usize,
    max_attempts: usize,
) -> Result<Vec<f64>, AcquisitionError>
where
    L: LoadCell + ?Sized,
{
    let mut samples = Vec::with_capacity(n);
    let mut attempts = 0usize;
    let mut invalid = 0usize;
    while samples.len() < n && attempts < max_attempts {
        attempts += 1;
        match source.read_one() {
            Ok(raw) => samples.push(f64::from(raw)),
            Err(e) => {
                invalid += 1;
                let kind = map_sensor_error(&*e);
                tracing::trace!(attempt = attempts, error = %kind, "discarding invalid reading");
            }
        }
    }
    if samples.is_empty() {
        tracing::warn!(attempts, "no valid load-cell reading");
        return Err(AcquisitionError::NoData { attempts });
    }
    if samples.len() < n {
        tracing::warn!(
            wanted = n,
            got = samples.len(),
            attempts,
            "attempt cap reached before collecting all samples"
        );
    }
    tracing::debug!(valid = samples.len(), invalid, attempts, "samples collected");
    Ok(samples)
}

fn sorted(samples: &[f64]) -> Vec<f64> {
    let mut v = samples.to_vec();
    v.sort_by(f64::total_cmp);
    v
}

/// Median with the even/odd rule. `None` for an empty slice.
pub fn median(samples: &[f64]) -> Option<f64> {
    if samples.is_empty() {
        return None;
    }
    let v = sorted(samples);
    let mid = v.len() / 2;
    Some(if v.len() % 2 == 0 {
        (v[mid - 1] + v[mid]) / 2.0
    } else {
        v[mid]
    })
}

/// Mean anchored on the first sample so that identical inputs come back bit-exact.
pub fn mean(samples: &[f64]) -> Option<f64> {
    let (&first, _) = samples.split_first()?;
    let spread: f64 = samples.iter().map(|x| x - first).sum();
    Some(first + spread / samples.len() as f64)
}

/// Sample standard deviation (n − 1 denominator); 0 for fewer than two samples.
pub fn sample_stddev(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let Some(m) = mean(samples) else {
        return 0.0;
    };
    let ss: f64 = samples.iter().map(|x| (x - m) * (x - m)).sum();
    (ss / (samples.len() - 1) as f64).sqrt()
}

/// Keep the values inside the 1.5·IQR fences, in sorted order.
pub fn iqr_filter(samples: &[f64]) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let v = sorted(samples);
    let len = v.len();
    let q1 = v[len / 4];
    let q3 = v[(3 * len / 4).min(len - 1)];
    let iqr = q3 - q1;
    let lo = q1 - 1.5 * iqr;
    let hi = q3 + 1.5 * iqr;
    v.into_iter().filter(|x| *x >= lo && *x <= hi).collect()
}

pub fn summarize_median(samples: &[f64]) -> Result<Summary, AcquisitionError> {
    let center = median(samples).ok_or(AcquisitionError::NoData { attempts: 0 })?;
    Ok(Summary {
        center,
        stddev: sample_stddev(samples),
        kept: samples.len(),
        total: samples.len(),
    })
}

pub fn summarize_iqr(samples: &[f64]) -> Result<Summary, AcquisitionError> {
    if samples.is_empty() {
        return Err(AcquisitionError::NoData { attempts: 0 });
    }
    let kept = iqr_filter(samples);
    let center = mean(&kept).ok_or(AcquisitionError::EmptyAfterFilter)?;
    Ok(Summary {
        center,
        stddev: sample_stddev(&kept),
        kept: kept.len(),
        total: samples.len(),
    })
}

/// Median and standard deviation over up to `n` valid readings.
pub fn acquire_median<L>(source: &mut L, n: usize) -> Result<Summary, AcquisitionError>
where
    L: LoadCell + ?Sized,
{
    let samples = collect_valid(source, n, DEFAULT_MAX_ATTEMPTS)?;
    summarize_median(&samples)
}

/// Mean of the readings that survive IQR outlier rejection.
pub fn acquire_iqr_filtered<L>(source: &mut L, n: usize) -> Result<Summary, AcquisitionError>
where
    L: LoadCell + ?Sized,
{
    let samples = collect_valid(source, n, DEFAULT_MAX_ATTEMPTS)?;
    summarize_iqr(&samples)
}

/// Configured acquisition: strategy, batch size and attempt cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeightFilter {
    pub strategy: FilterStrategy,
    pub samples: usize,
    pub max_attempts: usize,
}

impl Default for WeightFilter {
    fn default() -> Self {
        Self {
            strategy: FilterStrategy::Median,
            samples: 10,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl WeightFilter {
    /// Same strategy and cap with a different batch size (e.g. for taring).
    pub fn with_samples(self, samples: usize) -> Self {
        Self { samples, ..self }
    }

    /// Filtered center and spread in raw counts.
    pub fn acquire<L>(&self, source: &mut L) -> Result<Summary, AcquisitionError>
    where
        L: LoadCell + ?Sized,
    {
        let n = self.samples.max(1);
        let samples = collect_valid(source, n, self.max_attempts)?;
        if n == 1 {
            return Ok(Summary {
                center: samples[0],
                stddev: 0.0,
                kept: 1,
                total: 1,
            });
        }
        match self.strategy {
            FilterStrategy::Median => summarize_median(&samples),
            FilterStrategy::Iqr => summarize_iqr(&samples),
        }
    }

    /// Acquire and apply calibration.
    pub fn measure<L>(
        &self,
        source: &mut L,
        calibration: &CalibrationState,
    ) -> Result<WeightEstimate, AcquisitionError>
    where
        L: LoadCell + ?Sized,
    {
        let s = self.acquire(source)?;
        let estimate = WeightEstimate {
            raw: s.center,
            tared: calibration.tared(s.center),
            grams: calibration.to_grams(s.center),
            stddev: s.stddev,
            samples: s.kept,
        };
        tracing::debug!(
            strategy = ?self.strategy,
            raw = estimate.raw,
            tared = estimate.tared,
            grams = estimate.grams,
            stddev = estimate.stddev,
            kept = s.kept,
            total = s.total,
            "weight measured"
        );
        Ok(estimate)
    }
}
