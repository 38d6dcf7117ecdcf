//! Tare and scale applied to filtered load-cell counts.

/// grams = (raw − tare) · scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationState {
    /// Zero-load reading in raw counts.
    pub tare: f64,
    /// Grams per tared count.
    pub scale: f64,
}

impl Default for CalibrationState {
    fn default() -> Self {
        Self {
            tare: 0.0,
            scale: 1.0,
        }
    }
}

impl CalibrationState {
    pub fn new(tare: f64, scale: f64) -> Self {
        Self { tare, scale }
    }

    #[inline]
    pub fn tared(&self, raw: f64) -> f64 {
        raw - self.tare
    }

    #[inline]
    pub fn to_grams(&self, raw: f64) -> f64 {
        self.tared(raw) * self.scale
    }

    /// Scale that maps `raw` (reference mass on the platform) to `reference_g`.
    ///
    /// Returns `None` when `raw` equals the tare, i.e. nothing was placed on
    /// the platform, or when the result is not finite.
    pub fn scale_from_reference(&self, raw: f64, reference_g: f64) -> Option<f64> {
        let delta = raw - self.tare;
        if delta == 0.0 {
            return None;
        }
        let scale = reference_g / delta;
        scale.is_finite().then_some(scale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_tare_then_scale() {
        let c = CalibrationState::new(1000.0, 0.5);
        assert_eq!(c.tared(1200.0), 200.0);
        assert_eq!(c.to_grams(1200.0), 100.0);
    }

    #[test]
    fn reference_scale_rejects_zero_delta() {
        let c = CalibrationState::new(1000.0, 1.0);
        assert_eq!(c.scale_from_reference(1000.0, 100.0), None);
        assert_eq!(c.scale_from_reference(1400.0, 100.0), Some(0.25));
    }
}
